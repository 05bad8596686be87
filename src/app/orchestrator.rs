use super::presenter::{FeedView, Presenter, UiMessage};
use super::types::{AppCommand, ComponentState, ShutdownReason};
use crate::analytics::AnalyticsRecorder;
use crate::config::{GeoTweetsConfig, StoreBackend};
use crate::error::Result;
use crate::events::EventBus;
use crate::feed::{FeedStore, MemoryFeedStore, RemoteFeedSync, RestFeedStore};
use crate::gesture::{GestureDetector, ShakeSettings};
use crate::location::ResolvedAddress;
use crate::search::ExternalSearchClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const UI_CHANNEL_CAPACITY: usize = 64;

/// Main application coordinator: owns the clients and routes their results
/// to the presenter
pub struct GeoTweetsApp {
    pub(super) config: GeoTweetsConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) analytics: AnalyticsRecorder,

    // Components
    pub(super) feed_sync: RemoteFeedSync,
    pub(super) search_client: ExternalSearchClient,
    pub(super) gesture: GestureDetector,

    // Presentation
    pub(super) ui_sender: mpsc::Sender<UiMessage>,
    pub(super) presenter: Option<Presenter>,
    pub(super) view: watch::Receiver<FeedView>,
    pub(super) presenter_task: Option<JoinHandle<FeedView>>,

    // Current screen
    pub(super) address: Option<ResolvedAddress>,
    pub(super) feed_token: Option<CancellationToken>,
    pub(super) search_generation: u64,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) command_sender: mpsc::UnboundedSender<AppCommand>,
    pub(super) command_receiver: Option<mpsc::UnboundedReceiver<AppCommand>>,
    pub(super) background_tasks: Vec<(&'static str, JoinHandle<()>)>,
    pub(super) cancellation_token: CancellationToken,
}

impl GeoTweetsApp {
    /// Create an application whose store is chosen by `feed.backend`
    pub fn new(config: GeoTweetsConfig) -> Result<Self> {
        let store: Arc<dyn FeedStore> = match config.feed.backend {
            StoreBackend::Memory => Arc::new(MemoryFeedStore::new(
                config.system.event_bus_capacity,
            )),
            StoreBackend::Rest => Arc::new(
                RestFeedStore::new(
                    config.feed.database_url.clone(),
                    config.feed.auth_token.clone(),
                    Duration::from_secs(config.feed.connect_timeout_seconds),
                )?
                .with_idle_timeout(Duration::from_secs(config.feed.idle_timeout_seconds)),
            ),
        };

        Self::with_store(config, store)
    }

    /// Create an application over an existing store
    pub fn with_store(config: GeoTweetsConfig, store: Arc<dyn FeedStore>) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let feed_sync = RemoteFeedSync::new(store).with_event_bus(Arc::clone(&event_bus));
        let search_client = ExternalSearchClient::from_config(&config.search)?;
        let gesture = GestureDetector::new(ShakeSettings::from_config(&config.gesture));

        let (ui_sender, ui_receiver) = mpsc::channel(UI_CHANNEL_CAPACITY);
        let (presenter, view) = Presenter::new(ui_receiver);
        let (command_sender, command_receiver) = mpsc::unbounded_channel();

        debug!("Application created with feed source {:?}", config.feed.source);

        Ok(Self {
            config,
            event_bus,
            analytics: AnalyticsRecorder::new(),
            feed_sync,
            search_client,
            gesture,
            ui_sender,
            presenter: Some(presenter),
            view,
            presenter_task: None,
            address: None,
            feed_token: None,
            search_generation: 0,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            command_sender,
            command_receiver: Some(command_receiver),
            background_tasks: Vec::new(),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Print the view to stdout whenever it changes
    pub fn set_echo(&mut self, echo: bool) {
        if let Some(presenter) = self.presenter.take() {
            self.presenter = Some(presenter.with_echo(echo));
        }
    }

    pub fn config(&self) -> &GeoTweetsConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn analytics(&self) -> AnalyticsRecorder {
        self.analytics.clone()
    }

    /// Live view of what the presenter shows
    pub fn view(&self) -> watch::Receiver<FeedView> {
        self.view.clone()
    }

    /// Handle for feeding commands into the run loop from other tasks
    pub fn handle(&self) -> AppHandle {
        AppHandle {
            sender: self.command_sender.clone(),
        }
    }
}

/// Cloneable sender of [`AppCommand`]s; every method returns `false` once the
/// application has stopped
#[derive(Clone)]
pub struct AppHandle {
    sender: mpsc::UnboundedSender<AppCommand>,
}

impl AppHandle {
    pub(crate) fn from_sender(sender: mpsc::UnboundedSender<AppCommand>) -> Self {
        Self { sender }
    }

    pub fn append(&self, content: impl Into<String>) -> bool {
        self.send(AppCommand::Append(content.into()))
    }

    pub fn refresh(&self) -> bool {
        self.send(AppCommand::Refresh { magnitude: None })
    }

    pub fn shutdown(&self, reason: ShutdownReason) -> bool {
        self.send(AppCommand::Shutdown(reason))
    }

    pub fn send(&self, command: AppCommand) -> bool {
        self.sender.send(command).is_ok()
    }
}
