use super::presenter::UiMessage;
use super::types::{AppCommand, ComponentState, ShutdownReason};
use super::GeoTweetsApp;
use crate::config::{FeedSource, SearchConfig};
use crate::error::AuthError;
use crate::events::{EventBus, GeoTweetsEvent};
use crate::feed::FeedUpdate;
use crate::location::ResolvedAddress;
use crate::post::Post;
use crate::search::{BearerToken, ExternalSearchClient, SearchQuery};
use futures::StreamExt;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

impl GeoTweetsApp {
    /// Show the feed for `address` using the configured source
    pub async fn open(&mut self, address: ResolvedAddress) {
        info!(
            "Opening feed for '{}' ({})",
            address.address_line,
            address.location_key()
        );
        self.address = Some(address);
        self.reload().await;
    }

    /// Run one command from the command channel; returns a reason to stop
    pub async fn handle_command(&mut self, command: AppCommand) -> Option<ShutdownReason> {
        match command {
            AppCommand::Append(content) => {
                self.append(content).await;
                None
            }
            AppCommand::Refresh { magnitude } => {
                if let Some(magnitude) = magnitude {
                    let _ = self
                        .event_bus
                        .publish(GeoTweetsEvent::GestureTriggered {
                            magnitude,
                            timestamp: SystemTime::now(),
                        })
                        .await;
                }
                self.reload().await;
                None
            }
            AppCommand::Shutdown(reason) => Some(reason),
        }
    }

    async fn reload(&mut self) {
        if self.address.is_none() {
            debug!("Nothing to refresh yet");
            return;
        }
        match self.config.feed.source {
            FeedSource::Realtime => self.subscribe_feed().await,
            FeedSource::Search => self.request_search().await,
        }
    }

    async fn append(&mut self, content: String) {
        let location = match (&self.address, self.config.feed.source) {
            (Some(address), FeedSource::Realtime) => address.location_key(),
            (None, _) => {
                warn!("Dropping post written before a location was chosen");
                return;
            }
            (Some(_), FeedSource::Search) => {
                self.notify("Posting is only available on the live feed".to_string())
                    .await;
                return;
            }
        };

        let post = Post::authored_by(&self.config.feed.author, content);
        self.feed_sync.append(&location, post);
    }

    /// (Re)open the live subscription; a previous one is torn down first
    async fn subscribe_feed(&mut self) {
        let Some(address) = self.address.as_ref() else {
            return;
        };
        let location = address.location_key();

        if let Some(previous) = self.feed_token.take() {
            previous.cancel();
        }
        self.set_component_state("feed", ComponentState::Starting)
            .await;
        self.send_ui(UiMessage::SetTitle(format!("Tweets in {}", location)))
            .await;

        let token = self.cancellation_token.child_token();
        self.feed_token = Some(token.clone());

        let mut subscription = self.feed_sync.subscribe(&location);
        let ui_sender = self.ui_sender.clone();
        let states = Arc::clone(&self.component_states);

        tokio::spawn(async move {
            loop {
                let update = tokio::select! {
                    _ = token.cancelled() => break,
                    update = subscription.next() => update,
                };

                let message = match update {
                    Some(FeedUpdate::Snapshot(batch)) => UiMessage::FeedSnapshot(batch),
                    Some(FeedUpdate::Disconnected { cause }) => {
                        states
                            .lock()
                            .await
                            .insert("feed".to_string(), ComponentState::Failed);
                        UiMessage::FeedDisconnected { cause }
                    }
                    None => break,
                };
                if ui_sender.send(message).await.is_err() {
                    break;
                }
            }
            debug!("Feed forwarding for {} ended", location);
        });

        self.set_component_state("feed", ComponentState::Running)
            .await;
    }

    /// Start a new search generation on a worker task
    async fn request_search(&mut self) {
        let Some(address) = self.address.clone() else {
            return;
        };
        self.search_generation += 1;
        let generation = self.search_generation;

        self.send_ui(UiMessage::SetTitle(format!(
            "Tweets near {}",
            address.address_line
        )))
        .await;

        let Some((latitude, longitude)) = address.coordinates() else {
            let reason = "the selected address has no coordinates".to_string();
            warn!("Cannot search near '{}': {}", address.address_line, reason);
            let _ = self
                .event_bus
                .publish(GeoTweetsEvent::LocationUnavailable {
                    reason: reason.clone(),
                })
                .await;
            self.send_ui(UiMessage::LocationUnavailable { reason }).await;
            return;
        };

        self.send_ui(UiMessage::SearchRequested { generation }).await;
        self.set_component_state("search", ComponentState::Running)
            .await;

        let worker = SearchWorker {
            client: self.search_client.clone(),
            config: self.config.search.clone(),
            event_bus: Arc::clone(&self.event_bus),
            ui_sender: self.ui_sender.clone(),
        };
        let query = SearchQuery::near(latitude, longitude)
            .with_radius(self.config.search.radius.clone())
            .with_term(self.config.search.term.clone());

        tokio::spawn(worker.run(generation, query));
    }

    async fn notify(&self, notice: String) {
        self.send_ui(UiMessage::Notice(notice)).await;
    }

    async fn send_ui(&self, message: UiMessage) {
        if self.ui_sender.send(message).await.is_err() {
            debug!("Presenter gone; dropping UI message");
        }
    }
}

/// Performs the token exchange and the search off the presentation path
struct SearchWorker {
    client: ExternalSearchClient,
    config: SearchConfig,
    event_bus: Arc<EventBus>,
    ui_sender: mpsc::Sender<UiMessage>,
}

impl SearchWorker {
    async fn run(self, generation: u64, query: SearchQuery) {
        let message = match self.execute(&query).await {
            Ok(posts) => {
                let _ = self
                    .event_bus
                    .publish(GeoTweetsEvent::SearchCompleted {
                        count: posts.len(),
                        timestamp: SystemTime::now(),
                    })
                    .await;
                UiMessage::SearchResults { generation, posts }
            }
            Err(message) => UiMessage::SearchFailed {
                generation,
                message,
            },
        };

        if self.ui_sender.send(message).await.is_err() {
            debug!("Presenter gone; dropping search generation {}", generation);
        }
    }

    /// Errors come back as the user-facing notice
    async fn execute(&self, query: &SearchQuery) -> Result<Vec<Post>, String> {
        let token = match self.token().await {
            Ok(token) => token,
            Err(e) => {
                error!("Search authentication failed: {}", e);
                let _ = self
                    .event_bus
                    .publish(GeoTweetsEvent::AuthFailed {
                        error_type: e.error_type().to_string(),
                    })
                    .await;
                return Err(e.user_message());
            }
        };

        match self.client.search(&token, query).await {
            Ok(posts) => Ok(posts),
            Err(e) => {
                error!("Search failed: {}", e);
                let _ = self
                    .event_bus
                    .publish(GeoTweetsEvent::SearchFailed {
                        error: e.to_string(),
                    })
                    .await;
                Err(e.user_message())
            }
        }
    }

    async fn token(&self) -> Result<BearerToken, AuthError> {
        match &self.config.bearer_token {
            Some(token) if !token.is_empty() => Ok(BearerToken::new(token.clone())),
            _ => {
                self.client
                    .authenticate(&self.config.api_key, &self.config.api_secret)
                    .await
            }
        }
    }
}
