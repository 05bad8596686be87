use super::types::{AppCommand, ComponentState, ShutdownReason};
use super::GeoTweetsApp;
use crate::error::{GeoTweetsError, Result};
use crate::events::{EventFilter, EventReceiver, GeoTweetsEvent};
use crate::gesture::MotionSensor;
use tracing::{debug, info, warn};

impl GeoTweetsApp {
    /// Register all system components
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing GeoTweets components");

        let mut states = self.component_states.lock().await;
        for component in ["presenter", "analytics", "feed", "search", "gesture"] {
            states.insert(component.to_string(), ComponentState::Stopped);
        }
        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start the presenter and the background listeners
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting GeoTweets");

        let presenter = self
            .presenter
            .take()
            .ok_or_else(|| GeoTweetsError::system("Presenter already started"))?;
        self.set_component_state("presenter", ComponentState::Starting)
            .await;
        self.presenter_task = Some(tokio::spawn(
            presenter.run(self.cancellation_token.child_token()),
        ));
        self.set_component_state("presenter", ComponentState::Running)
            .await;

        self.set_component_state("analytics", ComponentState::Starting)
            .await;
        let analytics_task = self
            .analytics
            .spawn(&self.event_bus, self.cancellation_token.child_token());
        self.background_tasks.push(("analytics", analytics_task));
        self.set_component_state("analytics", ComponentState::Running)
            .await;

        // Shutdown requests from any component end the run loop
        let mut receiver = EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "orchestrator".to_string(),
        );
        let handle = self.handle();
        let token = self.cancellation_token.child_token();
        let shutdown_listener = tokio::spawn(async move {
            let event = tokio::select! {
                _ = token.cancelled() => return,
                event = receiver.recv() => event,
            };
            if let Ok(GeoTweetsEvent::ShutdownRequested { reason, .. }) = event {
                handle.shutdown(ShutdownReason::UserRequest(reason));
            }
        });
        self.background_tasks
            .push(("shutdown_listener", shutdown_listener));

        info!("GeoTweets started successfully");
        Ok(())
    }

    /// Arm shake detection on `sensor`; each shake refreshes the current screen.
    ///
    /// Returns `false` when gestures are disabled or the sensor is missing.
    pub async fn arm_gesture(&mut self, sensor: &dyn MotionSensor) -> bool {
        if !self.config.gesture.enabled {
            debug!("Gesture detection disabled by configuration");
            return false;
        }

        self.set_component_state("gesture", ComponentState::Starting)
            .await;

        let commands = self.command_sender.clone();
        let armed = self.gesture.arm(sensor, move |event| {
            let _ = commands.send(AppCommand::Refresh {
                magnitude: Some(event.magnitude),
            });
        });

        if armed {
            self.set_component_state("gesture", ComponentState::Running)
                .await;
            info!("Shake to refresh enabled via '{}'", sensor.name());
        } else {
            self.set_component_state("gesture", ComponentState::Failed)
                .await;
            warn!("Shake to refresh unavailable");
            let _ = self
                .event_bus
                .publish(GeoTweetsEvent::SystemError {
                    component: "gesture".to_string(),
                    error: format!("motion sensor '{}' unavailable", sensor.name()),
                })
                .await;
        }
        armed
    }
}
