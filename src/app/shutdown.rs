use super::types::ComponentState;
use super::GeoTweetsApp;
use crate::error::Result;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl GeoTweetsApp {
    /// Perform graceful shutdown of all components
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        let failed = self.failed_components().await;
        if !failed.is_empty() {
            warn!("Components in failed state: {}", failed.join(", "));
        }

        self.gesture.disarm();
        self.set_component_state("gesture", ComponentState::Stopped)
            .await;

        if let Some(token) = self.feed_token.take() {
            token.cancel();
        }
        self.set_component_state("feed", ComponentState::Stopped)
            .await;
        self.set_component_state("search", ComponentState::Stopped)
            .await;

        // Cancel all background tasks
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if let Some(presenter_task) = self.presenter_task.take() {
            if !self.stop_task("presenter", presenter_task).await {
                exit_code = 1;
            }
        }

        for (component, task) in std::mem::take(&mut self.background_tasks) {
            if !self.stop_task(component, task).await {
                exit_code = 1;
            }
        }

        self.analytics.log_summary();

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Wait for a cancelled task to finish
    async fn stop_task<T>(&self, component: &str, task: JoinHandle<T>) -> bool {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(STOP_TIMEOUT, task).await {
            Ok(Ok(_)) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                true
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("Error stopping {} component: {}", component, e);
                false
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component stop timeout", component);
                false
            }
        }
    }
}
