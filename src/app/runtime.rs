use super::types::ShutdownReason;
use super::{AppHandle, GeoTweetsApp};
use crate::error::{GeoTweetsError, Result};
use tokio::signal;
use tracing::{error, info};

impl GeoTweetsApp {
    /// Run the main application loop with signal handling
    pub async fn run(&mut self) -> Result<i32> {
        info!("GeoTweets is running");

        let mut commands = self
            .command_receiver
            .take()
            .ok_or_else(|| GeoTweetsError::system("Command receiver already taken"))?;

        // Spawn signal handlers
        self.setup_signal_handlers();

        let shutdown_reason = loop {
            let command = tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    break ShutdownReason::Error("cancelled".to_string());
                }
                command = commands.recv() => command,
            };

            match command {
                Some(command) => {
                    if let Some(reason) = self.handle_command(command).await {
                        break reason;
                    }
                }
                None => break ShutdownReason::Error("command channel closed".to_string()),
            }
        };

        info!("Shutdown initiated: {:?}", shutdown_reason);

        // Perform graceful shutdown
        let exit_code = self.shutdown().await?;

        info!("GeoTweets shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self) {
        // Handle SIGTERM (service stop) - Unix only
        #[cfg(unix)]
        {
            let handle = self.handle();
            tokio::spawn(async move {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        if sigterm.recv().await.is_some() {
                            info!("Received SIGTERM signal");
                            handle.shutdown(ShutdownReason::Signal("SIGTERM".to_string()));
                        }
                    }
                    Err(e) => error!("Failed to register SIGTERM handler: {}", e),
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let handle: AppHandle = self.handle();
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                handle.shutdown(ShutdownReason::Signal("SIGINT".to_string()));
            }
        });
    }
}
