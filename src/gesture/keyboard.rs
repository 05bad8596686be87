use super::sensor::{MotionSensor, SampleStream};
use super::types::{GestureSample, STANDARD_GRAVITY};
use crate::error::GestureError;
use crate::events::{EventBus, GeoTweetsEvent};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, error, info, warn};

/// Terminal stand-in for an accelerometer: pressing `s` or SPACE produces a
/// strong spike sample. `q`, ESC and Ctrl+C request shutdown, since raw mode
/// swallows the interrupt signal.
pub struct KeyboardShakeSensor {
    event_bus: Option<Arc<EventBus>>,
}

impl KeyboardShakeSensor {
    pub fn new(event_bus: Option<Arc<EventBus>>) -> Self {
        Self { event_bus }
    }

    fn spike(timestamp_ms: u64) -> GestureSample {
        GestureSample::new(15.0, 15.0, STANDARD_GRAVITY, timestamp_ms)
    }
}

impl MotionSensor for KeyboardShakeSensor {
    fn name(&self) -> &str {
        "keyboard"
    }

    fn open(&self) -> Result<SampleStream, GestureError> {
        if !std::io::stdin().is_terminal() {
            return Err(GestureError::SensorUnavailable {
                sensor: "keyboard (stdin is not a terminal)".to_string(),
            });
        }
        let runtime_handle = Handle::try_current().map_err(|e| GestureError::SensorRead {
            details: format!("keyboard sensor needs a tokio runtime: {}", e),
        })?;

        let (sender, mut receiver) = mpsc::channel::<GestureSample>(16);
        let event_bus = self.event_bus.clone();
        let started = Instant::now();

        info!("Starting keyboard shake sensor - press SPACE or 's' to shake, 'q' to quit");

        // Spawn a blocking task to handle keyboard input
        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            // Ends once the sample stream has been dropped
            while !sender.is_closed() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let key_event = match event::read() {
                            Ok(Event::Key(key_event)) if key_event.kind == KeyEventKind::Press => {
                                key_event
                            }
                            _ => continue,
                        };

                        match key_event.code {
                            KeyCode::Char(' ') | KeyCode::Char('s') => {
                                let timestamp_ms = started.elapsed().as_millis() as u64;
                                debug!("Keyboard shake at {} ms", timestamp_ms);
                                if sender.blocking_send(Self::spike(timestamp_ms)).is_err() {
                                    break;
                                }
                            }
                            KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                                request_shutdown(&runtime_handle, &event_bus, "Ctrl+C");
                            }
                            KeyCode::Char('q') | KeyCode::Esc => {
                                request_shutdown(&runtime_handle, &event_bus, "quit key pressed");
                            }
                            _ => {}
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling keyboard events: {}", e);
                        std::thread::sleep(Duration::from_millis(100));
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard shake sensor stopped");
        });

        Ok(Box::pin(async_stream::stream! {
            while let Some(sample) = receiver.recv().await {
                yield sample;
            }
        }))
    }
}

fn request_shutdown(runtime_handle: &Handle, event_bus: &Option<Arc<EventBus>>, reason: &str) {
    info!("Shutdown requested from keyboard: {}", reason);
    if let Some(bus) = event_bus {
        let bus = Arc::clone(bus);
        let reason = reason.to_string();
        runtime_handle.spawn(async move {
            if let Err(e) = bus
                .publish(GeoTweetsEvent::ShutdownRequested {
                    timestamp: SystemTime::now(),
                    reason,
                })
                .await
            {
                warn!("Failed to publish shutdown event: {}", e);
            }
        });
    }
}
