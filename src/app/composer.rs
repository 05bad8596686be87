use super::types::ShutdownReason;
use super::AppHandle;
use crate::gesture::{ChannelSensor, GestureSample, STANDARD_GRAVITY};
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// Turn lines of text into commands: plain lines are posted, `/shake` injects a
/// shake into `sensor` (or refreshes directly without one), `/refresh`
/// refreshes and `/quit` stops the application.
pub async fn run_composer<R>(reader: R, handle: AppHandle, sensor: Option<ChannelSensor>)
where
    R: AsyncBufRead + Unpin,
{
    let started = Instant::now();
    let mut lines = reader.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Composer input closed");
                break;
            }
            Err(e) => {
                warn!("Failed to read composer input: {}", e);
                break;
            }
        };

        let delivered = match line.trim() {
            "" => true,
            "/quit" => {
                handle.shutdown(ShutdownReason::UserRequest("quit command".to_string()));
                break;
            }
            "/refresh" => handle.refresh(),
            "/shake" => match &sensor {
                Some(sensor) => {
                    let timestamp_ms = started.elapsed().as_millis() as u64;
                    let spike = GestureSample::new(15.0, 15.0, STANDARD_GRAVITY, timestamp_ms);
                    if sensor.emit(spike) == 0 {
                        info!("Shake ignored: gesture detection is not armed");
                    }
                    true
                }
                None => handle.refresh(),
            },
            content => handle.append(content),
        };

        if !delivered {
            debug!("Application stopped; composer exiting");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppCommand;
    use crate::gesture::MotionSensor;
    use futures::StreamExt;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_lines_become_commands() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let input: &[u8] = b"hello there\n\n/refresh\n/quit\nnever sent\n";

        run_composer(input, AppHandle::from_sender(sender), None).await;

        match receiver.recv().await {
            Some(AppCommand::Append(content)) => assert_eq!(content, "hello there"),
            other => panic!("Unexpected command: {:?}", other),
        }
        assert!(matches!(
            receiver.recv().await,
            Some(AppCommand::Refresh { magnitude: None })
        ));
        assert!(matches!(
            receiver.recv().await,
            Some(AppCommand::Shutdown(ShutdownReason::UserRequest(_)))
        ));
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_shake_line_feeds_sensor() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let sensor = ChannelSensor::new(4);
        let mut samples = sensor.open().unwrap();

        let input: &[u8] = b"/shake\n";
        run_composer(input, AppHandle::from_sender(sender), Some(sensor.clone())).await;

        let sample = samples.next().await.unwrap();
        assert!(sample.magnitude(STANDARD_GRAVITY) > 2.5);
        assert!(receiver.recv().await.is_none());
    }
}
