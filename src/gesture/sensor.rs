use super::types::GestureSample;
use crate::error::GestureError;
use futures::Stream;
use std::pin::Pin;
use tokio::sync::broadcast;
use tracing::warn;

pub type SampleStream = Pin<Box<dyn Stream<Item = GestureSample> + Send>>;

/// Source of accelerometer samples
pub trait MotionSensor: Send + Sync {
    fn name(&self) -> &str;

    /// Start delivering samples; dropping the stream stops delivery
    fn open(&self) -> Result<SampleStream, GestureError>;
}

/// Sensor fed programmatically, e.g. by a host platform bridge or a test
#[derive(Clone)]
pub struct ChannelSensor {
    sender: broadcast::Sender<GestureSample>,
}

impl ChannelSensor {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver a sample to every open stream; returns how many received it
    pub fn emit(&self, sample: GestureSample) -> usize {
        self.sender.send(sample).unwrap_or(0)
    }
}

impl MotionSensor for ChannelSensor {
    fn name(&self) -> &str {
        "channel"
    }

    fn open(&self) -> Result<SampleStream, GestureError> {
        let mut receiver = self.sender.subscribe();

        Ok(Box::pin(async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(sample) => yield sample,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Gesture sensor dropped {} samples", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }
}

/// A device without an accelerometer
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSensor;

impl MotionSensor for NoSensor {
    fn name(&self) -> &str {
        "none"
    }

    fn open(&self) -> Result<SampleStream, GestureError> {
        Err(GestureError::SensorUnavailable {
            sensor: "accelerometer".to_string(),
        })
    }
}
