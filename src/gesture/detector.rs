use super::sensor::MotionSensor;
use super::types::{GestureSample, ShakeEvent, ShakeFilter, ShakeSettings};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

type TriggerCallback = Arc<dyn Fn(ShakeEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Armed,
}

struct DetectorState {
    filter: ShakeFilter,
    callback: Option<TriggerCallback>,
    cancellation_token: Option<CancellationToken>,
}

/// Shake detector: magnitude thresholding with a cooldown between firings.
///
/// The sample task and `arm`/`disarm` may run on different threads; the
/// armed flag (callback presence), filter and cooldown clock share one lock.
#[derive(Clone)]
pub struct GestureDetector {
    state: Arc<Mutex<DetectorState>>,
}

impl GestureDetector {
    pub fn new(settings: ShakeSettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(DetectorState {
                filter: ShakeFilter::new(settings),
                callback: None,
                cancellation_token: None,
            })),
        }
    }

    /// Start listening to `sensor` and call `on_trigger` for every shake.
    ///
    /// Returns `false` and stays inert when the sensor is not available.
    /// Re-arming replaces the previous callback and sensor. Requires a tokio
    /// runtime.
    pub fn arm<F>(&self, sensor: &dyn MotionSensor, on_trigger: F) -> bool
    where
        F: Fn(ShakeEvent) + Send + Sync + 'static,
    {
        self.disarm();

        let mut samples = match sensor.open() {
            Ok(samples) => samples,
            Err(e) => {
                error!("Gesture detection disabled, sensor '{}': {}", sensor.name(), e);
                return false;
            }
        };

        let token = CancellationToken::new();
        {
            let mut state = self.state.lock();
            state.callback = Some(Arc::new(on_trigger));
            state.cancellation_token = Some(token.clone());
        }

        let detector = self.clone();
        let sensor_name = sensor.name().to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    sample = samples.next() => match sample {
                        Some(sample) => {
                            detector.process_sample(&sample);
                        }
                        None => {
                            info!("Sensor '{}' stopped delivering samples", sensor_name);
                            break;
                        }
                    }
                }
            }
            debug!("Gesture sample task for '{}' ended", sensor_name);
        });

        info!("Gesture detector armed on sensor '{}'", sensor.name());
        true
    }

    /// Stop sample delivery and drop the callback. Safe to call repeatedly.
    pub fn disarm(&self) {
        let mut state = self.state.lock();
        if let Some(token) = state.cancellation_token.take() {
            token.cancel();
            info!("Gesture detector disarmed");
        }
        state.callback = None;
    }

    pub fn state(&self) -> GestureState {
        if self.state.lock().callback.is_some() {
            GestureState::Armed
        } else {
            GestureState::Idle
        }
    }

    /// Feed one sample; returns the firing, if any. Ignored while idle.
    pub fn process_sample(&self, sample: &GestureSample) -> Option<ShakeEvent> {
        let (fired, callback) = {
            let mut state = self.state.lock();
            let callback = state.callback.clone()?;
            let fired = state.filter.observe(sample)?;
            (fired, callback)
        };

        debug!(
            "Shake detected: magnitude {:.2} at {} ms",
            fired.magnitude, fired.timestamp_ms
        );
        // Invoked outside the lock so the callback may disarm
        callback(fired);
        Some(fired)
    }
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new(ShakeSettings::default())
    }
}
