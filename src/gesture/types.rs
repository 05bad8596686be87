use crate::config::GestureConfig;
use std::time::Duration;

/// Standard gravity in m/s^2
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// One accelerometer reading; `timestamp_ms` is on the sensor's monotonic clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp_ms: u64,
}

impl GestureSample {
    pub fn new(x: f64, y: f64, z: f64, timestamp_ms: u64) -> Self {
        Self {
            x,
            y,
            z,
            timestamp_ms,
        }
    }

    /// A device at rest, gravity along z
    pub fn at_rest(timestamp_ms: u64) -> Self {
        Self::new(0.0, 0.0, STANDARD_GRAVITY, timestamp_ms)
    }

    /// Vector magnitude minus gravity
    pub fn magnitude(&self, gravity: f64) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt() - gravity
    }
}

/// A firing of the detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeEvent {
    pub magnitude: f64,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeSettings {
    pub threshold: f64,
    pub cooldown: Duration,
    pub gravity: f64,
}

impl ShakeSettings {
    pub fn from_config(config: &GestureConfig) -> Self {
        Self {
            threshold: config.threshold,
            cooldown: Duration::from_millis(config.cooldown_ms),
            gravity: config.gravity,
        }
    }
}

impl Default for ShakeSettings {
    fn default() -> Self {
        Self {
            threshold: 2.5,
            cooldown: Duration::from_millis(2000),
            gravity: STANDARD_GRAVITY,
        }
    }
}

/// Threshold-and-cooldown filter over a sample sequence.
///
/// Fires when `|magnitude| > threshold` and either nothing has fired yet or
/// strictly more than `cooldown` has passed since the last firing.
#[derive(Debug, Clone)]
pub struct ShakeFilter {
    settings: ShakeSettings,
    last_fired_ms: Option<u64>,
}

impl ShakeFilter {
    pub fn new(settings: ShakeSettings) -> Self {
        Self {
            settings,
            last_fired_ms: None,
        }
    }

    pub fn observe(&mut self, sample: &GestureSample) -> Option<ShakeEvent> {
        let cooldown_ms = self.settings.cooldown.as_millis() as u64;
        if let Some(last) = self.last_fired_ms {
            // A clock that went backwards counts as no time elapsed
            if sample.timestamp_ms.saturating_sub(last) <= cooldown_ms {
                return None;
            }
        }

        let magnitude = sample.magnitude(self.settings.gravity);
        if magnitude.abs() > self.settings.threshold {
            self.last_fired_ms = Some(sample.timestamp_ms);
            Some(ShakeEvent {
                magnitude,
                timestamp_ms: sample.timestamp_ms,
            })
        } else {
            None
        }
    }
}
