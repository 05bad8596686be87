mod detector;
mod keyboard;
mod sensor;
mod types;

#[cfg(test)]
mod tests;

pub use detector::{GestureDetector, GestureState};
pub use keyboard::KeyboardShakeSensor;
pub use sensor::{ChannelSensor, MotionSensor, NoSensor, SampleStream};
pub use types::{GestureSample, ShakeEvent, ShakeFilter, ShakeSettings, STANDARD_GRAVITY};
