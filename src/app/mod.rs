mod composer;
mod orchestrator;
mod presenter;
mod runtime;
mod screen;
mod shutdown;
mod startup;
mod state;
mod types;


pub use composer::run_composer;
pub use orchestrator::{AppHandle, GeoTweetsApp};
pub use presenter::{FeedView, Presenter, UiMessage};
pub use types::{AppCommand, ComponentState, ShutdownReason};
