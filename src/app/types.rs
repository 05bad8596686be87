/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest(String),
    Error(String),
}

/// Requests handled by the orchestrator's run loop
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Publish `content` to the current location's feed
    Append(String),
    /// Re-run the current query; `magnitude` is set when a shake caused it
    Refresh { magnitude: Option<f64> },
    Shutdown(ShutdownReason),
}
