use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoTweetsError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Gesture error: {0}")]
    Gesture(#[from] GestureError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("System error: {message}")]
    System { message: String },
}

impl GeoTweetsError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// Errors raised by the real-time feed store and its transports
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Invalid partition path: {path}")]
    InvalidPartition { path: String },

    #[error("Store transport failed: {details}")]
    Transport { details: String },

    #[error("Store rejected write with status {status}")]
    WriteRejected { status: u16 },

    #[error("Store connection lost: {cause}")]
    Disconnected { cause: String },
}

impl FeedError {
    pub fn user_message(&self) -> String {
        match self {
            FeedError::Disconnected { cause } | FeedError::Transport { details: cause } => {
                format!("Network error with database: {}", cause)
            }
            FeedError::WriteRejected { .. } => "Failed to save post".to_string(),
            FeedError::InvalidPartition { .. } => "Location is not supported".to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Retrieval failed: {details}")]
    RetrievalFailed { details: String },

    #[error("HTTP client could not be created: {details}")]
    ClientBuild { details: String },
}

impl SearchError {
    pub fn user_message(&self) -> String {
        "Failed to retrieve Tweets".to_string()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication failed: {details}")]
    Unknown { details: String },
}

impl AuthError {
    /// Analytics label for the failure class
    pub fn error_type(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Unknown { .. } => "unknown_error",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Invalid credentials".to_string(),
            AuthError::Unknown { .. } => "Authentication failed".to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum GestureError {
    #[error("No compatible motion sensor: {sensor}")]
    SensorUnavailable { sensor: String },

    #[error("Sensor read failed: {details}")]
    SensorRead { details: String },
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to bind to address {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Relay server failed: {details}")]
    ServerFailed { details: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, GeoTweetsError>;
