use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeoTweetsConfig {
    pub feed: FeedConfig,
    pub search: SearchConfig,
    pub gesture: GestureConfig,
    pub relay: RelayConfig,
    pub system: SystemConfig,
}

/// Where the feed screen gets its posts from
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    Realtime,
    Search,
}

/// Which store implementation backs the real-time feed
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Rest,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedConfig {
    /// Post source used by the feed screen
    #[serde(default = "default_feed_source")]
    pub source: FeedSource,

    /// Store backend for the real-time source
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    /// Base URL of the real-time database (rest backend)
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Database auth token sent with every request
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Identity recorded as author of posts written by this client
    #[serde(default = "default_author")]
    pub author: String,

    /// Connect timeout for the store transport
    #[serde(default = "default_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    /// Longest silence tolerated on an open event stream before it counts as lost
    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Base URL of the search API
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub api_secret: String,

    /// Pre-issued bearer token; skips the authenticate step when set
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Search term
    #[serde(default = "default_search_term")]
    pub term: String,

    /// Geocode radius, e.g. "30mi" or "50km"
    #[serde(default = "default_search_radius")]
    pub radius: String,

    #[serde(default = "default_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    #[serde(default = "default_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GestureConfig {
    /// Wire shake gestures to feed refresh
    #[serde(default = "default_gesture_enabled")]
    pub enabled: bool,

    /// Minimum |magnitude - gravity| that counts as a shake (m/s^2)
    #[serde(default = "default_shake_threshold")]
    pub threshold: f64,

    /// Minimum time between two firings
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Gravity subtracted from the acceleration magnitude (m/s^2)
    #[serde(default = "default_gravity")]
    pub gravity: f64,

    /// Use terminal key presses as the shake sensor
    #[serde(default)]
    pub keyboard_sensor: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    /// IP address to bind to
    #[serde(default = "default_relay_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_relay_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl GeoTweetsConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("feed.source", "realtime")?
            .set_default("feed.backend", "memory")?
            .set_default("feed.database_url", default_database_url())?
            .set_default("feed.author", default_author())?
            .set_default(
                "feed.connect_timeout_seconds",
                default_timeout_seconds() as i64,
            )?
            .set_default(
                "feed.idle_timeout_seconds",
                default_idle_timeout_seconds() as i64,
            )?
            .set_default("search.base_url", default_search_base_url())?
            .set_default("search.api_key", "")?
            .set_default("search.api_secret", "")?
            .set_default("search.term", default_search_term())?
            .set_default("search.radius", default_search_radius())?
            .set_default(
                "search.connect_timeout_seconds",
                default_timeout_seconds() as i64,
            )?
            .set_default(
                "search.request_timeout_seconds",
                default_timeout_seconds() as i64,
            )?
            .set_default("gesture.enabled", default_gesture_enabled())?
            .set_default("gesture.threshold", default_shake_threshold())?
            .set_default("gesture.cooldown_ms", default_cooldown_ms() as i64)?
            .set_default("gesture.gravity", default_gravity())?
            .set_default("gesture.keyboard_sensor", false)?
            .set_default("relay.ip", default_relay_ip())?
            .set_default("relay.port", default_relay_port() as i64)?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Environment overrides, e.g. GEOTWEETS_GESTURE__COOLDOWN_MS
            .add_source(
                Environment::with_prefix("GEOTWEETS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: GeoTweetsConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.backend == StoreBackend::Rest && self.feed.database_url.trim().is_empty() {
            return Err(ConfigError::Message(
                "feed.database_url is required for the rest backend".to_string(),
            ));
        }

        if self.feed.connect_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Feed connect timeout must be greater than 0".to_string(),
            ));
        }

        if self.feed.idle_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Feed idle timeout must be greater than 0".to_string(),
            ));
        }

        if self.search.term.trim().is_empty() {
            return Err(ConfigError::Message(
                "Search term must not be empty".to_string(),
            ));
        }

        let radius = self.search.radius.trim();
        let has_unit = radius.ends_with("mi") || radius.ends_with("km");
        let amount = radius.trim_end_matches("mi").trim_end_matches("km");
        if !has_unit || amount.parse::<f64>().map(|r| r <= 0.0).unwrap_or(true) {
            return Err(ConfigError::Message(format!(
                "Search radius '{}' must be a positive number followed by mi or km",
                self.search.radius
            )));
        }

        if self.search.connect_timeout_seconds == 0 || self.search.request_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Search timeouts must be greater than 0".to_string(),
            ));
        }

        if !(self.gesture.threshold > 0.0) {
            return Err(ConfigError::Message(
                "Gesture threshold must be greater than 0".to_string(),
            ));
        }

        if !(self.gesture.gravity > 0.0) {
            return Err(ConfigError::Message(
                "Gesture gravity must be greater than 0".to_string(),
            ));
        }

        if self.gesture.cooldown_ms == 0 {
            return Err(ConfigError::Message(
                "Gesture cooldown must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for GeoTweetsConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig {
                source: default_feed_source(),
                backend: default_store_backend(),
                database_url: default_database_url(),
                auth_token: None,
                author: default_author(),
                connect_timeout_seconds: default_timeout_seconds(),
                idle_timeout_seconds: default_idle_timeout_seconds(),
            },
            search: SearchConfig {
                base_url: default_search_base_url(),
                api_key: String::new(),
                api_secret: String::new(),
                bearer_token: None,
                term: default_search_term(),
                radius: default_search_radius(),
                connect_timeout_seconds: default_timeout_seconds(),
                request_timeout_seconds: default_timeout_seconds(),
            },
            gesture: GestureConfig {
                enabled: default_gesture_enabled(),
                threshold: default_shake_threshold(),
                cooldown_ms: default_cooldown_ms(),
                gravity: default_gravity(),
                keyboard_sensor: false,
            },
            relay: RelayConfig {
                ip: default_relay_ip(),
                port: default_relay_port(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_feed_source() -> FeedSource {
    FeedSource::Realtime
}
fn default_store_backend() -> StoreBackend {
    StoreBackend::Memory
}
fn default_database_url() -> String {
    "http://127.0.0.1:8787".to_string()
}
fn default_author() -> String {
    "anonymous@localhost".to_string()
}
fn default_timeout_seconds() -> u64 {
    15
}
fn default_idle_timeout_seconds() -> u64 {
    60
}

fn default_search_base_url() -> String {
    "https://api.twitter.com".to_string()
}
fn default_search_term() -> String {
    "Android".to_string()
}
fn default_search_radius() -> String {
    "30mi".to_string()
}

fn default_gesture_enabled() -> bool {
    true
}
fn default_shake_threshold() -> f64 {
    2.5
}
fn default_cooldown_ms() -> u64 {
    2000
}
fn default_gravity() -> f64 {
    9.80665
}

fn default_relay_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_relay_port() -> u16 {
    8787
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GeoTweetsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.feed.source, FeedSource::Realtime);
        assert_eq!(config.search.radius, "30mi");
        assert_eq!(config.gesture.cooldown_ms, 2000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = GeoTweetsConfig::default();

        config.gesture.cooldown_ms = 0;
        assert!(config.validate().is_err());
        config.gesture.cooldown_ms = 1500;
        assert!(config.validate().is_ok());

        config.search.radius = "30 parsecs".to_string();
        assert!(config.validate().is_err());
        config.search.radius = "50km".to_string();
        assert!(config.validate().is_ok());

        config.gesture.threshold = 0.0;
        assert!(config.validate().is_err());
        config.gesture.threshold = 2.5;

        config.feed.idle_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rest_backend_requires_database_url() {
        let mut config = GeoTweetsConfig::default();
        config.feed.backend = StoreBackend::Rest;
        config.feed.database_url = "  ".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[feed]
source = "search"
backend = "rest"
database_url = "http://db.example:9000"

[gesture]
threshold = 3.0
cooldown_ms = 1000
"#
        )
        .unwrap();

        let config = GeoTweetsConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.feed.source, FeedSource::Search);
        assert_eq!(config.feed.backend, StoreBackend::Rest);
        assert_eq!(config.feed.database_url, "http://db.example:9000");
        assert_eq!(config.gesture.threshold, 3.0);
        assert_eq!(config.gesture.cooldown_ms, 1000);
        // untouched sections keep their defaults
        assert_eq!(config.search.term, "Android");
        assert_eq!(config.relay.port, 8787);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeoTweetsConfig::load_from_file(dir.path().join("absent.toml")).unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.system.event_bus_capacity, 100);
        assert_eq!(config.feed.idle_timeout_seconds, 60);
    }
}
