pub mod analytics;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod gesture;
pub mod location;
pub mod post;
pub mod search;

#[cfg(feature = "relay")]
pub mod relay;

pub use analytics::{AnalyticsRecorder, EventMetrics};
pub use app::{AppHandle, FeedView, GeoTweetsApp, ShutdownReason};
pub use config::{FeedSource, GeoTweetsConfig, StoreBackend};
pub use error::{AuthError, FeedError, GeoTweetsError, Result, SearchError};
pub use events::{EventBus, EventFilter, EventReceiver, GeoTweetsEvent};
pub use feed::{
    FeedStore, FeedUpdate, MemoryFeedStore, PostBatch, PushId, RemoteFeedSync, RestFeedStore,
};
pub use gesture::{GestureDetector, GestureSample, MotionSensor, ShakeEvent};
pub use location::{LocationKey, ResolvedAddress};
pub use post::Post;
pub use search::{BearerToken, ExternalSearchClient, SearchQuery};

#[cfg(feature = "relay")]
pub use relay::RelayServer;
