use super::batch::PostBatch;
use super::push_id::PushIdGenerator;
use super::store::{FeedStore, StoreEvent};
use crate::events::{EventBus, GeoTweetsEvent};
use crate::location::LocationKey;
use crate::post::Post;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

/// What a feed subscriber receives
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    /// Full current post list of the partition
    Snapshot(PostBatch),
    /// The watch was lost; the subscription ends after this item
    Disconnected { cause: String },
}

pub type FeedSubscription = Pin<Box<dyn Stream<Item = FeedUpdate> + Send>>;

/// Location-partitioned live post list over a [`FeedStore`]
#[derive(Clone)]
pub struct RemoteFeedSync {
    store: Arc<dyn FeedStore>,
    ids: Arc<PushIdGenerator>,
    event_bus: Option<Arc<EventBus>>,
}

impl RemoteFeedSync {
    pub fn new(store: Arc<dyn FeedStore>) -> Self {
        Self {
            store,
            ids: Arc::new(PushIdGenerator::new()),
            event_bus: None,
        }
    }

    /// Also report snapshots, disconnects and writes on `event_bus`
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Watch the partition of `location`.
    ///
    /// The store is not contacted until the subscription is first polled. Each
    /// change (and the initial connection) yields a full [`PostBatch`]; losing the
    /// watch yields one [`FeedUpdate::Disconnected`] and ends the stream. There
    /// is no retry: subscribe again to reconnect.
    pub fn subscribe(&self, location: &LocationKey) -> FeedSubscription {
        let store = Arc::clone(&self.store);
        let event_bus = self.event_bus.clone();
        let location = location.clone();

        Box::pin(async_stream::stream! {
            let partition = location.partition_path();
            debug!("Subscribing to {} via {} store", partition, store.backend_name());

            match store.watch(&partition).await {
                Err(e) => {
                    let cause = e.to_string();
                    warn!("Could not open feed for {}: {}", location, cause);
                    publish(&event_bus, GeoTweetsEvent::FeedDisconnected {
                        location: location.to_string(),
                        cause: cause.clone(),
                        timestamp: SystemTime::now(),
                    }).await;
                    yield FeedUpdate::Disconnected { cause };
                }
                Ok(mut events) => {
                    while let Some(event) = events.next().await {
                        match event {
                            StoreEvent::Snapshot(value) => {
                                let batch = PostBatch::decode(location.clone(), &value);
                                publish(&event_bus, GeoTweetsEvent::FeedUpdated {
                                    location: location.to_string(),
                                    accepted: batch.len(),
                                    rejected: batch.rejected_count,
                                    timestamp: SystemTime::now(),
                                }).await;
                                yield FeedUpdate::Snapshot(batch);
                            }
                            StoreEvent::Cancelled(cause) => {
                                warn!("Feed for {} disconnected: {}", location, cause);
                                publish(&event_bus, GeoTweetsEvent::FeedDisconnected {
                                    location: location.to_string(),
                                    cause: cause.clone(),
                                    timestamp: SystemTime::now(),
                                }).await;
                                yield FeedUpdate::Disconnected { cause };
                                break;
                            }
                        }
                    }
                }
            }
        })
    }

    /// Write `post` under a fresh key in the partition of `location`.
    ///
    /// Fire-and-forget: the write runs on a spawned task and its outcome is only
    /// visible through subsequent subscription updates (and logs). Must be called
    /// from within a tokio runtime.
    pub fn append(&self, location: &LocationKey, post: Post) {
        // Minted before spawning so keys follow call order
        let key = self.ids.next_id();
        let store = Arc::clone(&self.store);
        let event_bus = self.event_bus.clone();
        let location = location.clone();

        tokio::spawn(async move {
            let value = match serde_json::to_value(&post) {
                Ok(value) => value,
                Err(e) => {
                    error!("Failed to encode post for {}: {}", location, e);
                    return;
                }
            };

            match store.put(&location.partition_path(), key.as_str(), value).await {
                Ok(()) => {
                    info!("Appended post {} to {}", key, location);
                    publish(
                        &event_bus,
                        GeoTweetsEvent::PostAppended {
                            location: location.to_string(),
                            key: key.into_string(),
                        },
                    )
                    .await;
                }
                Err(e) => {
                    warn!("Failed to append post to {}: {}", location, e);
                    publish(
                        &event_bus,
                        GeoTweetsEvent::AppendFailed {
                            location: location.to_string(),
                            error: e.to_string(),
                        },
                    )
                    .await;
                }
            }
        });
    }
}

async fn publish(event_bus: &Option<Arc<EventBus>>, event: GeoTweetsEvent) {
    if let Some(bus) = event_bus {
        // No subscribers is not an error for the feed
        let _ = bus.publish(event).await;
    }
}
