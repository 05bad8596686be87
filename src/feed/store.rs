use crate::error::FeedError;
use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

/// Notification delivered to a partition watcher
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Full current contents of the partition (`null` when empty)
    Snapshot(Value),
    /// The watch was terminated by the store or the transport; no more events follow
    Cancelled(String),
}

pub type StoreEventStream = Pin<Box<dyn Stream<Item = StoreEvent> + Send>>;

/// Hosted real-time store holding one ordered map of records per partition path
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Write `value` under `key` inside `partition`
    async fn put(&self, partition: &str, key: &str, value: Value) -> Result<(), FeedError>;

    /// Open a persistent watch on `partition`. The first event is the current snapshot.
    async fn watch(&self, partition: &str) -> Result<StoreEventStream, FeedError>;

    /// Short name for logs
    fn backend_name(&self) -> &'static str;
}
