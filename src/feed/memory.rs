use super::push_id::{PushId, PushIdGenerator};
use super::store::{FeedStore, StoreEvent, StoreEventStream};
use crate::error::FeedError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

struct Partition {
    entries: BTreeMap<String, Value>,
    sender: broadcast::Sender<StoreEvent>,
}

impl Partition {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            entries: BTreeMap::new(),
            sender,
        }
    }

    fn snapshot(&self) -> Value {
        if self.entries.is_empty() {
            return Value::Null;
        }
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        )
    }
}

/// In-process store; one broadcast channel per partition, writes serialized by a lock
#[derive(Clone)]
pub struct MemoryFeedStore {
    partitions: Arc<Mutex<HashMap<String, Partition>>>,
    ids: Arc<PushIdGenerator>,
    capacity: usize,
}

impl MemoryFeedStore {
    /// Create a store whose watch channels buffer up to `capacity` notifications
    pub fn new(capacity: usize) -> Self {
        Self {
            partitions: Arc::new(Mutex::new(HashMap::new())),
            ids: Arc::new(PushIdGenerator::new()),
            capacity: capacity.max(1),
        }
    }

    /// Current contents of a partition, `null` when it has no entries
    pub fn snapshot(&self, partition: &str) -> Value {
        self.partitions
            .lock()
            .get(partition)
            .map(Partition::snapshot)
            .unwrap_or(Value::Null)
    }

    /// Write `value` under a freshly minted key and return the key
    pub fn push(&self, partition: &str, value: Value) -> PushId {
        let id = self.ids.next_id();
        self.write(partition, id.as_str(), value);
        id
    }

    /// Terminate every open watch with `cause`; later watches connect normally
    pub fn disconnect(&self, cause: &str) {
        let partitions = self.partitions.lock();
        let mut notified = 0;
        for partition in partitions.values() {
            notified += partition
                .sender
                .send(StoreEvent::Cancelled(cause.to_string()))
                .unwrap_or(0);
        }
        warn!("Memory store disconnected {} watchers: {}", notified, cause);
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.lock().len()
    }

    fn write(&self, partition: &str, key: &str, value: Value) {
        let mut partitions = self.partitions.lock();
        let entry = partitions
            .entry(partition.to_string())
            .or_insert_with(|| Partition::new(self.capacity));

        if value.is_null() {
            entry.entries.remove(key);
        } else {
            entry.entries.insert(key.to_string(), value);
        }

        // Sent under the lock so watchers observe writes in commit order
        let watchers = entry
            .sender
            .send(StoreEvent::Snapshot(entry.snapshot()))
            .unwrap_or(0);
        debug!(
            "Wrote {}/{} ({} entries, {} watchers)",
            partition,
            key,
            entry.entries.len(),
            watchers
        );
    }
}

impl Default for MemoryFeedStore {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl FeedStore for MemoryFeedStore {
    async fn put(&self, partition: &str, key: &str, value: Value) -> Result<(), FeedError> {
        if partition.is_empty() || key.is_empty() || key.contains('/') {
            return Err(FeedError::InvalidPartition {
                path: format!("{}/{}", partition, key),
            });
        }
        self.write(partition, key, value);
        Ok(())
    }

    async fn watch(&self, partition: &str) -> Result<StoreEventStream, FeedError> {
        if partition.is_empty() {
            return Err(FeedError::InvalidPartition {
                path: partition.to_string(),
            });
        }

        let (mut receiver, initial) = {
            let mut partitions = self.partitions.lock();
            let entry = partitions
                .entry(partition.to_string())
                .or_insert_with(|| Partition::new(self.capacity));
            (entry.sender.subscribe(), entry.snapshot())
        };
        info!("Opened memory watch on {}", partition);

        let partition = partition.to_string();

        let stream = async_stream::stream! {
            yield StoreEvent::Snapshot(initial);

            loop {
                match receiver.recv().await {
                    Ok(StoreEvent::Cancelled(cause)) => {
                        yield StoreEvent::Cancelled(cause);
                        break;
                    }
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Retained snapshots are newer than the last one delivered and
                        // end with the latest state, so skipping ahead loses nothing
                        warn!("Watch on {} lagged behind by {} updates", partition, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        yield StoreEvent::Cancelled("store closed".to_string());
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_watch_starts_with_current_snapshot() {
        let store = MemoryFeedStore::new(10);
        store
            .put("tweets/Ohio", "k1", json!({ "content": "first" }))
            .await
            .unwrap();

        let mut watch = store.watch("tweets/Ohio").await.unwrap();
        let first = timeout(Duration::from_millis(100), watch.next())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            first,
            StoreEvent::Snapshot(json!({ "k1": { "content": "first" } }))
        );
    }

    #[tokio::test]
    async fn test_writes_notify_only_their_partition() {
        let store = MemoryFeedStore::new(10);
        let mut ohio = store.watch("tweets/Ohio").await.unwrap();
        let mut utah = store.watch("tweets/Utah").await.unwrap();

        assert_eq!(ohio.next().await, Some(StoreEvent::Snapshot(Value::Null)));
        assert_eq!(utah.next().await, Some(StoreEvent::Snapshot(Value::Null)));

        store.push("tweets/Ohio", json!({ "content": "hi" }));

        let update = timeout(Duration::from_millis(100), ohio.next())
            .await
            .unwrap()
            .unwrap();
        match update {
            StoreEvent::Snapshot(Value::Object(map)) => assert_eq!(map.len(), 1),
            other => panic!("Unexpected event: {:?}", other),
        }

        assert!(timeout(Duration::from_millis(50), utah.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_cancels_watch_once() {
        let store = MemoryFeedStore::new(10);
        let mut watch = store.watch("tweets/Ohio").await.unwrap();
        let _ = watch.next().await;

        store.disconnect("network unreachable");

        assert_eq!(
            watch.next().await,
            Some(StoreEvent::Cancelled("network unreachable".to_string()))
        );
        assert_eq!(watch.next().await, None);
    }

    #[tokio::test]
    async fn test_null_write_removes_entry() {
        let store = MemoryFeedStore::new(10);
        let id = store.push("tweets/Ohio", json!({ "content": "gone soon" }));

        store.put("tweets/Ohio", id.as_str(), Value::Null).await.unwrap();

        assert_eq!(store.snapshot("tweets/Ohio"), Value::Null);
    }

    #[tokio::test]
    async fn test_rejects_nested_keys() {
        let store = MemoryFeedStore::new(10);
        let result = store.put("tweets/Ohio", "a/b", json!({})).await;

        assert!(matches!(result, Err(FeedError::InvalidPartition { .. })));
    }
}
