use crate::location::LocationKey;
use crate::post::Post;
use serde_json::Value;
use tracing::debug;

/// A decoded post together with the store key it lives under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedPost {
    pub key: String,
    pub post: Post,
}

/// Full contents of one partition, decoded with per-entry rejection
#[derive(Debug, Clone, PartialEq)]
pub struct PostBatch {
    pub location: LocationKey,
    pub accepted: Vec<KeyedPost>,
    pub rejected_count: usize,
}

impl PostBatch {
    /// Decode a partition snapshot. `null` is an empty partition; entries that
    /// are not post-shaped are counted in `rejected_count` and skipped.
    ///
    /// The store returns an array when child keys are all small integers; its
    /// elements are keyed by index and `null` holes stand for absent keys.
    pub fn decode(location: LocationKey, snapshot: &Value) -> Self {
        let mut batch = Self {
            location,
            accepted: Vec::new(),
            rejected_count: 0,
        };

        match snapshot {
            Value::Null => {}
            Value::Object(children) => {
                let mut entries: Vec<(&String, &Value)> = children.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));

                for (key, value) in entries {
                    batch.push_entry(key.clone(), value);
                }
            }
            Value::Array(children) => {
                for (index, value) in children.iter().enumerate() {
                    if !value.is_null() {
                        batch.push_entry(index.to_string(), value);
                    }
                }
            }
            other => {
                debug!(
                    "Partition {} holds a non-object value: {}",
                    batch.location, other
                );
                batch.rejected_count = 1;
            }
        }

        batch
    }

    fn push_entry(&mut self, key: String, value: &Value) {
        match Post::from_value(value) {
            Some(post) => self.accepted.push(KeyedPost { key, post }),
            None => {
                debug!("Dropping malformed entry {} in {}", key, self.location);
                self.rejected_count += 1;
            }
        }
    }

    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.accepted.iter().map(|entry| &entry.post)
    }

    pub fn into_posts(self) -> Vec<Post> {
        self.accepted.into_iter().map(|entry| entry.post).collect()
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn texas() -> LocationKey {
        LocationKey::from_admin_area(Some("Texas"))
    }

    #[test]
    fn test_null_snapshot_is_empty() {
        let batch = PostBatch::decode(texas(), &Value::Null);

        assert!(batch.is_empty());
        assert_eq!(batch.rejected_count, 0);
    }

    #[test]
    fn test_malformed_entries_are_counted_not_fatal() {
        let snapshot = json!({
            "-b": { "author_name": "B", "author_handle": "b", "content": "two", "avatar_url": "" },
            "-a": { "author_name": "A", "author_handle": "a", "content": "one", "avatar_url": "" },
            "-c": "garbage",
            "-d": { "content": 12 },
            "-e": [1, 2, 3]
        });

        let batch = PostBatch::decode(texas(), &snapshot);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.rejected_count, 3);
        let contents: Vec<&str> = batch.posts().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[test]
    fn test_array_partition_decodes_by_index() {
        let snapshot = json!([
            { "author_handle": "a", "content": "zero" },
            null,
            "garbage",
            { "author_handle": "c", "content": "three" }
        ]);

        let batch = PostBatch::decode(texas(), &snapshot);

        assert_eq!(batch.rejected_count, 1);
        let keys: Vec<&str> = batch.accepted.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["0", "3"]);
        let contents: Vec<&str> = batch.posts().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["zero", "three"]);
    }

    #[test]
    fn test_scalar_partition_is_rejected() {
        let batch = PostBatch::decode(texas(), &json!("oops"));

        assert!(batch.is_empty());
        assert_eq!(batch.rejected_count, 1);
    }
}
