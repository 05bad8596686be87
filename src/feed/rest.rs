use super::sse::{apply_patch, apply_put, PathUpdate, SseDecoder, SseEvent};
use super::store::{FeedStore, StoreEvent, StoreEventStream};
use crate::error::FeedError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Store client speaking the hosted database's REST + event-stream contract
#[derive(Clone)]
pub struct RestFeedStore {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
    write_timeout: Duration,
    idle_timeout: Duration,
}

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

impl RestFeedStore {
    /// Create a client for the database at `base_url`.
    ///
    /// Only connecting is bounded by `connect_timeout`; watches are long-lived,
    /// while writes are additionally bounded by the same duration end to end.
    pub fn new(
        base_url: impl Into<String>,
        auth_token: Option<String>,
        connect_timeout: Duration,
    ) -> Result<Self, FeedError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| FeedError::Transport {
                details: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
            write_timeout: connect_timeout,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    /// Treat an event stream that stays silent for `idle_timeout` as lost.
    ///
    /// The server sends keep-alives, so this should be a few keep-alive intervals.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// `{base}/{path}.json` with every segment percent-encoded
    fn url(&self, path: &str) -> Result<Url, FeedError> {
        let invalid = || FeedError::InvalidPartition {
            path: path.to_string(),
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| FeedError::Transport {
            details: format!("Invalid database URL {}: {}", self.base_url, e),
        })?;

        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let last = segments.pop().ok_or_else(invalid)?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments)
            .push(&format!("{}.json", last));
        Ok(url)
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }

    /// Apply one stream event to the local tree; `Err` carries a cancel cause
    fn handle_event(tree: &mut Value, event: SseEvent) -> Result<bool, String> {
        match event.event.as_str() {
            "put" | "patch" => {
                let update: PathUpdate = match serde_json::from_str(&event.data) {
                    Ok(update) => update,
                    Err(e) => {
                        warn!("Ignoring undecodable {} event: {}", event.event, e);
                        return Ok(false);
                    }
                };
                if event.event == "put" {
                    apply_put(tree, &update.path, update.data);
                } else {
                    apply_patch(tree, &update.path, update.data);
                }
                Ok(true)
            }
            "keep-alive" => Ok(false),
            "cancel" => Err(format!("watch cancelled by server: {}", event.data)),
            "auth_revoked" => Err("database credentials revoked".to_string()),
            other => {
                debug!("Ignoring stream event '{}'", other);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl FeedStore for RestFeedStore {
    async fn put(&self, partition: &str, key: &str, value: Value) -> Result<(), FeedError> {
        let url = self.url(&format!("{}/{}", partition, key))?;
        debug!("PUT {}", url);

        let response = self
            .with_auth(self.client.put(url))
            .timeout(self.write_timeout)
            .json(&value)
            .send()
            .await
            .map_err(|e| FeedError::Transport {
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FeedError::WriteRejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn watch(&self, partition: &str) -> Result<StoreEventStream, FeedError> {
        let url = self.url(partition)?;
        info!("Opening event stream on {}", url);

        let response = self
            .with_auth(self.client.get(url))
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| FeedError::Transport {
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FeedError::Transport {
                details: format!("event stream rejected with status {}", response.status()),
            });
        }

        let mut body = Box::pin(response.bytes_stream());
        let idle_timeout = self.idle_timeout;

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            let mut tree = Value::Null;

            'events: loop {
                let next = match tokio::time::timeout(idle_timeout, body.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!("Event stream silent for {:?}, dropping it", idle_timeout);
                        yield StoreEvent::Cancelled(format!(
                            "event stream idle for {}s",
                            idle_timeout.as_secs_f64()
                        ));
                        break;
                    }
                };

                match next {
                    Some(Ok(chunk)) => {
                        for event in decoder.feed(&chunk) {
                            match RestFeedStore::handle_event(&mut tree, event) {
                                Ok(true) => yield StoreEvent::Snapshot(tree.clone()),
                                Ok(false) => {}
                                Err(cause) => {
                                    yield StoreEvent::Cancelled(cause);
                                    break 'events;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        yield StoreEvent::Cancelled(format!("event stream failed: {}", e));
                        break;
                    }
                    None => {
                        yield StoreEvent::Cancelled("event stream closed by server".to_string());
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn backend_name(&self) -> &'static str {
        "rest"
    }
}
