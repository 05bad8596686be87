use crate::feed::{FeedStore, StoreEvent};
use crate::location::LocationKey;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::server::RelayState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Handler for health check endpoint
pub async fn health_handler() -> &'static str {
    "OK"
}

/// `GET /tweets/{key}.json`: snapshot, or an event stream when requested
pub async fn read_handler(
    State(state): State<RelayState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let partition = match partition_path(&path) {
        Some(partition) => partition,
        None => return bad_request(format!("Not a partition path: {}", path)),
    };

    if accepts_event_stream(&headers) {
        info!("New event stream client on {}", partition);
        return event_stream(state, partition).into_response();
    }

    Json(state.store.snapshot(&partition)).into_response()
}

/// `PUT /tweets/{key}/{id}.json`: store the body under `id`
pub async fn write_handler(
    State(state): State<RelayState>,
    Path(path): Path<String>,
    body: Bytes,
) -> Response {
    let (partition, key) = match entry_path(&path) {
        Some(target) => target,
        None => return bad_request(format!("Not an entry path: {}", path)),
    };
    let value = match parse_body(&body) {
        Ok(value) => value,
        Err(response) => return response,
    };

    match state.store.put(&partition, &key, value.clone()).await {
        Ok(()) => {
            debug!("Stored {}/{}", partition, key);
            Json(value).into_response()
        }
        Err(e) => bad_request(e.to_string()),
    }
}

/// `POST /tweets/{key}.json`: store the body under a fresh push id
pub async fn push_handler(
    State(state): State<RelayState>,
    Path(path): Path<String>,
    body: Bytes,
) -> Response {
    let partition = match partition_path(&path) {
        Some(partition) => partition,
        None => return bad_request(format!("Not a partition path: {}", path)),
    };
    let value = match parse_body(&body) {
        Ok(value) => value,
        Err(response) => return response,
    };

    let id = state.store.push(&partition, value);
    debug!("Pushed {}/{}", partition, id);
    Json(json!({ "name": id.as_str() })).into_response()
}

fn event_stream(state: RelayState, partition: String) -> impl IntoResponse {
    let stream = async_stream::stream! {
        match state.store.watch(&partition).await {
            Ok(mut watch) => loop {
                let next = tokio::select! {
                    _ = state.shutdown.cancelled() => None,
                    event = watch.next() => event,
                };

                match next {
                    Some(StoreEvent::Snapshot(data)) => {
                        let payload = json!({ "path": "/", "data": data });
                        yield Ok::<_, Infallible>(Event::default().event("put").data(payload.to_string()));
                    }
                    Some(StoreEvent::Cancelled(cause)) => {
                        warn!("Event stream on {} cancelled: {}", partition, cause);
                        yield Ok(Event::default().event("cancel").data(Value::String(cause).to_string()));
                        break;
                    }
                    None => break,
                }
            },
            Err(e) => {
                yield Ok(Event::default().event("cancel").data(Value::String(e.to_string()).to_string()));
            }
        }
        debug!("Event stream on {} ended", partition);
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| accept.contains("text/event-stream"))
        .unwrap_or(false)
}

fn parse_body(body: &Bytes) -> Result<Value, Response> {
    serde_json::from_slice(body).map_err(|e| bad_request(format!("Invalid JSON body: {}", e)))
}

fn bad_request(message: String) -> Response {
    debug!("Rejecting relay request: {}", message);
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// `tweets/Ohio.json` -> `tweets/Ohio`
fn partition_path(path: &str) -> Option<String> {
    let path = path.trim_start_matches('/').strip_suffix(".json")?;
    LocationKey::from_partition_path(path).map(|key| key.partition_path())
}

/// `tweets/Ohio/-Nabc.json` -> (`tweets/Ohio`, `-Nabc`)
fn entry_path(path: &str) -> Option<(String, String)> {
    let path = path.trim_start_matches('/').strip_suffix(".json")?;
    let (partition, key) = path.rsplit_once('/')?;
    if key.is_empty() {
        return None;
    }
    let location = LocationKey::from_partition_path(partition)?;
    Some((location.partition_path(), key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_paths() {
        assert_eq!(partition_path("tweets/Ohio.json"), Some("tweets/Ohio".to_string()));
        assert_eq!(partition_path("tweets/Ohio"), None);
        assert_eq!(partition_path("users/Ohio.json"), None);
        assert_eq!(partition_path("tweets/Ohio/k1.json"), None);
    }

    #[test]
    fn test_entry_paths() {
        assert_eq!(
            entry_path("tweets/Ohio/-Nabc.json"),
            Some(("tweets/Ohio".to_string(), "-Nabc".to_string()))
        );
        assert_eq!(entry_path("tweets/Ohio.json"), None);
        assert_eq!(entry_path("tweets/Ohio/.json"), None);
    }

    #[test]
    fn test_accept_header_detection() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_event_stream(&headers));

        headers.insert(header::ACCEPT, "text/event-stream".parse().unwrap());
        assert!(accepts_event_stream(&headers));
    }
}
