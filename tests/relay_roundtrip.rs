#![cfg(feature = "relay")]

use futures::StreamExt;
use geotweets::config::RelayConfig;
use geotweets::feed::{FeedUpdate, MemoryFeedStore, RemoteFeedSync, RestFeedStore};
use geotweets::{LocationKey, Post, RelayServer};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

struct Relay {
    base_url: String,
    store: MemoryFeedStore,
    token: CancellationToken,
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn spawn_relay() -> Relay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = RelayConfig {
        ip: addr.ip().to_string(),
        port: addr.port(),
    };

    let store = MemoryFeedStore::new(32);
    let server = RelayServer::new(config, store.clone());
    let token = CancellationToken::new();
    let server_token = token.clone();
    tokio::spawn(async move {
        server.serve(listener, server_token).await.unwrap();
    });

    Relay {
        base_url: format!("http://{}", addr),
        store,
        token,
    }
}

fn rest_sync(base_url: &str) -> RemoteFeedSync {
    let store = RestFeedStore::new(base_url, None, Duration::from_secs(2)).unwrap();
    RemoteFeedSync::new(Arc::new(store))
}

async fn next_update(subscription: &mut geotweets::feed::FeedSubscription) -> FeedUpdate {
    timeout(Duration::from_secs(5), subscription.next())
        .await
        .expect("timed out waiting for a feed update")
        .expect("subscription ended")
}

#[tokio::test]
async fn test_second_client_append_reaches_watcher() {
    let relay = spawn_relay().await;
    let ohio = LocationKey::from_admin_area(Some("Ohio"));

    let watcher = rest_sync(&relay.base_url);
    let writer = rest_sync(&relay.base_url);

    let mut subscription = watcher.subscribe(&ohio);
    match next_update(&mut subscription).await {
        FeedUpdate::Snapshot(batch) => assert!(batch.is_empty()),
        other => panic!("Unexpected update: {:?}", other),
    }

    writer.append(&ohio, Post::authored_by("bob@example.com", "hello from bob"));

    match next_update(&mut subscription).await {
        FeedUpdate::Snapshot(batch) => {
            assert_eq!(batch.len(), 1);
            assert_eq!(batch.accepted[0].post.content, "hello from bob");
            assert_eq!(batch.accepted[0].post.author_handle, "bob@example.com");
            assert_eq!(batch.rejected_count, 0);
        }
        other => panic!("Unexpected update: {:?}", other),
    }

    assert!(relay.store.snapshot("tweets/Ohio").is_object());
}

#[tokio::test]
async fn test_areas_with_url_metacharacters_round_trip() {
    let relay = spawn_relay().await;
    let area = LocationKey::from_admin_area(Some("Who? 100%"));

    let watcher = rest_sync(&relay.base_url);
    let writer = rest_sync(&relay.base_url);

    let mut subscription = watcher.subscribe(&area);
    match next_update(&mut subscription).await {
        FeedUpdate::Snapshot(batch) => assert!(batch.is_empty()),
        other => panic!("Unexpected update: {:?}", other),
    }

    writer.append(&area, Post::authored_by("q@example.com", "anyone?"));

    match next_update(&mut subscription).await {
        FeedUpdate::Snapshot(batch) => {
            assert_eq!(batch.len(), 1);
            assert_eq!(batch.accepted[0].post.content, "anyone?");
        }
        other => panic!("Unexpected update: {:?}", other),
    }

    assert!(relay.store.snapshot("tweets/Who? 100%").is_object());
}

/// Answers one event-stream request with headers only, then holds the socket open
async fn spawn_silent_stream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_silent_event_stream_disconnects_once() {
    let base_url = spawn_silent_stream().await;
    let store = RestFeedStore::new(&base_url, None, Duration::from_secs(2))
        .unwrap()
        .with_idle_timeout(Duration::from_millis(300));
    let watcher = RemoteFeedSync::new(Arc::new(store));

    let mut subscription = watcher.subscribe(&LocationKey::from_admin_area(Some("Ohio")));

    match next_update(&mut subscription).await {
        FeedUpdate::Disconnected { cause } => assert!(cause.contains("idle"), "{}", cause),
        other => panic!("Unexpected update: {:?}", other),
    }
    assert!(timeout(Duration::from_secs(1), subscription.next())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_malformed_entries_are_counted_not_fatal() {
    let relay = spawn_relay().await;
    relay.store.push("tweets/Utah", json!({ "content": "ok" }));
    relay.store.push("tweets/Utah", json!("not a post"));

    let watcher = rest_sync(&relay.base_url);
    let mut subscription = watcher.subscribe(&LocationKey::from_admin_area(Some("Utah")));

    match next_update(&mut subscription).await {
        FeedUpdate::Snapshot(batch) => {
            assert_eq!(batch.len(), 1);
            assert_eq!(batch.rejected_count, 1);
        }
        other => panic!("Unexpected update: {:?}", other),
    }
}

#[tokio::test]
async fn test_server_cancel_disconnects_once() {
    let relay = spawn_relay().await;
    let watcher = rest_sync(&relay.base_url);
    let mut subscription = watcher.subscribe(&LocationKey::from_admin_area(Some("Texas")));

    assert!(matches!(
        next_update(&mut subscription).await,
        FeedUpdate::Snapshot(_)
    ));

    relay.store.disconnect("maintenance");

    match next_update(&mut subscription).await {
        FeedUpdate::Disconnected { cause } => assert!(cause.contains("maintenance")),
        other => panic!("Unexpected update: {:?}", other),
    }
    let end = timeout(Duration::from_secs(2), subscription.next()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_rest_interface() {
    let relay = spawn_relay().await;
    let http = reqwest::Client::new();

    let health = http
        .get(format!("{}/health", relay.base_url))
        .send()
        .await
        .unwrap();
    assert!(health.status().is_success());
    assert_eq!(health.text().await.unwrap(), "OK");

    let empty: Value = http
        .get(format!("{}/tweets/Ohio.json", relay.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(empty, Value::Null);

    let created: Value = http
        .post(format!("{}/tweets/Ohio.json", relay.base_url))
        .json(&json!({ "content": "posted" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let key = created["name"].as_str().unwrap().to_string();
    assert_eq!(key.len(), 20);

    let put = http
        .put(format!("{}/tweets/Ohio/manual.json", relay.base_url))
        .json(&json!({ "content": "put" }))
        .send()
        .await
        .unwrap();
    assert!(put.status().is_success());

    let snapshot: Value = http
        .get(format!("{}/tweets/Ohio.json", relay.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot[key.as_str()]["content"], "posted");
    assert_eq!(snapshot["manual"]["content"], "put");

    let bad_json = http
        .post(format!("{}/tweets/Ohio.json", relay.base_url))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(bad_json.status(), reqwest::StatusCode::BAD_REQUEST);

    let bad_path = http
        .get(format!("{}/users/Ohio.json", relay.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_path.status(), reqwest::StatusCode::BAD_REQUEST);
}
