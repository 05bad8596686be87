//! Server-Sent Events framing and the partition-tree updates carried over it.
//!
//! The store streams `put` and `patch` events whose data is
//! `{"path": "/a/b", "data": <json>}`; `put` replaces the value at `path`,
//! `patch` merges the children of `data` into it.

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental decoder; chunks may split events (and UTF-8 sequences) anywhere
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_block_end(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..end])) {
                events.push(event);
            }
        }
        events
    }
}

fn find_block_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = String::from("message");
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = value.to_string(),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() && event == "message" {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

/// Payload of `put` and `patch` events
#[derive(Debug, Deserialize)]
pub struct PathUpdate {
    pub path: String,
    #[serde(default)]
    pub data: Value,
}

/// Replace the value at `path` (`null` deletes it)
pub fn apply_put(tree: &mut Value, path: &str, data: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.split_last() {
        None => *tree = data,
        Some((last, parents)) => {
            let mut node = &mut *tree;
            for segment in parents {
                node = ensure_object(node)
                    .entry(segment.to_string())
                    .or_insert(Value::Null);
            }
            let children = ensure_object(node);
            if data.is_null() {
                children.remove(*last);
            } else {
                children.insert(last.to_string(), data);
            }
        }
    }

    prune(tree);
}

/// Merge each child of `data` into the value at `path`
pub fn apply_patch(tree: &mut Value, path: &str, data: Value) {
    match data {
        Value::Object(children) => {
            let base = path.trim_end_matches('/');
            for (key, value) in children {
                apply_put(tree, &format!("{}/{}", base, key), value);
            }
        }
        other => apply_put(tree, path, other),
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

// Empty objects collapse to null, as the store never keeps empty nodes
fn prune(node: &mut Value) {
    if let Value::Object(map) = node {
        for child in map.values_mut() {
            prune(child);
        }
        map.retain(|_, v| !v.is_null());
        if map.is_empty() {
            *node = Value::Null;
        }
    }
}
