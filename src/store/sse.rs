// SPDX-License-Identifier: GPL-3.0-only
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

/// One raw Server-Sent Event
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental Server-Sent Events decoder; chunks may split anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        // JSON payloads escape CR, so any raw CR is part of a line ending
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_blank_line(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..end])) {
                events.push(event);
            }
        }
        events
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event.event = value.to_string(),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if event.event.is_empty() && data_lines.is_empty() {
        return None;
    }
    event.data = data_lines.join("\n");
    Some(event)
}

/// Realtime Database streaming events
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Put { path: String, data: Value },
    Patch { path: String, data: Value },
    KeepAlive,
    Cancel(String),
    AuthRevoked,
}

#[derive(Deserialize)]
struct PathData {
    path: String,
    #[serde(default)]
    data: Value,
}

impl StreamEvent {
    pub fn from_sse(event: &SseEvent) -> Option<Self> {
        match event.event.as_str() {
            "put" | "patch" => {
                let payload: PathData = match serde_json::from_str(&event.data) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(event = %event.event, error = %e, "Malformed stream payload");
                        return None;
                    }
                };
                Some(if event.event == "put" {
                    StreamEvent::Put { path: payload.path, data: payload.data }
                } else {
                    StreamEvent::Patch { path: payload.path, data: payload.data }
                })
            }
            "keep-alive" => Some(StreamEvent::KeepAlive),
            "cancel" => Some(StreamEvent::Cancel(event.data.clone())),
            "auth_revoked" => Some(StreamEvent::AuthRevoked),
            other => {
                warn!(event = %other, "Unknown stream event");
                None
            }
        }
    }
}

/// Mirror of the remote tree under the subscribed path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteTree {
    root: Value,
}

impl RemoteTree {
    pub fn new() -> Self {
        Self { root: Value::Null }
    }

    pub fn value(&self) -> &Value {
        &self.root
    }

    /// Set `path` to `data`; null deletes
    pub fn put(&mut self, path: &str, data: Value) {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            self.root = data;
            return;
        };

        if data.is_null() {
            let mut node = &mut self.root;
            for segment in parents {
                match node.get_mut(*segment) {
                    Some(child) => node = child,
                    None => return,
                }
            }
            if let Value::Object(map) = node {
                map.remove(*last);
            } else if let Value::Array(items) = node {
                if let Ok(index) = last.parse::<usize>() {
                    if let Some(slot) = items.get_mut(index) {
                        *slot = Value::Null;
                    }
                }
            }
            return;
        }

        let mut node = &mut self.root;
        for segment in parents {
            node = as_object(node)
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        as_object(node).insert(last.to_string(), data);
    }

    /// Merge each child of `data` into `path`
    pub fn patch(&mut self, path: &str, data: Value) {
        let Value::Object(children) = data else {
            warn!(path = %path, "Ignoring non-object patch");
            return;
        };
        let base = path.trim_end_matches('/');
        for (key, value) in children {
            self.put(&format!("{}/{}", base, key), value);
        }
    }

    pub fn apply(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Put { path, data } => {
                self.put(&path, data);
                true
            }
            StreamEvent::Patch { path, data } => {
                self.patch(&path, data);
                true
            }
            _ => false,
        }
    }
}

/// Coerce `node` into an object; arrays keep their non-null slots by index
fn as_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        let mut map = Map::new();
        if let Value::Array(items) = node.take() {
            for (index, item) in items.into_iter().enumerate() {
                if !item.is_null() {
                    map.insert(index.to_string(), item);
                }
            }
        }
        *node = Value::Object(map);
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}
