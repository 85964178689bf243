// SPDX-License-Identifier: GPL-3.0-only
use std::cmp::Ordering;

use serde_json::Value;
use tracing::warn;

use crate::registry::models::{Marker, MarkerId, QuestRecord};

/// Full point-in-time copy of one remote collection.
///
/// Entries are kept in enumeration order: integer-like keys first in
/// ascending numeric order, then every other key lexicographically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: Vec<(String, QuestRecord)>,
}

impl Snapshot {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, QuestRecord)>,
    {
        let mut entries: Vec<(String, QuestRecord)> = entries.into_iter().collect();
        entries.sort_by(|(a, _), (b, _)| compare_keys(a, b));
        Self { entries }
    }

    /// Decode a collection value as returned by the store.
    ///
    /// `null` is an empty collection. Arrays show up when keys are dense
    /// integers; their holes are skipped. Records that fail to decode are
    /// logged and dropped.
    pub fn from_value(value: &Value) -> Self {
        let raw: Vec<(String, &Value)> = match value {
            Value::Null => Vec::new(),
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_null())
                .map(|(index, v)| (index.to_string(), v))
                .collect(),
            other => {
                warn!(value = %other, "Ignoring non-collection snapshot value");
                Vec::new()
            }
        };

        let entries = raw.into_iter().filter_map(|(key, v)| {
            match serde_json::from_value::<QuestRecord>(v.clone()) {
                Ok(record) => Some((key, record)),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping malformed remote record");
                    None
                }
            }
        });

        Self::from_entries(entries)
    }

    pub fn entries(&self) -> &[(String, QuestRecord)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Markers numbered `1..=len` in enumeration order. Remote keys are
    /// not preserved.
    pub fn to_markers(&self) -> Vec<Marker> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, (_, record))| Marker::new(index as MarkerId + 1, record.location))
            .collect()
    }
}

/// Largest key enumerated as an array index
const MAX_INDEX_KEY: u32 = u32::MAX - 1;

fn integer_key(key: &str) -> Option<u32> {
    let n: u32 = key.parse().ok()?;
    // "01" or "+1" are plain strings, not indices
    (n <= MAX_INDEX_KEY && n.to_string() == key).then_some(n)
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    match (integer_key(a), integer_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
