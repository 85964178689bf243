// SPDX-License-Identifier: GPL-3.0-only
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Session-scoped marker identifier (always positive)
pub type MarkerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Unique within the registry at any instant
    pub id: MarkerId,

    /// Current map position
    pub position: Coordinate,
}

impl Marker {
    pub fn new(id: MarkerId, position: Coordinate) -> Self {
        Self { id, position }
    }
}

/// Value stored under `<collection>/<id>` in the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestRecord {
    pub location: Coordinate,

    /// ISO-8601 UTC timestamp of the last local write
    #[serde(default)]
    pub timestamp: String,

    /// Reserved, always written as null. The service drops nulls, so it is
    /// usually missing on read.
    #[serde(default)]
    pub next: Option<serde_json::Value>,
}

impl QuestRecord {
    pub fn new(location: Coordinate) -> Self {
        Self::at(location, Utc::now())
    }

    pub fn at(location: Coordinate, written_at: DateTime<Utc>) -> Self {
        Self {
            location,
            timestamp: written_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            next: None,
        }
    }
}
