// SPDX-License-Identifier: GPL-3.0-only
use serde::Serialize;

use crate::cluster::{Cluster, GridSettings, MarkerHandle};
use crate::controller::Mode;
use crate::registry::models::{Coordinate, Marker, MarkerId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "lowercase")]
pub enum SessionStatus {
    /// Waiting for the first snapshot
    Loading,
    Ready,
    /// The map view could not load; terminal
    Failed(String),
}

/// Immutable picture of the session published after every event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub status: SessionStatus,
    pub mode: Mode,
    pub center: Coordinate,
    pub zoom: u8,
    pub markers: Vec<Marker>,
    pub max_id: MarkerId,
    pub handles: Vec<MarkerHandle>,
    pub clusters: Vec<Cluster>,
    pub grid: GridSettings,
    pub revision: u64,
}

impl SessionView {
    pub fn initial(center: Coordinate, zoom: u8, grid: GridSettings) -> Self {
        Self {
            status: SessionStatus::Loading,
            mode: Mode::default(),
            center,
            zoom,
            markers: Vec::new(),
            max_id: 0,
            handles: Vec::new(),
            clusters: Vec::new(),
            grid,
            revision: 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, SessionStatus::Failed(_))
    }
}
