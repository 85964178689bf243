// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::controller::ControllerEvent;
use crate::registry::models::{Coordinate, Marker, MarkerId};

/// Visual handle for one marker on the clustering layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerHandle {
    pub marker_id: MarkerId,
    pub position: Coordinate,
    pub label: String,
    pub draggable: bool,
}

impl MarkerHandle {
    pub fn for_marker(marker: &Marker) -> Self {
        Self {
            marker_id: marker.id,
            position: marker.position,
            label: marker.id.to_string(),
            draggable: true,
        }
    }
}

/// Gesture performed on a marker handle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Gesture {
    Click,
    DragEnd { position: Option<Coordinate> },
}

/// Marker id to handle binding for the handles currently on the layer.
///
/// Gestures are routed through here instead of per-handle closures, so a
/// gesture on a handle that a later pass replaced goes nowhere.
#[derive(Debug, Clone, Default)]
pub struct GestureDispatch {
    bound: HashSet<MarkerId>,
}

impl GestureDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebind(&mut self, handles: &[MarkerHandle]) {
        self.bound = handles.iter().map(|handle| handle.marker_id).collect();
    }

    pub fn is_bound(&self, marker_id: MarkerId) -> bool {
        self.bound.contains(&marker_id)
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    /// Click deletes, drag end moves
    pub fn resolve(&self, marker_id: MarkerId, gesture: Gesture) -> Option<ControllerEvent> {
        if !self.is_bound(marker_id) {
            return None;
        }
        Some(match gesture {
            Gesture::Click => ControllerEvent::MarkerClick(marker_id),
            Gesture::DragEnd { position } => ControllerEvent::MarkerDragEnd {
                id: marker_id,
                position,
            },
        })
    }
}
