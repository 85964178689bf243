// SPDX-License-Identifier: GPL-3.0-only
use serde::Serialize;

use crate::controller::mode::Mode;
use crate::registry::models::{Coordinate, Marker, MarkerId};
use crate::store::Snapshot;

/// Input to the interaction controller
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// Click on the map; None when the widget could not resolve a coordinate
    MapClick(Option<Coordinate>),
    MarkerClick(MarkerId),
    MarkerDragEnd {
        id: MarkerId,
        position: Option<Coordinate>,
    },
    ClearAll,
    ToggleMode,
    SetMode(Mode),
    RemoteSnapshot(Snapshot),
}

/// What handling an event did to local state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    Added(Marker),
    Removed(MarkerId),
    Moved(MarkerId),
    Cleared,
    ModeChanged(Mode),
    Replaced(usize),
    Ignored,
}
