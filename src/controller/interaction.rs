// SPDX-License-Identifier: GPL-3.0-only
use tracing::{debug, info};

use crate::controller::events::{ControllerEvent, Outcome};
use crate::controller::mode::Mode;
use crate::controller::state::AppState;
use crate::registry::models::{Coordinate, MarkerId, QuestRecord};
use crate::store::{RemoteWriter, Snapshot};

/// Turns gestures into registry mutations plus remote writes.
///
/// The registry is always updated first; the matching remote write is then
/// spawned and not awaited.
#[derive(Debug, Clone)]
pub struct InteractionController {
    writer: RemoteWriter,
}

impl InteractionController {
    pub fn new(writer: RemoteWriter) -> Self {
        Self { writer }
    }

    pub fn handle(&self, state: &mut AppState, event: ControllerEvent) -> Outcome {
        match event {
            ControllerEvent::MapClick(position) => self.map_click(state, position),
            ControllerEvent::MarkerClick(id) => self.marker_click(state, id),
            ControllerEvent::MarkerDragEnd { id, position } => self.marker_drag_end(state, id, position),
            ControllerEvent::ClearAll => self.clear_all(state),
            ControllerEvent::ToggleMode => {
                let mode = state.mode.toggled();
                Self::set_mode(state, mode)
            }
            ControllerEvent::SetMode(mode) => Self::set_mode(state, mode),
            ControllerEvent::RemoteSnapshot(snapshot) => Self::remote_snapshot(state, snapshot),
        }
    }

    fn map_click(&self, state: &mut AppState, position: Option<Coordinate>) -> Outcome {
        if state.mode != Mode::SetMarker {
            return Outcome::Ignored;
        }
        let Some(position) = position else {
            debug!("Map click without coordinate ignored");
            return Outcome::Ignored;
        };

        let marker = state.registry.add(position);
        self.writer.upsert(marker.id, QuestRecord::new(position));

        info!(marker_id = marker.id, lat = position.lat, lng = position.lng, "Marker placed");
        Outcome::Added(marker)
    }

    fn marker_click(&self, state: &mut AppState, id: MarkerId) -> Outcome {
        state.registry.remove(id);
        self.writer.delete(id);

        info!(marker_id = id, max_id = state.registry.max_id(), "Marker removed");
        Outcome::Removed(id)
    }

    fn marker_drag_end(&self, state: &mut AppState, id: MarkerId, position: Option<Coordinate>) -> Outcome {
        let Some(position) = position else {
            debug!(marker_id = id, "Drag end without coordinate ignored");
            return Outcome::Ignored;
        };

        state.registry.update_position(id, position);
        self.writer.upsert(id, QuestRecord::new(position));

        info!(marker_id = id, lat = position.lat, lng = position.lng, "Marker moved");
        Outcome::Moved(id)
    }

    fn clear_all(&self, state: &mut AppState) -> Outcome {
        state.registry.clear();
        self.writer.delete_all();

        info!("All markers cleared");
        Outcome::Cleared
    }

    fn set_mode(state: &mut AppState, mode: Mode) -> Outcome {
        state.mode = mode;
        debug!(mode = ?mode, "Interaction mode changed");
        Outcome::ModeChanged(mode)
    }

    /// Overwrites local state whatever the mode or pending writes, except
    /// when the remote collection is empty
    fn remote_snapshot(state: &mut AppState, snapshot: Snapshot) -> Outcome {
        if snapshot.is_empty() {
            debug!("Empty remote snapshot, keeping local markers");
            return Outcome::Ignored;
        }

        let markers = snapshot.to_markers();
        let count = markers.len();
        state.registry.replace_all(markers);

        info!(count, "Markers hydrated from remote snapshot");
        Outcome::Replaced(count)
    }
}
