// SPDX-License-Identifier: GPL-3.0-only
use tracing::debug;

use crate::registry::models::{Coordinate, Marker, MarkerId};

/// In-memory authoritative marker list for the running session.
///
/// Every mutation is synchronous and local. Propagating a change to the
/// remote store is the caller's job.
#[derive(Debug, Clone, Default)]
pub struct MarkerRegistry {
    markers: Vec<Marker>,

    /// Highest id issued this session, see `remove` for how it shrinks
    max_id: MarkerId,

    /// Bumped whenever the observable marker list changes
    revision: u64,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn get(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.iter().find(|marker| marker.id == id)
    }

    pub fn max_id(&self) -> MarkerId {
        self.max_id
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Append a marker with id `max_id + 1`
    pub fn add(&mut self, position: Coordinate) -> Marker {
        let marker = Marker::new(self.max_id + 1, position);
        self.max_id = marker.id;
        self.markers.push(marker.clone());
        self.touch();

        debug!(marker_id = marker.id, "Marker added to registry");
        marker
    }

    /// Drop the marker with `id`, returning it if it was present.
    ///
    /// When `id` equals the current maximum, the maximum is decremented by
    /// one (not recomputed), whether or not the marker was present. Deleting
    /// out of order can therefore leave `max_id` below the largest live id.
    pub fn remove(&mut self, id: MarkerId) -> Option<Marker> {
        let removed = self
            .markers
            .iter()
            .position(|marker| marker.id == id)
            .map(|index| self.markers.remove(index));

        if removed.is_some() {
            self.touch();
        }

        if id == self.max_id {
            self.max_id = self.max_id.saturating_sub(1);
        }

        removed
    }

    /// Move the marker with `id`. Returns false when it is absent.
    pub fn update_position(&mut self, id: MarkerId, position: Coordinate) -> bool {
        match self.markers.iter_mut().find(|marker| marker.id == id) {
            Some(marker) => {
                marker.position = position;
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Full replacement from a remote snapshot; `max_id` becomes the new length
    pub fn replace_all(&mut self, markers: Vec<Marker>) {
        self.max_id = markers.len() as MarkerId;
        self.markers = markers;
        self.touch();
    }

    pub fn clear(&mut self) {
        self.markers.clear();
        self.max_id = 0;
        self.touch();
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}
