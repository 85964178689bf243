// SPDX-License-Identifier: GPL-3.0-only
use tracing::debug;

use crate::cluster::handle::{GestureDispatch, MarkerHandle};
use crate::registry::MarkerRegistry;

/// Target of a projection pass, e.g. a map widget's marker clusterer
pub trait ClusterLayer: Send {
    /// Remove every handle from the layer
    fn clear_all(&mut self);

    /// Add a batch of handles in one call
    fn add_all(&mut self, handles: Vec<MarkerHandle>);
}

/// Keeps a clustering layer in step with a marker registry by clearing and
/// rebuilding it whenever the registry's marker list changes.
pub struct ClusteringProjection<L: ClusterLayer> {
    layer: L,
    dispatch: GestureDispatch,
    last_revision: Option<u64>,
    passes: u64,
}

impl<L: ClusterLayer> ClusteringProjection<L> {
    pub fn new(layer: L) -> Self {
        Self {
            layer,
            dispatch: GestureDispatch::new(),
            last_revision: None,
            passes: 0,
        }
    }

    /// Rebuild the layer if the registry changed since the last pass.
    /// Returns whether a pass ran.
    pub fn sync(&mut self, registry: &MarkerRegistry) -> bool {
        if self.last_revision == Some(registry.revision()) {
            return false;
        }

        self.layer.clear_all();
        let handles: Vec<MarkerHandle> = registry.markers().iter().map(MarkerHandle::for_marker).collect();
        self.dispatch.rebind(&handles);
        let count = handles.len();
        self.layer.add_all(handles);

        self.last_revision = Some(registry.revision());
        self.passes += 1;
        debug!(count, revision = registry.revision(), "Clustering layer rebuilt");
        true
    }

    pub fn layer(&self) -> &L {
        &self.layer
    }

    pub fn dispatch(&self) -> &GestureDispatch {
        &self.dispatch
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }
}
