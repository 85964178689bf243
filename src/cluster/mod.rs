// SPDX-License-Identifier: GPL-3.0-only
pub mod handle;
pub mod projection;
pub mod grid;

pub use handle::{Gesture, GestureDispatch, MarkerHandle};
pub use projection::{ClusterLayer, ClusteringProjection};
pub use grid::{Cluster, GridClusterLayer, GridSettings};
