// SPDX-License-Identifier: GPL-3.0-only
pub mod models;
pub mod markers;

pub use models::{Coordinate, Marker, MarkerId, QuestRecord};
pub use markers::MarkerRegistry;
