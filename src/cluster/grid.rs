// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;

use crate::cluster::handle::MarkerHandle;
use crate::cluster::projection::ClusterLayer;
use crate::registry::models::{Coordinate, MarkerId};

/// Web Mercator tile size in pixels
const TILE_SIZE: f64 = 256.0;

/// Sine of latitude is clamped here to keep the poles finite
const MAX_SIN_LAT: f64 = 0.9999;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSettings {
    /// Cell edge in screen pixels
    pub grid_size: f64,

    /// Above this zoom every handle is its own cluster
    pub max_zoom: u8,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            grid_size: 60.0,
            max_zoom: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    /// Mean position of the members
    pub position: Coordinate,
    pub count: usize,
    pub marker_ids: Vec<MarkerId>,
}

/// World pixel coordinates of `position` at `zoom`
pub fn world_pixel(position: Coordinate, zoom: u8) -> (f64, f64) {
    let world = TILE_SIZE * 2f64.powi(zoom as i32);
    let sin_lat = (position.lat * PI / 180.0).sin().clamp(-MAX_SIN_LAT, MAX_SIN_LAT);

    let x = (position.lng + 180.0) / 360.0 * world;
    let y = (0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI)) * world;
    (x, y)
}

/// Group handles into grid cells at `zoom`. Clusters come out in the order
/// their first member appears in `handles`.
pub fn cluster_handles(handles: &[MarkerHandle], zoom: u8, settings: GridSettings) -> Vec<Cluster> {
    if zoom > settings.max_zoom || settings.grid_size <= 0.0 {
        return handles
            .iter()
            .map(|handle| Cluster {
                position: handle.position,
                count: 1,
                marker_ids: vec![handle.marker_id],
            })
            .collect();
    }

    let mut cells: HashMap<(i64, i64), usize> = HashMap::new();
    let mut sums: Vec<(f64, f64)> = Vec::new();
    let mut clusters: Vec<Cluster> = Vec::new();

    for handle in handles {
        let (x, y) = world_pixel(handle.position, zoom);
        let cell = (
            (x / settings.grid_size).floor() as i64,
            (y / settings.grid_size).floor() as i64,
        );

        let index = *cells.entry(cell).or_insert_with(|| {
            clusters.push(Cluster {
                position: handle.position,
                count: 0,
                marker_ids: Vec::new(),
            });
            sums.push((0.0, 0.0));
            clusters.len() - 1
        });

        let cluster = &mut clusters[index];
        cluster.count += 1;
        cluster.marker_ids.push(handle.marker_id);
        sums[index].0 += handle.position.lat;
        sums[index].1 += handle.position.lng;
    }

    for (cluster, (lat, lng)) in clusters.iter_mut().zip(sums) {
        let n = cluster.count as f64;
        cluster.position = Coordinate::new(lat / n, lng / n);
    }
    clusters
}

/// In-process clustering layer holding the handles of the last pass
#[derive(Debug, Clone, Default)]
pub struct GridClusterLayer {
    handles: Vec<MarkerHandle>,
    settings: GridSettings,
}

impl GridClusterLayer {
    pub fn new(settings: GridSettings) -> Self {
        Self {
            handles: Vec::new(),
            settings,
        }
    }

    pub fn handles(&self) -> &[MarkerHandle] {
        &self.handles
    }

    pub fn clusters(&self, zoom: u8) -> Vec<Cluster> {
        cluster_handles(&self.handles, zoom, self.settings)
    }
}

impl ClusterLayer for GridClusterLayer {
    fn clear_all(&mut self) {
        self.handles.clear();
    }

    fn add_all(&mut self, handles: Vec<MarkerHandle>) {
        self.handles.extend(handles);
    }
}
