// SPDX-License-Identifier: GPL-3.0-only
use crate::controller::mode::Mode;
use crate::registry::MarkerRegistry;

/// Everything a session mutates, owned by the session loop
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub registry: MarkerRegistry,
    pub mode: Mode,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}
