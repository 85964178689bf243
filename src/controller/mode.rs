// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};

/// What a plain map click does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    /// Clicks pan/zoom the map
    #[default]
    Move,
    /// Clicks place markers
    SetMarker,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Move => Mode::SetMarker,
            Mode::SetMarker => Mode::Move,
        }
    }
}
