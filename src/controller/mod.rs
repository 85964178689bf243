// SPDX-License-Identifier: GPL-3.0-only
pub mod mode;
pub mod state;
pub mod events;
pub mod interaction;

pub use mode::Mode;
pub use state::AppState;
pub use events::{ControllerEvent, Outcome};
pub use interaction::InteractionController;
