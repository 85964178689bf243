// SPDX-License-Identifier: GPL-3.0-only
pub mod service;
pub mod view;

pub use service::{Session, SessionCommand, SessionHandle, SessionSettings};
pub use view::{SessionStatus, SessionView};
