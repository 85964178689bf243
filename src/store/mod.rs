// SPDX-License-Identifier: GPL-3.0-only
pub mod traits;
pub mod snapshot;
pub mod sse;
pub mod firebase;
pub mod memory;
pub mod writer;

pub use traits::{RemoteStore, Subscription};
pub use snapshot::Snapshot;
pub use firebase::FirebaseStore;
pub use memory::MemoryStore;
pub use writer::{ErrorHook, RemoteWriter};
