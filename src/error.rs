// SPDX-License-Identifier: GPL-3.0-only
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Upsert,
    Delete,
    DeleteAll,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteOp::Upsert => "upsert",
            WriteOp::Delete => "delete",
            WriteOp::DeleteAll => "delete_all",
        };
        f.write_str(name)
    }
}

/// A write the remote store did not accept. Never rolled back locally.
#[derive(thiserror::Error, Debug)]
pub enum RemoteWriteError {
    #[error("{op} of '{target}' failed: {source}")]
    Transport {
        op: WriteOp,
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{op} of '{target}' rejected with status {status}: {body}")]
    Status {
        op: WriteOp,
        target: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{op} of '{target}' rejected: {reason}")]
    Rejected {
        op: WriteOp,
        target: String,
        reason: String,
    },
}

impl RemoteWriteError {
    pub fn op(&self) -> WriteOp {
        match self {
            RemoteWriteError::Transport { op, .. }
            | RemoteWriteError::Status { op, .. }
            | RemoteWriteError::Rejected { op, .. } => *op,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            RemoteWriteError::Transport { target, .. }
            | RemoteWriteError::Status { target, .. }
            | RemoteWriteError::Rejected { target, .. } => target,
        }
    }
}

/// The map view could not be brought up. Terminal for the session.
#[derive(thiserror::Error, Debug)]
pub enum MapLoadError {
    #[error("Invalid store URL '{url}': {source}")]
    InvalidStoreUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to build store client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Failed to subscribe to '{path}': {reason}")]
    Subscribe { path: String, reason: String },
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("Map failed to load: {0}")]
    Unavailable(String),

    #[error("Session has stopped")]
    Stopped,
}
