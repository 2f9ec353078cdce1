/// K8s API objects
pub mod api;

/// Controller configuration
pub mod config;

/// Admission gates for Foo change notifications
pub mod filter;

/// Desired child objects derived from a Foo
pub mod manifest;

/// Reconciliation entry point and controller wiring
pub mod reconciler;

/// Per-kind synchronization of child objects
pub mod reconcilers;

/// Object store abstraction over the K8s API
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kube error: {0}")]
    Kube(#[from] kube::Error),
    #[error("Serde error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("Conflicting write to {kind} {namespace}/{name}")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("Timed out on {verb} {kind} {namespace}/{name}")]
    Timeout {
        verb: &'static str,
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("Invalid Foo spec: {0}")]
    InvalidSpec(String),
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("Missing field in object reference: {0}")]
    MissingField(&'static str),
    #[error("{kind} {name} is already controlled by {owner}")]
    OwnerConflict {
        kind: String,
        name: String,
        owner: String,
    },
}

impl Error {
    /// Whether a later pass with the same inputs can succeed.
    ///
    /// Configuration errors only clear once the Foo spec changes.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Kube(_)
            | Error::NotFound { .. }
            | Error::AlreadyExists { .. }
            | Error::Conflict { .. }
            | Error::Timeout { .. } => true,
            Error::SerdeJson(_)
            | Error::InvalidSpec(_)
            | Error::InvalidManifest(_)
            | Error::MissingField(_)
            | Error::OwnerConflict { .. } => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
