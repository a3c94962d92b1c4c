use std::time::Duration;

use tessera_core::CoreError;
use tessera_identity::IdentityError;

/// Link-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("invalid invitation signature from {0}")]
    InvalidSignature(String),

    #[error("invitation issuer is not published: {0}")]
    UnknownIssuer(String),

    #[error("malformed invitation: {0}")]
    MalformedInvitation(String),

    #[error("no link for nonce {0}")]
    UnknownLink(String),

    #[error("no invitation issued with nonce {0}")]
    UnknownInvitation(String),

    #[error("an invitation was already issued with nonce {0}")]
    DuplicateNonce(String),

    #[error("link {nonce} is {state}, expected {expected}")]
    WrongState {
        nonce: String,
        state: tessera_core::LinkState,
        expected: tessera_core::LinkState,
    },

    #[error("invitation {0} has not been synced")]
    NotSynced(String),

    #[error("link {0} has expired")]
    Expired(String),

    #[error("expected counterpart {expected}, got {actual}")]
    CounterpartMismatch { expected: String, actual: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transport call timed out after {0:?}")]
    Timeout(Duration),

    #[error("link {nonce} could not be completed after {attempts} attempts: {last_error}")]
    SyncFailed {
        nonce: String,
        attempts: u32,
        last_error: String,
    },

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LinkError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}
