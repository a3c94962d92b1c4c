use crate::issuance_state::{IssuanceEvent, IssuanceState};
use crate::link_state::{LinkEvent, LinkState};

/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid link transition from {from} on {event:?}")]
    InvalidLinkTransition { from: LinkState, event: LinkEvent },

    #[error("invalid issuance transition from {from} on {event:?}")]
    InvalidIssuanceTransition {
        from: IssuanceState,
        event: IssuanceEvent,
    },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("invalid proof request: {0}")]
    InvalidProofRequest(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
