use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tessera_core::{Identifier, SchemaKey};

/// A protocol transition observed by one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A link was created from a received invitation.
    LinkCreated {
        nonce: String,
        name: String,
        remote: Identifier,
    },
    LinkSynced {
        nonce: String,
        name: String,
    },
    LinkAccepted {
        nonce: String,
        name: String,
    },
    /// The remote party announced a credential that can be requested.
    ClaimAvailable {
        nonce: String,
        schema_key: SchemaKey,
    },
    /// A credential was verified and stored in the wallet.
    ClaimReceived {
        schema_key: SchemaKey,
        credential_id: String,
    },
    ProofVerified {
        name: String,
        valid: bool,
    },
    Pong {
        nonce: String,
    },
}

impl Event {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LinkCreated { .. } => "link_created",
            Self::LinkSynced { .. } => "link_synced",
            Self::LinkAccepted { .. } => "link_accepted",
            Self::ClaimAvailable { .. } => "claim_available",
            Self::ClaimReceived { .. } => "claim_received",
            Self::ProofVerified { .. } => "proof_verified",
            Self::Pong { .. } => "pong",
        }
    }

    /// Link nonce the event refers to, if any.
    pub fn nonce(&self) -> Option<&str> {
        match self {
            Self::LinkCreated { nonce, .. }
            | Self::LinkSynced { nonce, .. }
            | Self::LinkAccepted { nonce, .. }
            | Self::ClaimAvailable { nonce, .. }
            | Self::Pong { nonce } => Some(nonce.as_str()),
            Self::ClaimReceived { .. } | Self::ProofVerified { .. } => None,
        }
    }
}

/// An event as recorded by the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the bus's publication order, starting at 1.
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub event: Event,
}
