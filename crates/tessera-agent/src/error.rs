/// Agent-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("no link {0}")]
    UnknownLink(String),

    #[error("no claim {name} available on link {nonce}")]
    UnknownClaim { nonce: String, name: String },

    #[error("no proof request {name} on link {nonce}")]
    UnknownProofRequest { nonce: String, name: String },

    #[error("proof from {holder} on link {nonce}, which is not the accepted counterpart")]
    NotCounterpart { nonce: String, holder: String },

    #[error("core error: {0}")]
    Core(#[from] tessera_core::CoreError),

    #[error("identity error: {0}")]
    Identity(#[from] tessera_identity::IdentityError),

    #[error("link error: {0}")]
    Link(#[from] tessera_links::LinkError),

    #[error("credential error: {0}")]
    Credential(#[from] tessera_credentials::CredentialError),

    #[error("proof error: {0}")]
    Proof(#[from] tessera_proof::ProofError),

    #[error("event error: {0}")]
    Event(#[from] tessera_events::EventError),
}
