use tessera_core::Role;

/// Identity-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("identity already published: {0}")]
    AlreadyPublished(String),

    #[error("{sponsor} ({role}) may not publish a {target} identity")]
    Unauthorized {
        sponsor: String,
        role: Role,
        target: Role,
    },

    #[error("identifier {identifier} is not derived from verkey {verkey}")]
    IdentifierMismatch { identifier: String, verkey: String },

    #[error("invalid signature for {0}")]
    InvalidSignature(String),

    #[error("core error: {0}")]
    Core(#[from] tessera_core::CoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] tessera_crypto::CryptoError),
}
