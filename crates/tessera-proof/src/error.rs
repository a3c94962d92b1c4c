use tessera_core::CoreError;

/// Proof engine errors.
#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("invalid proof request: {0}")]
    InvalidProofRequest(String),

    #[error("insufficient credentials for {request}: no credential provides {}", .missing.join(", "))]
    InsufficientCredentials {
        request: String,
        missing: Vec<String>,
    },

    #[error("proof invalid: {0}")]
    ProofInvalid(String),

    #[error("proof generation failed: {0}")]
    GenerationFailed(String),

    #[error("core error: {0}")]
    Core(CoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] tessera_crypto::CryptoError),

    #[error("credential error: {0}")]
    Credential(#[from] tessera_credentials::CredentialError),

    #[error("identity error: {0}")]
    Identity(#[from] tessera_identity::IdentityError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CoreError> for ProofError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidProofRequest(reason) => Self::InvalidProofRequest(reason),
            other => Self::Core(other),
        }
    }
}

impl ProofError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::ProofInvalid(reason.into())
    }
}
