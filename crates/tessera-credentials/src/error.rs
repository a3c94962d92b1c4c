/// Credential system errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("schema not found: {0}")]
    UnknownSchema(String),

    #[error("schema {0} already published with different attributes")]
    SchemaConflict(String),

    #[error("attributes do not match schema {schema}: {reason}")]
    SchemaMismatch { schema: String, reason: String },

    #[error("offer not found: {0}")]
    UnknownOffer(String),

    #[error("no accepted link {nonce} with {holder}")]
    InvalidLink { nonce: String, holder: String },

    #[error("invalid signature from {0}")]
    InvalidSignature(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("credential subject {actual} does not match wallet owner {expected}")]
    SubjectMismatch { expected: String, actual: String },

    #[error("core error: {0}")]
    Core(#[from] tessera_core::CoreError),

    #[error("identity error: {0}")]
    Identity(#[from] tessera_identity::IdentityError),

    #[error("crypto error: {0}")]
    Crypto(#[from] tessera_crypto::CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
