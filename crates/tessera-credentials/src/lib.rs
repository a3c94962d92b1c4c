//! Tessera Credentials
//!
//! Credential issuance over accepted links and the holder's wallet:
//! - schema registry keyed by (name, version, issuer)
//! - issuer-side offer → request → issue state machine
//! - per-attribute salted commitments signed by the issuer
//! - holder wallet keyed by schema key
//! - revocation registry

pub mod credential;
pub mod error;
pub mod holder;
pub mod issuer;
pub mod revocation;
pub mod schema;

pub use credential::{CommitmentSet, Credential, HeldCredential, Opening};
pub use error::CredentialError;
pub use holder::Wallet;
pub use issuer::{CredentialOffer, CredentialRequest, Issuer, LinkDirectory};
pub use revocation::RevocationRegistry;
pub use schema::{Schema, SchemaRegistry};
