//! Tessera Identity Registry
//!
//! Resolves decentralized identifiers to their current verification key,
//! role and endpoint:
//! - identity publication gated by sponsor role (steward / trust anchor)
//! - key rotation and endpoint updates as superseding versions
//! - async resolution (local, composite)

pub mod error;
pub mod identity;
pub mod registry;
pub mod resolver;

pub use error::IdentityError;
pub use identity::Identity;
pub use registry::IdentityRegistry;
pub use resolver::{CompositeResolver, IdentityResolver, LocalResolver};
