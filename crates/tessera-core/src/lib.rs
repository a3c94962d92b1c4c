//! Tessera Core: fundamental types, errors, state machines and configuration
//! shared by every layer of the Tessera credential-exchange engine.

pub mod config;
pub mod error;
pub mod issuance_state;
pub mod link_state;
pub mod locks;
pub mod proof_request;
pub mod types;

pub use config::{EngineConfig, RetryPolicy};
pub use error::CoreError;
pub use issuance_state::{IssuanceEvent, IssuanceState, IssuanceStateMachine};
pub use link_state::{LinkEvent, LinkState, LinkStateMachine};
pub use locks::IdentityLocks;
pub use proof_request::{Predicate, PredicateType, ProofRequest};
pub use types::{
    canonical_bytes, AttributeType, AttributeValue, Attributes, Identifier, Role, SchemaKey,
};
