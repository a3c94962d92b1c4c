//! Tessera Proof: answering and checking proof requests.
//!
//! - credential selection: minimal set of held credentials covering a request
//! - presentations: revealed attributes and predicate answers with commitment
//!   openings, credential-backed and self-attested plain values
//! - verification against the issuers' current keys and the revocation registry

pub mod error;
pub mod presentation;
pub mod selection;
pub mod verifier;

pub use error::ProofError;
pub use presentation::{DisclosedAttribute, PredicateProof, Proof, Prover, RevealedAttribute};
pub use selection::{select_credentials, Selection};
pub use tessera_core::{Predicate, PredicateType, ProofRequest};
pub use verifier::{ProofVerifier, VerifiedProof};
