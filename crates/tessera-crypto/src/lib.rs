pub mod commitment;
pub mod error;
pub mod hashing;
pub mod keys;
pub mod selective_disclosure;
pub mod signing;

pub use commitment::Commitment;
pub use error::CryptoError;
pub use hashing::{create_commitment, hash, random_salt, verify_commitment};
pub use keys::{KeyPair, PublicKey};
pub use selective_disclosure::SelectiveDisclosure;
pub use signing::{sign, verify, Signature};
