use serde::{Deserialize, Serialize};

use crate::hashing::{self, hex32, Hash};

/// A salted BLAKE3 commitment: H(value || salt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Commitment {
    #[serde(with = "hex32")]
    pub hash: Hash,
}

impl Commitment {
    /// Commit to a value with a fresh random salt.
    /// Returns the commitment and the salt (the opening).
    pub fn commit(value: &[u8]) -> (Self, [u8; 32]) {
        let salt = hashing::random_salt();
        (Self::commit_with_salt(value, &salt), salt)
    }

    pub fn commit_with_salt(value: &[u8], salt: &[u8; 32]) -> Self {
        Self {
            hash: hashing::create_commitment(value, salt),
        }
    }

    /// Check that `value` and `salt` open this commitment.
    pub fn verify(&self, value: &[u8], salt: &[u8; 32]) -> bool {
        hashing::verify_commitment(value, salt, &self.hash)
    }
}
