use std::collections::BTreeMap;

use crate::commitment::Commitment;

/// Per-attribute salted commitments for selective disclosure.
///
/// The issuer commits to every attribute individually and signs the set of
/// commitments. The holder keeps the salts and later reveals only the
/// attributes a verifier asks for; the rest stay hidden behind their
/// commitments.
#[derive(Debug, Clone, Default)]
pub struct SelectiveDisclosure {
    /// attribute name → (commitment, salt)
    entries: BTreeMap<String, (Commitment, [u8; 32])>,
}

impl SelectiveDisclosure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit to a value under a fresh salt.
    pub fn add(&mut self, name: impl Into<String>, value: &[u8]) -> Commitment {
        let (commitment, salt) = Commitment::commit(value);
        self.entries.insert(name.into(), (commitment, salt));
        commitment
    }

    pub fn commitment_for(&self, name: &str) -> Option<&Commitment> {
        self.entries.get(name).map(|(c, _)| c)
    }

    /// Public half: attribute name → commitment.
    pub fn commitments(&self) -> BTreeMap<String, Commitment> {
        self.entries
            .iter()
            .map(|(name, (c, _))| (name.clone(), *c))
            .collect()
    }

    /// Private half: attribute name → salt.
    pub fn salts(&self) -> BTreeMap<String, [u8; 32]> {
        self.entries
            .iter()
            .map(|(name, (_, salt))| (name.clone(), *salt))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check a revealed value against its commitment.
    pub fn verify_revealed(commitment: &Commitment, value: &[u8], salt: &[u8; 32]) -> bool {
        commitment.verify(value, salt)
    }
}
