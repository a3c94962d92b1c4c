use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use tessera_core::{Identifier, Role};
use tessera_crypto::Signature;

use crate::error::IdentityError;
use crate::identity::Identity;

/// Shared registry of published identities.
///
/// Stands in for the ledger the parties read identities from. Each
/// identifier maps to its version history; the last entry is current.
pub struct IdentityRegistry {
    /// identifier → versions, oldest first
    store: DashMap<String, Vec<Identity>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    /// Install a genesis steward. No sponsor is required.
    pub fn bootstrap_steward(
        &self,
        identifier: Identifier,
        verkey: impl Into<String>,
        endpoint: Option<String>,
    ) -> Result<Identity, IdentityError> {
        let identity = Identity::new(identifier, verkey, Role::Steward, endpoint);
        identity.check_cryptonym()?;
        self.insert_first(identity)
    }

    /// Publish a new identity sponsored by an existing steward or trust
    /// anchor. `signature` is the sponsor's signature over
    /// [`Identity::publish_payload`].
    pub fn publish(
        &self,
        sponsor: &Identifier,
        identity: Identity,
        signature: &Signature,
    ) -> Result<Identity, IdentityError> {
        let sponsor_identity = self
            .resolve(sponsor)
            .ok_or_else(|| IdentityError::UnknownIdentity(sponsor.to_string()))?;

        if !sponsor_identity.role.can_sponsor(identity.role) {
            return Err(IdentityError::Unauthorized {
                sponsor: sponsor.to_string(),
                role: sponsor_identity.role,
                target: identity.role,
            });
        }

        sponsor_identity.verify(&identity.publish_payload()?, signature)?;
        identity.check_cryptonym()?;

        let published = self.insert_first(identity)?;
        tracing::info!(
            identifier = %published.identifier,
            role = %published.role,
            sponsor = %sponsor,
            "identity published"
        );
        Ok(published)
    }

    /// Supersede the current key. `signature` is made with the current key
    /// over [`Identity::rotation_payload`].
    pub fn rotate_key(
        &self,
        identifier: &Identifier,
        new_verkey: &str,
        signature: &Signature,
    ) -> Result<Identity, IdentityError> {
        tessera_crypto::PublicKey::from_bs58(new_verkey)?;
        self.append_version(identifier, signature, |current, next_seq| {
            let payload = Identity::rotation_payload(identifier, new_verkey, next_seq)?;
            let mut next = current.clone();
            next.verkey = new_verkey.to_string();
            Ok((payload, next))
        })
        .inspect(|identity| {
            tracing::info!(identifier = %identifier, seq_no = identity.seq_no, "verkey rotated");
        })
    }

    /// Publish a new endpoint, signed with the current key over
    /// [`Identity::endpoint_payload`].
    pub fn update_endpoint(
        &self,
        identifier: &Identifier,
        endpoint: &str,
        signature: &Signature,
    ) -> Result<Identity, IdentityError> {
        self.append_version(identifier, signature, |current, next_seq| {
            let payload = Identity::endpoint_payload(identifier, endpoint, next_seq)?;
            let mut next = current.clone();
            next.endpoint = Some(endpoint.to_string());
            Ok((payload, next))
        })
    }

    /// The current identity version.
    pub fn resolve(&self, identifier: &Identifier) -> Option<Identity> {
        self.store
            .get(identifier.as_str())
            .and_then(|versions| versions.last().cloned())
    }

    /// All versions, oldest first.
    pub fn history(&self, identifier: &Identifier) -> Vec<Identity> {
        self.store
            .get(identifier.as_str())
            .map(|versions| versions.clone())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn insert_first(&self, mut identity: Identity) -> Result<Identity, IdentityError> {
        match self.store.entry(identity.identifier.as_str().to_string()) {
            Entry::Occupied(_) => Err(IdentityError::AlreadyPublished(
                identity.identifier.to_string(),
            )),
            Entry::Vacant(slot) => {
                identity.seq_no = 1;
                identity.published_at = Utc::now();
                slot.insert(vec![identity.clone()]);
                Ok(identity)
            }
        }
    }

    /// Verify `signature` against the current version and append the
    /// version built by `build`. Runs under the entry's shard lock so
    /// concurrent updates cannot both sign against the same version.
    fn append_version<F>(
        &self,
        identifier: &Identifier,
        signature: &Signature,
        build: F,
    ) -> Result<Identity, IdentityError>
    where
        F: FnOnce(&Identity, u64) -> Result<(Vec<u8>, Identity), IdentityError>,
    {
        let mut versions = self
            .store
            .get_mut(identifier.as_str())
            .ok_or_else(|| IdentityError::UnknownIdentity(identifier.to_string()))?;
        let current = versions
            .last()
            .cloned()
            .ok_or_else(|| IdentityError::UnknownIdentity(identifier.to_string()))?;

        let next_seq = current.seq_no + 1;
        let (payload, mut next) = build(&current, next_seq)?;
        current.verify(&payload, signature)?;

        next.seq_no = next_seq;
        next.published_at = Utc::now();
        versions.push(next.clone());
        Ok(next)
    }
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
