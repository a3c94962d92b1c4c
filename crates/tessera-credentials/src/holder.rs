use std::sync::Arc;

use dashmap::DashMap;

use tessera_core::{Identifier, SchemaKey};
use tessera_identity::IdentityResolver;

use crate::credential::HeldCredential;
use crate::error::CredentialError;

/// Holder wallet: verified credentials keyed by schema key.
pub struct Wallet {
    owner: Identifier,
    resolver: Arc<dyn IdentityResolver>,
    credentials: DashMap<SchemaKey, HeldCredential>,
}

impl Wallet {
    pub fn new(owner: Identifier, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            owner,
            resolver,
            credentials: DashMap::new(),
        }
    }

    pub fn owner(&self) -> &Identifier {
        &self.owner
    }

    /// Verify and store a credential.
    ///
    /// Returns `false` if the same credential was already stored. A different
    /// credential under the same schema key replaces the old one.
    pub async fn store(&self, held: HeldCredential) -> Result<bool, CredentialError> {
        let credential = &held.credential;
        if *credential.subject() != self.owner {
            return Err(CredentialError::SubjectMismatch {
                expected: self.owner.to_string(),
                actual: credential.subject().to_string(),
            });
        }

        let issuer = self.resolver.resolve(credential.issuer()).await?;
        credential.signed.verify(&issuer)?;
        held.check_openings()?;

        let key = held.schema_key().clone();
        if let Some(existing) = self.credentials.get(&key) {
            if existing.id() == held.id() {
                tracing::debug!(credential_id = %held.id(), "credential already in wallet");
                return Ok(false);
            }
        }
        tracing::info!(
            owner = %self.owner,
            schema = %key,
            credential_id = %held.id(),
            "credential stored"
        );
        self.credentials.insert(key, held);
        Ok(true)
    }

    pub fn get(&self, schema_key: &SchemaKey) -> Option<HeldCredential> {
        self.credentials.get(schema_key).map(|c| c.clone())
    }

    /// Credentials whose schema has the given name, ordered by schema key.
    pub fn find_by_name(&self, name: &str) -> Vec<HeldCredential> {
        self.all()
            .into_iter()
            .filter(|c| c.schema_key().name == name)
            .collect()
    }

    /// All credentials, ordered by schema key.
    pub fn all(&self) -> Vec<HeldCredential> {
        let mut all: Vec<HeldCredential> =
            self.credentials.iter().map(|c| c.value().clone()).collect();
        all.sort_by(|a, b| a.schema_key().cmp(b.schema_key()));
        all
    }

    pub fn count(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
