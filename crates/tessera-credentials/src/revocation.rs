use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use tessera_core::{canonical_bytes, Identifier};
use tessera_crypto::Signature;
use tessera_identity::IdentityResolver;

use crate::error::CredentialError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    pub credential_id: String,
    pub issuer: Identifier,
    pub revoked_at: DateTime<Utc>,
}

/// Shared record of revoked credentials.
///
/// Only the issuer can revoke: every revocation carries the issuer's
/// signature, checked against its current key.
pub struct RevocationRegistry {
    resolver: Arc<dyn IdentityResolver>,
    revoked: DashMap<String, RevocationEntry>,
}

impl RevocationRegistry {
    pub fn new(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            resolver,
            revoked: DashMap::new(),
        }
    }

    /// Bytes the issuer signs to revoke `credential_id`.
    pub fn payload(credential_id: &str) -> Result<Vec<u8>, CredentialError> {
        Ok(canonical_bytes(&serde_json::json!({
            "op": "revoke",
            "credentialId": credential_id,
        }))?)
    }

    pub async fn revoke(
        &self,
        credential_id: &str,
        issuer: &Identifier,
        signature: &Signature,
    ) -> Result<(), CredentialError> {
        let identity = self.resolver.resolve(issuer).await?;
        identity
            .verify(&Self::payload(credential_id)?, signature)
            .map_err(|_| CredentialError::InvalidSignature(issuer.to_string()))?;

        self.revoked
            .entry(credential_id.to_string())
            .or_insert_with(|| RevocationEntry {
                credential_id: credential_id.to_string(),
                issuer: issuer.clone(),
                revoked_at: Utc::now(),
            });
        tracing::info!(credential_id, issuer = %issuer, "credential revoked");
        Ok(())
    }

    /// Whether `issuer` revoked `credential_id`.
    pub fn is_revoked(&self, credential_id: &str, issuer: &Identifier) -> bool {
        self.revoked
            .get(credential_id)
            .is_some_and(|entry| entry.issuer == *issuer)
    }

    pub fn entry(&self, credential_id: &str) -> Option<RevocationEntry> {
        self.revoked.get(credential_id).map(|e| e.clone())
    }

    pub fn count(&self) -> usize {
        self.revoked.len()
    }
}
