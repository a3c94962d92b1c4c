use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use tessera_core::{
    canonical_bytes, AttributeType, Attributes, Identifier, IdentityLocks, IssuanceEvent,
    IssuanceState, IssuanceStateMachine, SchemaKey,
};
use tessera_crypto::{sign, KeyPair, Signature};
use tessera_identity::IdentityResolver;
use tessera_links::LinkManager;

use crate::credential::HeldCredential;
use crate::error::CredentialError;
use crate::revocation::RevocationRegistry;
use crate::schema::{Schema, SchemaRegistry};

/// Lookup of accepted links on the issuer side.
pub trait LinkDirectory: Send + Sync {
    /// The counterpart on the accepted, live link with this nonce.
    fn accepted_counterpart(&self, nonce: &str) -> Option<Identifier>;
}

impl LinkDirectory for LinkManager {
    fn accepted_counterpart(&self, nonce: &str) -> Option<Identifier> {
        LinkManager::accepted_counterpart(self, nonce)
    }
}

/// An offer of a credential to a holder over a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialOffer {
    pub id: String,
    pub schema_key: SchemaKey,
    pub issuer: Identifier,
    pub holder: Identifier,
    pub link_nonce: String,
    pub attributes: Attributes,
    pub state: IssuanceState,
    pub created_at: DateTime<Utc>,
}

/// A holder's signed request for an offered credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    pub offer_id: String,
    pub holder: Identifier,
    pub link_nonce: String,
    pub signature: String,
}

impl CredentialRequest {
    pub fn create(
        offer: &CredentialOffer,
        holder: Identifier,
        keypair: &KeyPair,
    ) -> Result<Self, CredentialError> {
        let payload = Self::payload(&offer.id, &holder, &offer.link_nonce)?;
        Ok(Self {
            offer_id: offer.id.clone(),
            holder,
            link_nonce: offer.link_nonce.clone(),
            signature: sign(&payload, keypair).to_bs58(),
        })
    }

    pub fn payload(
        offer_id: &str,
        holder: &Identifier,
        link_nonce: &str,
    ) -> Result<Vec<u8>, CredentialError> {
        Ok(canonical_bytes(&serde_json::json!({
            "op": "request",
            "offerId": offer_id,
            "holder": holder,
            "linkNonce": link_nonce,
        }))?)
    }
}

/// Issuer side of the credential state machine: offered → requested → issued.
///
/// Issuance is serialized per holder identity, and a holder receives at most
/// one credential per schema key: issuing again returns the credential
/// already issued.
pub struct Issuer {
    identifier: Identifier,
    keypair: RwLock<Arc<KeyPair>>,
    schemas: Arc<SchemaRegistry>,
    resolver: Arc<dyn IdentityResolver>,
    links: Arc<dyn LinkDirectory>,
    revocations: Arc<RevocationRegistry>,
    offers: DashMap<String, CredentialOffer>,
    /// (holder, schema key) → issued credential
    issued: DashMap<(Identifier, SchemaKey), HeldCredential>,
    locks: IdentityLocks,
}

impl Issuer {
    pub fn new(
        identifier: Identifier,
        keypair: Arc<KeyPair>,
        schemas: Arc<SchemaRegistry>,
        resolver: Arc<dyn IdentityResolver>,
        links: Arc<dyn LinkDirectory>,
        revocations: Arc<RevocationRegistry>,
    ) -> Self {
        Self {
            identifier,
            keypair: RwLock::new(keypair),
            schemas,
            resolver,
            links,
            revocations,
            offers: DashMap::new(),
            issued: DashMap::new(),
            locks: IdentityLocks::new(),
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn set_keypair(&self, keypair: Arc<KeyPair>) {
        *self.keypair.write().unwrap_or_else(|e| e.into_inner()) = keypair;
    }

    fn keypair(&self) -> Arc<KeyPair> {
        self.keypair.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Publish a schema under this issuer's identifier.
    pub fn publish_schema(
        &self,
        name: &str,
        version: &str,
        attributes: &[(&str, AttributeType)],
    ) -> Result<Schema, CredentialError> {
        let schema = Schema::new(name, version, self.identifier.clone(), attributes);
        self.schemas.publish(schema.clone())?;
        Ok(schema)
    }

    /// Offer a credential to the counterpart of an accepted link.
    pub fn offer(
        &self,
        holder: &Identifier,
        link_nonce: &str,
        schema_key: &SchemaKey,
        attributes: Attributes,
    ) -> Result<CredentialOffer, CredentialError> {
        self.check_link(link_nonce, holder)?;
        let schema = self.own_schema(schema_key)?;
        schema.validate(&attributes)?;

        let offer = CredentialOffer {
            id: uuid::Uuid::now_v7().to_string(),
            schema_key: schema_key.clone(),
            issuer: self.identifier.clone(),
            holder: holder.clone(),
            link_nonce: link_nonce.to_string(),
            attributes,
            state: IssuanceState::Offered,
            created_at: Utc::now(),
        };
        self.offers.insert(offer.id.clone(), offer.clone());
        tracing::info!(
            issuer = %self.identifier,
            holder = %holder,
            schema = %schema_key,
            offer_id = %offer.id,
            "credential offered"
        );
        Ok(offer)
    }

    /// Offers on a link that the holder has not requested yet.
    pub fn available_claims(&self, holder: &Identifier, link_nonce: &str) -> Vec<CredentialOffer> {
        let mut offers: Vec<CredentialOffer> = self
            .offers
            .iter()
            .filter(|o| {
                o.holder == *holder && o.link_nonce == link_nonce && o.state == IssuanceState::Offered
            })
            .map(|o| o.value().clone())
            .collect();
        offers.sort_by(|a, b| a.schema_key.cmp(&b.schema_key));
        offers
    }

    pub fn offer_by_id(&self, offer_id: &str) -> Option<CredentialOffer> {
        self.offers.get(offer_id).map(|o| o.clone())
    }

    /// Accept a holder's signed request for an offer.
    pub async fn request(
        &self,
        request: &CredentialRequest,
    ) -> Result<CredentialOffer, CredentialError> {
        let offer = self
            .offer_by_id(&request.offer_id)
            .ok_or_else(|| CredentialError::UnknownOffer(request.offer_id.clone()))?;
        if offer.holder != request.holder || offer.link_nonce != request.link_nonce {
            return Err(CredentialError::InvalidLink {
                nonce: request.link_nonce.clone(),
                holder: request.holder.to_string(),
            });
        }
        self.check_link(&request.link_nonce, &request.holder)?;

        let holder = self.resolver.resolve(&request.holder).await?;
        let signature = Signature::from_bs58(&request.signature)
            .map_err(|_| CredentialError::InvalidSignature(request.holder.to_string()))?;
        holder
            .verify(
                &CredentialRequest::payload(&request.offer_id, &request.holder, &request.link_nonce)?,
                &signature,
            )
            .map_err(|_| CredentialError::InvalidSignature(request.holder.to_string()))?;

        let updated = {
            let mut entry = self
                .offers
                .get_mut(&request.offer_id)
                .ok_or_else(|| CredentialError::UnknownOffer(request.offer_id.clone()))?;
            entry.state = IssuanceStateMachine::transition(entry.state, IssuanceEvent::Request)?;
            entry.clone()
        };
        tracing::info!(offer_id = %updated.id, holder = %updated.holder, "credential requested");
        Ok(updated)
    }

    /// Issue the credential for a requested offer.
    ///
    /// If the holder already has a credential under the offer's schema key
    /// from this issuer, that credential is returned and nothing new is
    /// signed. The offer must still have been requested over a live link.
    pub async fn issue(&self, offer_id: &str) -> Result<HeldCredential, CredentialError> {
        let holder = self
            .offer_by_id(offer_id)
            .ok_or_else(|| CredentialError::UnknownOffer(offer_id.to_string()))?
            .holder;
        let _guard = self.locks.lock(holder.as_str()).await;

        // the offer may have changed while we waited for the lock
        let offer = self
            .offer_by_id(offer_id)
            .ok_or_else(|| CredentialError::UnknownOffer(offer_id.to_string()))?;
        if offer.state != IssuanceState::Issued {
            IssuanceStateMachine::transition(offer.state, IssuanceEvent::Issue)?;
        }
        self.check_link(&offer.link_nonce, &offer.holder)?;

        let slot = (offer.holder.clone(), offer.schema_key.clone());
        if let Some(existing) = self.issued.get(&slot) {
            tracing::debug!(
                holder = %offer.holder,
                schema = %offer.schema_key,
                credential_id = %existing.id(),
                "credential already issued"
            );
            self.mark_issued(offer_id);
            return Ok(existing.clone());
        }
        if offer.state == IssuanceState::Issued {
            return Err(CredentialError::InvalidCredential(format!(
                "offer {} is issued but its credential is missing",
                offer_id
            )));
        }
        self.own_schema(&offer.schema_key)?.validate(&offer.attributes)?;

        let mut held = HeldCredential::commit(
            uuid::Uuid::now_v7().to_string(),
            offer.schema_key.clone(),
            offer.holder.clone(),
            offer.attributes.clone(),
            None,
        );
        let payload = held.credential.signed.signing_payload()?;
        held.credential.signed.issuer_signature = sign(&payload, &self.keypair()).to_bs58();

        self.issued.insert(slot, held.clone());
        self.mark_issued(offer_id);

        tracing::info!(
            issuer = %self.identifier,
            holder = %offer.holder,
            schema = %offer.schema_key,
            credential_id = %held.id(),
            "credential issued"
        );
        Ok(held)
    }

    pub fn issued_credential(&self, holder: &Identifier, schema_key: &SchemaKey) -> Option<HeldCredential> {
        self.issued
            .get(&(holder.clone(), schema_key.clone()))
            .map(|c| c.clone())
    }

    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }

    /// Revoke a credential this issuer signed.
    pub async fn revoke(&self, credential_id: &str) -> Result<(), CredentialError> {
        let issued_here = self.issued.iter().any(|c| c.id() == credential_id);
        if !issued_here {
            return Err(CredentialError::InvalidCredential(format!(
                "{} was not issued by {}",
                credential_id, self.identifier
            )));
        }
        let signature = sign(&RevocationRegistry::payload(credential_id)?, &self.keypair());
        self.revocations
            .revoke(credential_id, &self.identifier, &signature)
            .await
    }

    fn mark_issued(&self, offer_id: &str) {
        if let Some(mut offer) = self.offers.get_mut(offer_id) {
            if offer.state == IssuanceState::Requested {
                offer.state = IssuanceState::Issued;
            }
        }
    }

    fn own_schema(&self, schema_key: &SchemaKey) -> Result<Schema, CredentialError> {
        if schema_key.issuer != self.identifier {
            return Err(CredentialError::SchemaMismatch {
                schema: schema_key.to_string(),
                reason: format!("schema belongs to {}", schema_key.issuer),
            });
        }
        self.schemas.get(schema_key)
    }

    fn check_link(&self, nonce: &str, holder: &Identifier) -> Result<(), CredentialError> {
        match self.links.accepted_counterpart(nonce) {
            Some(counterpart) if counterpart == *holder => Ok(()),
            _ => Err(CredentialError::InvalidLink {
                nonce: nonce.to_string(),
                holder: holder.to_string(),
            }),
        }
    }
}
