use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use tessera_core::{AttributeType, Attributes, Identifier, ProofRequest, SchemaKey};
use tessera_credentials::{
    CredentialError, CredentialOffer, CredentialRequest, HeldCredential, Issuer, Schema, Wallet,
};
use tessera_crypto::{sign, KeyPair};
use tessera_events::{Event, EventBus};
use tessera_identity::{Identity, IdentityError, IdentityRegistry};
use tessera_links::{Invitation, Link, LinkError, LinkManager, LinkTransport, PartyInfo};
use tessera_proof::{Proof, ProofVerifier, Prover, VerifiedProof};

use crate::error::AgentError;
use crate::pool::Pool;

/// One party: its links, its issuer role, its wallet and its verifier,
/// sharing one event bus.
pub struct Agent {
    name: String,
    identifier: Identifier,
    keypair: RwLock<Arc<KeyPair>>,
    registry: Arc<IdentityRegistry>,
    events: Arc<EventBus>,
    links: Arc<LinkManager>,
    issuer: Issuer,
    wallet: Wallet,
    prover: Prover,
    verifier: ProofVerifier,
    /// (link nonce, schema key) → offer received from the remote issuer
    offers: DashMap<(String, SchemaKey), CredentialOffer>,
}

impl Agent {
    pub(crate) fn new(pool: &Pool, name: &str, endpoint: &str, keypair: KeyPair) -> Arc<Self> {
        let keypair = Arc::new(keypair);
        let identifier = Identifier::from_verkey_bytes(keypair.public_key().as_bytes());
        let events = Arc::new(EventBus::from_config(pool.config()));

        let transport: Arc<dyn LinkTransport> = pool.network().clone();
        let links = Arc::new(LinkManager::new(
            PartyInfo {
                name: name.to_string(),
                identifier: identifier.clone(),
                endpoint: endpoint.to_string(),
            },
            keypair.clone(),
            pool.resolver().clone(),
            transport,
            events.clone(),
            pool.config().clone(),
        ));
        pool.network().register(endpoint, &links);

        let issuer = Issuer::new(
            identifier.clone(),
            keypair.clone(),
            pool.schemas().clone(),
            pool.resolver().clone(),
            links.clone(),
            pool.revocations().clone(),
        );

        Arc::new(Self {
            name: name.to_string(),
            wallet: Wallet::new(identifier.clone(), pool.resolver().clone()),
            identifier,
            keypair: RwLock::new(keypair),
            registry: pool.registry().clone(),
            events,
            links,
            issuer,
            prover: Prover::new(pool.revocations().clone()),
            verifier: ProofVerifier::new(pool.resolver().clone(), pool.revocations().clone()),
            offers: DashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn links(&self) -> &Arc<LinkManager> {
        &self.links
    }

    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub(crate) fn keypair(&self) -> Arc<KeyPair> {
        self.keypair.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    // ---- links ----

    pub fn invite(&self, proof_requests: Vec<ProofRequest>) -> Result<Invitation, AgentError> {
        Ok(self.links.create_invitation(proof_requests)?)
    }

    pub fn invite_with_nonce(
        &self,
        nonce: &str,
        proof_requests: Vec<ProofRequest>,
    ) -> Result<Invitation, AgentError> {
        Ok(self
            .links
            .create_invitation_with_nonce(nonce.to_string(), proof_requests)?)
    }

    /// Receive, sync and accept an invitation document.
    pub async fn accept_invitation(&self, document: &str) -> Result<Link, AgentError> {
        let link = self.links.receive_invitation(document).await?;
        self.links.sync_link(&link.invitation_nonce).await?;
        Ok(self.links.accept_link(&link.invitation_nonce).await?)
    }

    pub async fn ping(&self, nonce: &str) -> Result<(), AgentError> {
        Ok(self.links.ping(nonce).await?)
    }

    // ---- issuing ----

    pub fn publish_schema(
        &self,
        name: &str,
        version: &str,
        attributes: &[(&str, AttributeType)],
    ) -> Result<Schema, AgentError> {
        Ok(self.issuer.publish_schema(name, version, attributes)?)
    }

    /// Offer a credential to `holder` over the accepted link `nonce` and
    /// announce it on the holder's side of the link.
    pub fn send_offer(
        &self,
        holder: &Agent,
        nonce: &str,
        schema_key: &SchemaKey,
        attributes: Attributes,
    ) -> Result<CredentialOffer, AgentError> {
        let offer = self
            .issuer
            .offer(holder.identifier(), nonce, schema_key, attributes)?;
        holder.receive_offer(offer.clone())?;
        Ok(offer)
    }

    /// Record an offer from the remote party of one of our links.
    pub fn receive_offer(&self, offer: CredentialOffer) -> Result<bool, AgentError> {
        if offer.holder != self.identifier {
            return Err(CredentialError::SubjectMismatch {
                expected: self.identifier.to_string(),
                actual: offer.holder.to_string(),
            }
            .into());
        }
        let link = self
            .links
            .link(&offer.link_nonce)
            .ok_or_else(|| AgentError::UnknownLink(offer.link_nonce.clone()))?;
        if link.remote_identity != offer.issuer {
            return Err(LinkError::CounterpartMismatch {
                expected: link.remote_identity.to_string(),
                actual: offer.issuer.to_string(),
            }
            .into());
        }

        let nonce = offer.link_nonce.clone();
        let schema_key = offer.schema_key.clone();
        self.offers
            .insert((nonce.clone(), schema_key.clone()), offer);
        Ok(self.links.add_available_claim(&nonce, schema_key)?)
    }

    /// Request the claim named `claim_name` announced on link `nonce`, have
    /// `issuer` issue it, and store it in the wallet.
    pub async fn request_claim(
        &self,
        issuer: &Agent,
        nonce: &str,
        claim_name: &str,
    ) -> Result<HeldCredential, AgentError> {
        let unknown = || AgentError::UnknownClaim {
            nonce: nonce.to_string(),
            name: claim_name.to_string(),
        };
        let link = self
            .links
            .link(nonce)
            .ok_or_else(|| AgentError::UnknownLink(nonce.to_string()))?;
        let schema_key = link.find_available_claim(claim_name).cloned().ok_or_else(unknown)?;
        let offer = self
            .offers
            .get(&(nonce.to_string(), schema_key))
            .map(|o| o.clone())
            .ok_or_else(unknown)?;

        let request = CredentialRequest::create(&offer, self.identifier.clone(), &self.keypair())?;
        issuer.issuer.request(&request).await?;
        let held = issuer.issuer.issue(&offer.id).await?;
        self.store_credential(held).await
    }

    /// Verify and store a credential, announcing it when it is new.
    pub async fn store_credential(&self, held: HeldCredential) -> Result<HeldCredential, AgentError> {
        if self.wallet.store(held.clone()).await? {
            self.events.publish(Event::ClaimReceived {
                schema_key: held.schema_key().clone(),
                credential_id: held.id().to_string(),
            });
        }
        Ok(held)
    }

    pub async fn revoke(&self, credential_id: &str) -> Result<(), AgentError> {
        Ok(self.issuer.revoke(credential_id).await?)
    }

    // ---- proofs ----

    /// Answer the proof request `request_name` that came with the
    /// invitation on link `nonce`, and have `verifier` check it.
    pub async fn send_proof(
        &self,
        verifier: &Agent,
        nonce: &str,
        request_name: &str,
        self_attested: &Attributes,
    ) -> Result<VerifiedProof, AgentError> {
        let link = self
            .links
            .link(nonce)
            .ok_or_else(|| AgentError::UnknownLink(nonce.to_string()))?;
        let request = link
            .proof_request(request_name)
            .cloned()
            .ok_or_else(|| AgentError::UnknownProofRequest {
                nonce: nonce.to_string(),
                name: request_name.to_string(),
            })?;

        let proof = self
            .prover
            .build_proof(&request, &self.wallet, self_attested)?;
        let result = verifier.verify_proof(nonce, &proof).await;
        self.events.publish(Event::ProofVerified {
            name: request_name.to_string(),
            valid: result.is_ok(),
        });
        result
    }

    /// Check a proof received on an invitation this agent issued.
    pub async fn verify_proof(&self, nonce: &str, proof: &Proof) -> Result<VerifiedProof, AgentError> {
        let issued = self
            .links
            .issued_invitation(nonce)
            .ok_or_else(|| AgentError::UnknownLink(nonce.to_string()))?;
        let request = issued
            .proof_requests
            .iter()
            .find(|r| r.name() == proof.request_name)
            .cloned()
            .ok_or_else(|| AgentError::UnknownProofRequest {
                nonce: nonce.to_string(),
                name: proof.request_name.clone(),
            })?;

        let result = self.check_proof(nonce, &request, proof).await;
        self.events.publish(Event::ProofVerified {
            name: request.name().to_string(),
            valid: result.is_ok(),
        });
        match &result {
            Ok(_) => tracing::info!(
                party = %self.name,
                request = request.name(),
                version = request.version(),
                "proof verified"
            ),
            Err(e) => tracing::warn!(party = %self.name, request = request.name(), error = %e, "proof rejected"),
        }
        result
    }

    async fn check_proof(
        &self,
        nonce: &str,
        request: &ProofRequest,
        proof: &Proof,
    ) -> Result<VerifiedProof, AgentError> {
        if self.links.accepted_counterpart(nonce).as_ref() != Some(&proof.holder) {
            return Err(AgentError::NotCounterpart {
                nonce: nonce.to_string(),
                holder: proof.holder.to_string(),
            });
        }
        Ok(self.verifier.verify(request, proof).await?)
    }

    // ---- keys ----

    /// Rotate to a fresh key. The registry records the new version, signed
    /// with the current key, before any component switches over.
    pub fn rotate_key(&self) -> Result<Identity, AgentError> {
        let current = self
            .registry
            .resolve(&self.identifier)
            .ok_or_else(|| IdentityError::UnknownIdentity(self.identifier.to_string()))?;
        let next = Arc::new(KeyPair::generate());
        let verkey = next.verkey();
        let payload = Identity::rotation_payload(&self.identifier, &verkey, current.seq_no + 1)?;
        let identity =
            self.registry
                .rotate_key(&self.identifier, &verkey, &sign(&payload, &self.keypair()))?;

        *self.keypair.write().unwrap_or_else(|e| e.into_inner()) = next.clone();
        self.links.set_keypair(next.clone());
        self.issuer.set_keypair(next);
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{AttributeValue, EngineConfig, RetryPolicy, Role};

    fn fast_config() -> EngineConfig {
        EngineConfig {
            retry: RetryPolicy {
                initial_delay_ms: 1,
                max_delay_ms: 5,
                max_attempts: 3,
                ..RetryPolicy::default()
            },
            transport_timeout_ms: 200,
            ..EngineConfig::default()
        }
    }

    struct World {
        pool: Pool,
        faber: Arc<Agent>,
        alice: Arc<Agent>,
        nonce: String,
    }

    async fn linked() -> World {
        let pool = Pool::new(fast_config());
        let steward = pool.bootstrap_steward("Steward", "127.0.0.1:5400").unwrap();
        let faber = pool
            .onboard(&steward, "Faber College", "127.0.0.1:5555", Role::TrustAnchor)
            .unwrap();
        let alice = pool
            .onboard(&faber, "Alice", "127.0.0.1:5800", Role::User)
            .unwrap();

        let invitation = faber.invite(Vec::new()).unwrap();
        let link = alice
            .accept_invitation(&invitation.to_json().unwrap())
            .await
            .unwrap();
        assert!(link.is_accepted());
        World {
            pool,
            faber,
            alice,
            nonce: invitation.body.nonce,
        }
    }

    fn degree_attrs() -> Attributes {
        [
            ("student_name", "Alice Garcia"),
            ("degree", "Bachelor of Science, Marketing"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), AttributeValue::from(v)))
        .collect()
    }

    #[tokio::test]
    async fn test_offer_request_store() {
        let w = linked().await;
        let schema = w
            .faber
            .publish_schema(
                "Degree",
                "1.0",
                &[("student_name", AttributeType::String), ("degree", AttributeType::String)],
            )
            .unwrap();
        w.faber
            .send_offer(&w.alice, &w.nonce, &schema.key, degree_attrs())
            .unwrap();
        assert!(w
            .alice
            .links()
            .link(&w.nonce)
            .unwrap()
            .find_available_claim("Degree")
            .is_some());

        let held = w.alice.request_claim(&w.faber, &w.nonce, "Degree").await.unwrap();
        assert_eq!(w.alice.wallet().count(), 1);
        let received = w
            .alice
            .events()
            .history()
            .into_iter()
            .any(|r| matches!(r.event, Event::ClaimReceived { ref credential_id, .. } if credential_id == held.id()));
        assert!(received);
    }

    #[tokio::test]
    async fn test_unknown_claim() {
        let w = linked().await;
        assert!(matches!(
            w.alice.request_claim(&w.faber, &w.nonce, "Transcript").await,
            Err(AgentError::UnknownClaim { .. })
        ));
    }

    #[tokio::test]
    async fn test_offer_needs_accepted_link() {
        let w = linked().await;
        let schema = w
            .faber
            .publish_schema("Degree", "1.0", &[("degree", AttributeType::String)])
            .unwrap();
        let attrs: Attributes = [("degree".to_string(), AttributeValue::from("BSc"))]
            .into_iter()
            .collect();
        assert!(matches!(
            w.faber.send_offer(&w.alice, "ffffffffffffffffffffffffffffffff", &schema.key, attrs),
            Err(AgentError::Credential(CredentialError::InvalidLink { .. }))
        ));
    }

    #[tokio::test]
    async fn test_rotation_keeps_links_working() {
        let w = linked().await;
        let before = w.faber.links().issued_invitation(&w.nonce).unwrap();
        assert!(before.accepted);

        let rotated = w.faber.rotate_key().unwrap();
        assert_eq!(rotated.seq_no, 2);
        assert_eq!(rotated.verkey, w.faber.keypair().verkey());

        // new invitations verify against the new key
        let invitation = w.faber.invite(Vec::new()).unwrap();
        let current = w.pool.registry().resolve(w.faber.identifier()).unwrap();
        assert!(invitation.verify(&current).is_ok());

        // and the old link still answers pings
        w.alice.ping(&w.nonce).await.unwrap();
    }

    #[tokio::test]
    async fn test_old_invitation_fails_after_rotation() {
        let w = linked().await;
        let old: Invitation = w.faber.invite(Vec::new()).unwrap();
        w.faber.rotate_key().unwrap();
        assert!(matches!(
            w.alice.accept_invitation(&old.to_json().unwrap()).await,
            Err(AgentError::Link(LinkError::InvalidSignature(_)))
        ));
    }
}
