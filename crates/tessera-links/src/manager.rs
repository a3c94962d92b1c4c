use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use tessera_core::{EngineConfig, Identifier, IdentityLocks, LinkEvent, LinkState, ProofRequest, SchemaKey};
use tessera_crypto::{sign, KeyPair, Signature};
use tessera_events::{Event, EventBus};
use tessera_identity::{IdentityError, IdentityResolver};

use crate::error::LinkError;
use crate::invitation::{generate_nonce, Invitation, InvitationBody};
use crate::link::{IssuedInvitation, Link};
use crate::transport::{
    AcceptRequest, AcceptResponse, LinkHandler, LinkTransport, SyncRequest, SyncResponse,
};

/// Who this manager acts for.
#[derive(Debug, Clone)]
pub struct PartyInfo {
    pub name: String,
    pub identifier: Identifier,
    pub endpoint: String,
}

/// Link/Invitation Manager for one party.
///
/// Plays both roles of the link protocol: as inviter it issues invitations
/// and answers sync/accept calls for them; as invitee it verifies received
/// invitations and drives its [`Link`] records through sync and accept.
pub struct LinkManager {
    party: PartyInfo,
    keypair: RwLock<Arc<KeyPair>>,
    resolver: Arc<dyn IdentityResolver>,
    transport: Arc<dyn LinkTransport>,
    events: Arc<EventBus>,
    config: EngineConfig,
    /// invitee side: nonce → link
    links: DashMap<String, Link>,
    /// inviter side: nonce → issued invitation
    issued: DashMap<String, IssuedInvitation>,
    locks: IdentityLocks,
}

impl LinkManager {
    pub fn new(
        party: PartyInfo,
        keypair: Arc<KeyPair>,
        resolver: Arc<dyn IdentityResolver>,
        transport: Arc<dyn LinkTransport>,
        events: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        Self {
            party,
            keypair: RwLock::new(keypair),
            resolver,
            transport,
            events,
            config,
            links: DashMap::new(),
            issued: DashMap::new(),
            locks: IdentityLocks::new(),
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.party.identifier
    }

    pub fn party(&self) -> &PartyInfo {
        &self.party
    }

    /// Switch to a rotated key. The registry must already carry it.
    pub fn set_keypair(&self, keypair: Arc<KeyPair>) {
        *self.keypair.write().unwrap_or_else(|e| e.into_inner()) = keypair;
    }

    fn keypair(&self) -> Arc<KeyPair> {
        self.keypair.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    // ---- inviter side ----

    /// Issue a signed invitation under a fresh nonce.
    pub fn create_invitation(
        &self,
        proof_requests: Vec<ProofRequest>,
    ) -> Result<Invitation, LinkError> {
        self.create_invitation_with_nonce(generate_nonce(), proof_requests)
    }

    /// Issue an invitation under a caller-chosen nonce. A nonce can only be
    /// issued once.
    pub fn create_invitation_with_nonce(
        &self,
        nonce: String,
        proof_requests: Vec<ProofRequest>,
    ) -> Result<Invitation, LinkError> {
        let body = InvitationBody {
            name: self.party.name.clone(),
            identifier: self.party.identifier.clone(),
            nonce: nonce.clone(),
            endpoint: self.party.endpoint.clone(),
        };
        let invitation = Invitation::create(body, proof_requests.clone(), &self.keypair())?;
        match self.issued.entry(nonce.clone()) {
            Entry::Occupied(_) => return Err(LinkError::DuplicateNonce(nonce)),
            Entry::Vacant(slot) => {
                slot.insert(IssuedInvitation::new(nonce.clone(), proof_requests));
            }
        }
        tracing::info!(party = %self.party.name, nonce = %nonce, "invitation issued");
        Ok(invitation)
    }

    pub fn issued_invitation(&self, nonce: &str) -> Option<IssuedInvitation> {
        self.issued.get(nonce).map(|i| i.clone())
    }

    /// The invitee on an accepted, live invitation this party issued.
    pub fn accepted_counterpart(&self, nonce: &str) -> Option<Identifier> {
        self.issued
            .get(nonce)
            .and_then(|i| i.accepted_counterpart().cloned())
    }

    pub async fn handle_sync(&self, request: SyncRequest) -> Result<SyncResponse, LinkError> {
        self.verify_signed(
            &request.from,
            &SyncRequest::payload(&request.nonce, &request.from)?,
            &request.signature,
        )
        .await?;

        {
            let mut issued = self
                .issued
                .get_mut(&request.nonce)
                .ok_or_else(|| LinkError::UnknownInvitation(request.nonce.clone()))?;
            if issued.expired {
                return Err(LinkError::Expired(request.nonce));
            }
            issued.record_sync(&request.from)?;
        }

        tracing::debug!(nonce = %request.nonce, from = %request.from, "sync handled");
        Ok(SyncResponse {
            nonce: request.nonce,
            identifier: self.party.identifier.clone(),
            endpoint: self.party.endpoint.clone(),
        })
    }

    pub async fn handle_accept(
        &self,
        request: AcceptRequest,
    ) -> Result<AcceptResponse, LinkError> {
        self.verify_signed(
            &request.identifier,
            &AcceptRequest::payload(&request.nonce, &request.identifier)?,
            &request.signature,
        )
        .await?;

        {
            let mut issued = self
                .issued
                .get_mut(&request.nonce)
                .ok_or_else(|| LinkError::UnknownInvitation(request.nonce.clone()))?;
            if issued.expired {
                return Err(LinkError::Expired(request.nonce));
            }
            issued.record_accept(&request.identifier)?;
        }

        tracing::info!(
            party = %self.party.name,
            nonce = %request.nonce,
            invitee = %request.identifier,
            "link accepted by invitee"
        );
        self.events.publish(Event::LinkAccepted {
            nonce: request.nonce.clone(),
            name: request.identifier.to_string(),
        });

        Ok(AcceptResponse {
            nonce: request.nonce,
            identifier: self.party.identifier.clone(),
        })
    }

    pub async fn handle_ping(&self, nonce: &str) -> Result<(), LinkError> {
        let issued = self
            .issued
            .get(nonce)
            .ok_or_else(|| LinkError::UnknownInvitation(nonce.to_string()))?;
        if issued.accepted_counterpart().is_none() {
            return Err(LinkError::NotSynced(nonce.to_string()));
        }
        tracing::debug!(nonce = %nonce, "ping answered");
        Ok(())
    }

    // ---- invitee side ----

    /// Verify a received invitation and record a pending link.
    ///
    /// Receiving the same nonce again returns the existing link.
    pub async fn receive_invitation(&self, document: &str) -> Result<Link, LinkError> {
        let invitation = Invitation::from_json(document)?;
        let issuer_id = invitation.body.identifier.clone();

        let issuer = match self.resolver.resolve(&issuer_id).await {
            Ok(identity) => identity,
            Err(IdentityError::UnknownIdentity(_)) => {
                tracing::warn!(issuer = %issuer_id, "invitation from unpublished identity");
                return Err(LinkError::UnknownIssuer(issuer_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = invitation.verify(&issuer) {
            tracing::warn!(
                issuer = %issuer_id,
                nonce = %invitation.body.nonce,
                "invitation signature rejected"
            );
            return Err(e);
        }

        let nonce = invitation.body.nonce.clone();
        let _guard = self.locks.lock(issuer_id.as_str()).await;
        if let Some(existing) = self.links.get(&nonce) {
            return Ok(existing.clone());
        }

        let link = Link::from_invitation(self.party.identifier.clone(), &invitation, issuer.verkey);
        self.links.insert(nonce.clone(), link.clone());

        tracing::info!(
            party = %self.party.name,
            remote = %link.name,
            nonce = %nonce,
            "link created"
        );
        self.events.publish(Event::LinkCreated {
            nonce,
            name: link.name.clone(),
            remote: link.remote_identity.clone(),
        });
        Ok(link)
    }

    /// Ask the inviter to confirm the invitation, then mark the link synced.
    pub async fn sync_link(&self, nonce: &str) -> Result<Link, LinkError> {
        let link = self.link_or_err(nonce)?;
        if link.is_expired() {
            return Err(LinkError::Expired(nonce.to_string()));
        }
        let _guard = self.locks.lock(link.remote_identity.as_str()).await;

        let payload = SyncRequest::payload(nonce, &self.party.identifier)?;
        let request = SyncRequest {
            nonce: nonce.to_string(),
            from: self.party.identifier.clone(),
            signature: sign(&payload, &self.keypair()).to_bs58(),
        };
        let endpoint = link.remote_endpoint.clone();
        let response = self
            .with_retry(nonce, "sync", || {
                self.transport.sync(&endpoint, request.clone())
            })
            .await?;
        Self::check_counterpart(&link, &response.identifier)?;

        // pick up rotated keys and moved endpoints
        let remote = self.resolve_remote(&link.remote_identity).await?;

        let updated = {
            let mut entry = self
                .links
                .get_mut(nonce)
                .ok_or_else(|| LinkError::UnknownLink(nonce.to_string()))?;
            entry.remote_verkey = remote.verkey;
            entry.remote_endpoint = remote.endpoint.unwrap_or(response.endpoint);
            entry.apply(LinkEvent::Sync)?;
            entry.clone()
        };

        tracing::info!(party = %self.party.name, remote = %updated.name, nonce = %nonce, "link synced");
        self.events.publish(Event::LinkSynced {
            nonce: nonce.to_string(),
            name: updated.name.clone(),
        });
        Ok(updated)
    }

    /// Send our signed acceptance and mark the link accepted.
    pub async fn accept_link(&self, nonce: &str) -> Result<Link, LinkError> {
        let link = self.link_or_err(nonce)?;
        match link.state {
            LinkState::Synced => {}
            LinkState::Accepted => return Ok(link),
            LinkState::Expired => return Err(LinkError::Expired(nonce.to_string())),
            state => {
                return Err(LinkError::WrongState {
                    nonce: nonce.to_string(),
                    state,
                    expected: LinkState::Synced,
                })
            }
        }
        let _guard = self.locks.lock(link.remote_identity.as_str()).await;

        let payload = AcceptRequest::payload(nonce, &self.party.identifier)?;
        let request = AcceptRequest {
            nonce: nonce.to_string(),
            identifier: self.party.identifier.clone(),
            signature: sign(&payload, &self.keypair()).to_bs58(),
        };
        let endpoint = link.remote_endpoint.clone();
        let response = self
            .with_retry(nonce, "accept", || {
                self.transport.accept(&endpoint, request.clone())
            })
            .await?;
        Self::check_counterpart(&link, &response.identifier)?;

        let updated = {
            let mut entry = self
                .links
                .get_mut(nonce)
                .ok_or_else(|| LinkError::UnknownLink(nonce.to_string()))?;
            entry.apply(LinkEvent::Accept)?;
            entry.clone()
        };

        tracing::info!(party = %self.party.name, remote = %updated.name, nonce = %nonce, "link accepted");
        self.events.publish(Event::LinkAccepted {
            nonce: nonce.to_string(),
            name: updated.name.clone(),
        });
        Ok(updated)
    }

    /// Liveness check over an accepted link.
    pub async fn ping(&self, nonce: &str) -> Result<(), LinkError> {
        let link = self.link_or_err(nonce)?;
        if !link.is_accepted() {
            return Err(LinkError::WrongState {
                nonce: nonce.to_string(),
                state: link.state,
                expected: LinkState::Accepted,
            });
        }
        let endpoint = link.remote_endpoint.clone();
        self.with_retry(nonce, "ping", || self.transport.ping(&endpoint, nonce))
            .await?;

        tracing::info!(party = %self.party.name, remote = %link.name, "pong received");
        self.events.publish(Event::Pong {
            nonce: nonce.to_string(),
        });
        Ok(())
    }

    /// Soft-expire a link or an issued invitation.
    pub fn expire_link(&self, nonce: &str) -> Result<(), LinkError> {
        let mut found = false;
        if let Some(mut link) = self.links.get_mut(nonce) {
            link.apply(LinkEvent::Expire)?;
            found = true;
        }
        if let Some(mut issued) = self.issued.get_mut(nonce) {
            issued.expired = true;
            found = true;
        }
        if !found {
            return Err(LinkError::UnknownLink(nonce.to_string()));
        }
        tracing::info!(party = %self.party.name, nonce = %nonce, "link expired");
        Ok(())
    }

    /// Record a credential the remote party announced on a link.
    pub fn add_available_claim(&self, nonce: &str, schema_key: SchemaKey) -> Result<bool, LinkError> {
        let added = {
            let mut link = self
                .links
                .get_mut(nonce)
                .ok_or_else(|| LinkError::UnknownLink(nonce.to_string()))?;
            if link.is_expired() {
                return Err(LinkError::Expired(nonce.to_string()));
            }
            link.add_available_claim(schema_key.clone())
        };
        if added {
            tracing::info!(nonce = %nonce, schema = %schema_key, "claim available");
            self.events.publish(Event::ClaimAvailable {
                nonce: nonce.to_string(),
                schema_key,
            });
        }
        Ok(added)
    }

    pub fn link(&self, nonce: &str) -> Option<Link> {
        self.links.get(nonce).map(|l| l.clone())
    }

    pub fn links(&self) -> Vec<Link> {
        self.links.iter().map(|l| l.value().clone()).collect()
    }

    /// Look up a link by the remote party's name, preferring live links.
    pub fn find_link_by_name(&self, name: &str) -> Option<Link> {
        let mut matches: Vec<Link> = self
            .links
            .iter()
            .filter(|l| l.name == name)
            .map(|l| l.value().clone())
            .collect();
        matches.sort_by_key(|l| (l.is_expired(), std::cmp::Reverse(l.created_at)));
        matches.into_iter().next()
    }

    fn link_or_err(&self, nonce: &str) -> Result<Link, LinkError> {
        self.link(nonce)
            .ok_or_else(|| LinkError::UnknownLink(nonce.to_string()))
    }

    async fn resolve_remote(
        &self,
        identifier: &Identifier,
    ) -> Result<tessera_identity::Identity, LinkError> {
        match self.resolver.resolve(identifier).await {
            Ok(identity) => Ok(identity),
            Err(IdentityError::UnknownIdentity(id)) => Err(LinkError::UnknownIssuer(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Check a base58 signature by `signer`'s registered key.
    async fn verify_signed(
        &self,
        signer: &Identifier,
        payload: &[u8],
        signature: &str,
    ) -> Result<(), LinkError> {
        let identity = self.resolve_remote(signer).await?;
        let signature = Signature::from_bs58(signature)
            .map_err(|_| LinkError::InvalidSignature(signer.to_string()))?;
        identity
            .verify(payload, &signature)
            .map_err(|_| LinkError::InvalidSignature(signer.to_string()))
    }

    fn check_counterpart(link: &Link, actual: &Identifier) -> Result<(), LinkError> {
        if *actual != link.remote_identity {
            return Err(LinkError::CounterpartMismatch {
                expected: link.remote_identity.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    /// Run a transport call under the per-call timeout, retrying transient
    /// failures with the configured backoff.
    async fn with_retry<T, F, Fut>(
        &self,
        nonce: &str,
        op: &'static str,
        mut call: F,
    ) -> Result<T, LinkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LinkError>>,
    {
        let policy = &self.config.retry;
        let timeout = self.config.transport_timeout();
        let mut last_error = String::new();

        for attempt in 0..policy.max_attempts {
            let result = match tokio::time::timeout(timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(LinkError::Timeout(timeout)),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        nonce = %nonce,
                        op,
                        attempt = attempt + 1,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "link call failed"
                    );
                    last_error = e.to_string();
                    if attempt + 1 < policy.max_attempts {
                        let delay = policy.delay_for_attempt(attempt);
                        tracing::debug!(nonce = %nonce, op, ?delay, "backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(LinkError::SyncFailed {
            nonce: nonce.to_string(),
            attempts: policy.max_attempts,
            last_error,
        })
    }
}

#[async_trait]
impl LinkHandler for LinkManager {
    async fn handle_sync(&self, request: SyncRequest) -> Result<SyncResponse, LinkError> {
        LinkManager::handle_sync(self, request).await
    }

    async fn handle_accept(&self, request: AcceptRequest) -> Result<AcceptResponse, LinkError> {
        LinkManager::handle_accept(self, request).await
    }

    async fn handle_ping(&self, nonce: &str) -> Result<(), LinkError> {
        LinkManager::handle_ping(self, nonce).await
    }
}
