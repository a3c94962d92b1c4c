use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tessera_core::{Identifier, LinkEvent, LinkState, LinkStateMachine, ProofRequest, SchemaKey};

use crate::error::LinkError;
use crate::invitation::Invitation;

/// Invitee-side record of a pairwise link.
///
/// Created when a verified invitation is received and never deleted;
/// expiry is the `Expired` state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    /// Name of the remote party as given in its invitation.
    pub name: String,
    pub local_identity: Identifier,
    pub remote_identity: Identifier,
    pub remote_verkey: String,
    pub remote_endpoint: String,
    pub invitation_nonce: String,
    pub state: LinkState,
    pub synced_at: Option<DateTime<Utc>>,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
    /// Proof requests carried by the invitation.
    #[serde(default)]
    pub proof_requests: Vec<ProofRequest>,
    /// Credentials the remote party announced on this link.
    #[serde(default)]
    pub available_claims: Vec<SchemaKey>,
}

impl Link {
    pub fn from_invitation(
        local_identity: Identifier,
        invitation: &Invitation,
        remote_verkey: String,
    ) -> Self {
        Self {
            name: invitation.body.name.clone(),
            local_identity,
            remote_identity: invitation.body.identifier.clone(),
            remote_verkey,
            remote_endpoint: invitation.body.endpoint.clone(),
            invitation_nonce: invitation.body.nonce.clone(),
            state: LinkState::Pending,
            synced_at: None,
            accepted: false,
            created_at: Utc::now(),
            proof_requests: invitation.proof_requests.clone(),
            available_claims: Vec::new(),
        }
    }

    /// Apply a state-machine event, keeping `accepted` and `synced_at` in
    /// step with the state.
    pub fn apply(&mut self, event: LinkEvent) -> Result<LinkState, LinkError> {
        let next = LinkStateMachine::transition(self.state, event)?;
        match event {
            LinkEvent::Sync => self.synced_at = Some(Utc::now()),
            LinkEvent::Accept => self.accepted = true,
            LinkEvent::Expire => {}
        }
        self.state = next;
        Ok(next)
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted && self.state == LinkState::Accepted
    }

    pub fn is_expired(&self) -> bool {
        self.state == LinkState::Expired
    }

    pub fn proof_request(&self, name: &str) -> Option<&ProofRequest> {
        self.proof_requests.iter().find(|r| r.name() == name)
    }

    pub fn find_available_claim(&self, name: &str) -> Option<&SchemaKey> {
        self.available_claims.iter().find(|k| k.name == name)
    }

    /// Record an announced credential. Returns `false` if it was already known.
    pub fn add_available_claim(&mut self, schema_key: SchemaKey) -> bool {
        if self.available_claims.contains(&schema_key) {
            return false;
        }
        self.available_claims.push(schema_key);
        true
    }
}

/// Inviter-side record of an invitation this party issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedInvitation {
    pub nonce: String,
    pub proof_requests: Vec<ProofRequest>,
    pub created_at: DateTime<Utc>,
    /// The most recent invitee to sync, fixed once accepted.
    pub counterpart: Option<Identifier>,
    /// Every identity whose signed sync was verified.
    #[serde(default)]
    pub synced_by: Vec<Identifier>,
    pub synced_at: Option<DateTime<Utc>>,
    /// Set once the invitee's signed acceptance was verified.
    pub accepted: bool,
    #[serde(default)]
    pub expired: bool,
}

impl IssuedInvitation {
    pub fn new(nonce: String, proof_requests: Vec<ProofRequest>) -> Self {
        Self {
            nonce,
            proof_requests,
            created_at: Utc::now(),
            counterpart: None,
            synced_by: Vec::new(),
            synced_at: None,
            accepted: false,
            expired: false,
        }
    }

    /// Record a verified sync from `from`. Before acceptance the latest
    /// syncer becomes the counterpart; after it only the bound invitee may
    /// sync again.
    pub fn record_sync(&mut self, from: &Identifier) -> Result<(), LinkError> {
        if self.accepted {
            return match &self.counterpart {
                Some(bound) if bound == from => Ok(()),
                bound => Err(LinkError::CounterpartMismatch {
                    expected: bound.as_ref().map(|b| b.to_string()).unwrap_or_default(),
                    actual: from.to_string(),
                }),
            };
        }
        if !self.synced_by.contains(from) {
            self.synced_by.push(from.clone());
        }
        self.counterpart = Some(from.clone());
        self.synced_at = Some(Utc::now());
        Ok(())
    }

    /// Bind the invitation to `from` on its verified acceptance. The first
    /// synced identity to accept wins.
    pub fn record_accept(&mut self, from: &Identifier) -> Result<(), LinkError> {
        if self.accepted {
            return match &self.counterpart {
                Some(bound) if bound == from => Ok(()),
                bound => Err(LinkError::CounterpartMismatch {
                    expected: bound.as_ref().map(|b| b.to_string()).unwrap_or_default(),
                    actual: from.to_string(),
                }),
            };
        }
        if !self.synced_by.contains(from) {
            return Err(LinkError::NotSynced(self.nonce.clone()));
        }
        self.counterpart = Some(from.clone());
        self.accepted = true;
        Ok(())
    }

    /// The invitee if the link is accepted and live.
    pub fn accepted_counterpart(&self) -> Option<&Identifier> {
        if self.accepted && !self.expired {
            self.counterpart.as_ref()
        } else {
            None
        }
    }
}
