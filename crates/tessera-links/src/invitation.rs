use rand::RngCore;
use serde::{Deserialize, Serialize};

use tessera_core::{canonical_bytes, Identifier, ProofRequest};
use tessera_crypto::{sign, KeyPair, Signature};
use tessera_identity::Identity;

use crate::error::LinkError;

/// The `link-invitation` section of an invitation document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationBody {
    /// Display name of the inviting party (e.g. "Faber College").
    pub name: String,
    pub identifier: Identifier,
    pub nonce: String,
    pub endpoint: String,
}

/// A signed invitation document.
///
/// ```json
/// { "link-invitation": {"name", "identifier", "nonce", "endpoint"},
///   "proof-requests": [...],
///   "sig": "<base58 ed25519 signature>" }
/// ```
///
/// `sig` covers the canonical JSON of the document without `sig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    #[serde(rename = "link-invitation")]
    pub body: InvitationBody,
    #[serde(
        rename = "proof-requests",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub proof_requests: Vec<ProofRequest>,
    pub sig: String,
}

#[derive(Serialize)]
struct Unsigned<'a> {
    #[serde(rename = "link-invitation")]
    body: &'a InvitationBody,
    #[serde(rename = "proof-requests", skip_serializing_if = "no_requests")]
    proof_requests: &'a [ProofRequest],
}

fn no_requests(requests: &&[ProofRequest]) -> bool {
    requests.is_empty()
}

/// 16 random bytes, hex encoded.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl Invitation {
    /// Build and sign an invitation with the inviter's current key.
    pub fn create(
        body: InvitationBody,
        proof_requests: Vec<ProofRequest>,
        keypair: &KeyPair,
    ) -> Result<Self, LinkError> {
        let payload = Self::payload_for(&body, &proof_requests)?;
        let sig = sign(&payload, keypair).to_bs58();
        Ok(Self {
            body,
            proof_requests,
            sig,
        })
    }

    pub fn from_json(document: &str) -> Result<Self, LinkError> {
        serde_json::from_str(document).map_err(|e| LinkError::MalformedInvitation(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, LinkError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Canonical bytes covered by `sig`.
    pub fn signing_payload(&self) -> Result<Vec<u8>, LinkError> {
        Self::payload_for(&self.body, &self.proof_requests)
    }

    /// Verify `sig` against the issuer's published identity.
    ///
    /// Succeeds only if `issuer` is the identity named in the invitation and
    /// its current key produced the signature.
    pub fn verify(&self, issuer: &Identity) -> Result<(), LinkError> {
        let claimed = self.body.identifier.to_string();
        if issuer.identifier != self.body.identifier {
            return Err(LinkError::InvalidSignature(claimed));
        }
        let signature = Signature::from_bs58(&self.sig)
            .map_err(|_| LinkError::InvalidSignature(claimed.clone()))?;
        issuer
            .verify(&self.signing_payload()?, &signature)
            .map_err(|_| LinkError::InvalidSignature(claimed))
    }

    pub fn proof_request(&self, name: &str) -> Option<&ProofRequest> {
        self.proof_requests.iter().find(|r| r.name() == name)
    }

    fn payload_for(
        body: &InvitationBody,
        proof_requests: &[ProofRequest],
    ) -> Result<Vec<u8>, LinkError> {
        Ok(canonical_bytes(&Unsigned {
            body,
            proof_requests,
        })?)
    }
}
