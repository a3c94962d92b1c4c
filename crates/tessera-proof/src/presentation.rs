use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tessera_core::{AttributeValue, Attributes, Identifier, Predicate, ProofRequest};
use tessera_credentials::{CommitmentSet, HeldCredential, Opening, RevocationRegistry, Wallet};

use crate::error::ProofError;
use crate::selection::{select_credentials, Selection};

/// A verifiable attribute: the value plus the salt that opens the issuer's
/// signed commitment to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedAttribute {
    pub credential_id: String,
    pub value: AttributeValue,
    pub opening: Opening,
}

/// A predicate over a signed integer attribute.
///
/// The value travels with the salt that opens the issuer's commitment, so
/// the verifier can check the predicate against what the issuer signed.
/// Verifiers report only the predicate, never the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredicateProof {
    pub credential_id: String,
    pub predicate: Predicate,
    pub value: AttributeValue,
    pub opening: Opening,
}

/// A plaintext attribute. `credential_id` is `None` when self-attested;
/// credential-backed values carry the opening of their signed commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclosedAttribute {
    pub value: AttributeValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening: Option<Opening>,
}

impl DisclosedAttribute {
    pub fn is_self_attested(&self) -> bool {
        self.credential_id.is_none()
    }
}

/// A holder's answer to a proof request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    pub request_name: String,
    pub request_version: String,
    pub holder: Identifier,
    /// Signed commitment sets of every credential the proof draws on.
    pub credentials: Vec<CommitmentSet>,
    #[serde(default)]
    pub revealed: BTreeMap<String, RevealedAttribute>,
    #[serde(default)]
    pub predicates: BTreeMap<String, PredicateProof>,
    #[serde(default)]
    pub disclosed: BTreeMap<String, DisclosedAttribute>,
    pub created_at: DateTime<Utc>,
}

impl Proof {
    pub fn credential(&self, credential_id: &str) -> Option<&CommitmentSet> {
        self.credentials
            .iter()
            .find(|c| c.credential_id == credential_id)
    }

    /// Number of attributes answered.
    pub fn answered(&self) -> usize {
        self.revealed.len() + self.predicates.len() + self.disclosed.len()
    }
}

/// Builds proofs from a holder's wallet.
pub struct Prover {
    revocations: Option<Arc<RevocationRegistry>>,
}

impl Prover {
    pub fn new(revocations: Arc<RevocationRegistry>) -> Self {
        Self {
            revocations: Some(revocations),
        }
    }

    /// A prover that does not consult a revocation registry.
    pub fn without_revocations() -> Self {
        Self { revocations: None }
    }

    /// Answer `request` from `wallet`.
    ///
    /// Verifiable attributes and predicate attributes are opened against
    /// their signed commitments. Remaining attributes are disclosed,
    /// preferring `self_attested` values when given.
    pub fn build_proof(
        &self,
        request: &ProofRequest,
        wallet: &Wallet,
        self_attested: &Attributes,
    ) -> Result<Proof, ProofError> {
        let held = wallet.all();
        let selection = select_credentials(
            request,
            &held,
            self_attested,
            self.revocations.as_deref(),
        )?;

        let mut proof = Proof {
            request_name: request.name().to_string(),
            request_version: request.version().to_string(),
            holder: wallet.owner().clone(),
            credentials: selection
                .credentials()
                .iter()
                .map(|c| c.credential.signed.clone())
                .collect(),
            revealed: BTreeMap::new(),
            predicates: BTreeMap::new(),
            disclosed: BTreeMap::new(),
            created_at: Utc::now(),
        };

        for (attr, ty) in request.attributes() {
            if request.is_verifiable(attr) {
                let (source, value, opening) = open(&selection, request, attr)?;
                proof.revealed.insert(
                    attr.clone(),
                    RevealedAttribute {
                        credential_id: source.id().to_string(),
                        value,
                        opening,
                    },
                );
            } else if let Some(predicate) = request.predicate_for(attr) {
                let (source, value, opening) = open(&selection, request, attr)?;
                if !value.as_int().is_some_and(|v| predicate.holds_for(v)) {
                    return Err(ProofError::GenerationFailed(format!(
                        "{} does not satisfy its predicate",
                        attr
                    )));
                }
                proof.predicates.insert(
                    attr.clone(),
                    PredicateProof {
                        credential_id: source.id().to_string(),
                        predicate: predicate.clone(),
                        value,
                        opening,
                    },
                );
            } else if let Some(value) = self_attested.get(attr).filter(|v| v.matches_type(*ty)) {
                proof.disclosed.insert(
                    attr.clone(),
                    DisclosedAttribute {
                        value: value.clone(),
                        credential_id: None,
                        opening: None,
                    },
                );
            } else {
                let (source, value, opening) = open(&selection, request, attr)?;
                proof.disclosed.insert(
                    attr.clone(),
                    DisclosedAttribute {
                        value,
                        credential_id: Some(source.id().to_string()),
                        opening: Some(opening),
                    },
                );
            }
        }

        tracing::info!(
            request = request.name(),
            holder = %proof.holder,
            credentials = proof.credentials.len(),
            revealed = proof.revealed.len(),
            predicates = proof.predicates.len(),
            "proof built"
        );
        Ok(proof)
    }
}

fn open<'a>(
    selection: &'a Selection,
    request: &ProofRequest,
    attr: &str,
) -> Result<(&'a HeldCredential, AttributeValue, Opening), ProofError> {
    let insufficient = || ProofError::InsufficientCredentials {
        request: request.name().to_string(),
        missing: vec![attr.to_string()],
    };
    let source = selection.source(attr).ok_or_else(insufficient)?;
    let value = source.credential.get(attr).cloned().ok_or_else(insufficient)?;
    let opening = *source.opening(attr).ok_or_else(insufficient)?;
    Ok((source, value, opening))
}
