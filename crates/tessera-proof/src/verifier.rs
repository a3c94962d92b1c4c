use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use tessera_core::{Attributes, Identifier, Predicate, ProofRequest};
use tessera_credentials::{CommitmentSet, RevocationRegistry};
use tessera_crypto::{Commitment, SelectiveDisclosure};
use tessera_identity::{IdentityError, IdentityResolver};

use crate::error::ProofError;
use crate::presentation::Proof;

/// What a verifier learns from a valid proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedProof {
    pub request_name: String,
    pub holder: Identifier,
    /// Revealed and disclosed values.
    pub attributes: Attributes,
    /// Attributes the holder vouched for without a credential.
    pub self_attested: Vec<String>,
    /// Predicates checked against signed commitments. Their values are not
    /// reported in `attributes`.
    pub predicates: Vec<Predicate>,
    pub issuers: Vec<Identifier>,
}

/// Checks proofs against proof requests.
///
/// Issuer signatures are checked with the issuer's *current* key from the
/// registry, so credentials signed with a rotated-away key fail.
pub struct ProofVerifier {
    resolver: Arc<dyn IdentityResolver>,
    revocations: Option<Arc<RevocationRegistry>>,
}

impl ProofVerifier {
    pub fn new(resolver: Arc<dyn IdentityResolver>, revocations: Arc<RevocationRegistry>) -> Self {
        Self {
            resolver,
            revocations: Some(revocations),
        }
    }

    pub fn without_revocations(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            resolver,
            revocations: None,
        }
    }

    /// Verify `proof` as an answer to `request`.
    pub async fn verify(
        &self,
        request: &ProofRequest,
        proof: &Proof,
    ) -> Result<VerifiedProof, ProofError> {
        let result = self.check(request, proof).await;
        match &result {
            Ok(verified) => tracing::info!(
                request = request.name(),
                holder = %verified.holder,
                credentials = proof.credentials.len(),
                "proof verified"
            ),
            Err(e) => tracing::warn!(request = request.name(), error = %e, "proof rejected"),
        }
        result
    }

    async fn check(&self, request: &ProofRequest, proof: &Proof) -> Result<VerifiedProof, ProofError> {
        if proof.request_name != request.name() || proof.request_version != request.version() {
            return Err(ProofError::invalid(format!(
                "proof answers {} {}, not {} {}",
                proof.request_name,
                proof.request_version,
                request.name(),
                request.version()
            )));
        }

        let mut issuers = BTreeSet::new();
        let mut seen = BTreeSet::new();
        for set in &proof.credentials {
            if !seen.insert(set.credential_id.as_str()) {
                return Err(ProofError::invalid(format!(
                    "credential {} included twice",
                    set.credential_id
                )));
            }
            self.check_credential(set, &proof.holder).await?;
            issuers.insert(set.issuer.clone());
        }

        for name in proof
            .revealed
            .keys()
            .chain(proof.predicates.keys())
            .chain(proof.disclosed.keys())
        {
            if !request.attributes().contains_key(name) {
                return Err(ProofError::invalid(format!("unrequested attribute {}", name)));
            }
        }
        if proof.answered() != request.attributes().len() {
            return Err(ProofError::invalid(format!(
                "{} attributes answered, {} requested",
                proof.answered(),
                request.attributes().len()
            )));
        }

        let mut attributes = Attributes::new();
        let mut self_attested = Vec::new();
        let mut predicates = Vec::new();

        for (attr, ty) in request.attributes() {
            if request.is_verifiable(attr) {
                let revealed = proof
                    .revealed
                    .get(attr)
                    .ok_or_else(|| ProofError::invalid(format!("{} is not revealed", attr)))?;
                let commitment = signed_commitment(proof, &revealed.credential_id, attr)?;
                if !SelectiveDisclosure::verify_revealed(
                    commitment,
                    &revealed.value.encode(),
                    &revealed.opening.0,
                ) {
                    return Err(ProofError::invalid(format!(
                        "{} does not open its commitment",
                        attr
                    )));
                }
                if !revealed.value.matches_type(*ty) {
                    return Err(ProofError::invalid(format!("{} must be {}", attr, ty)));
                }
                if let Some(predicate) = request.predicate_for(attr) {
                    if !revealed.value.as_int().is_some_and(|v| predicate.holds_for(v)) {
                        return Err(ProofError::invalid(format!(
                            "{} does not satisfy its predicate",
                            attr
                        )));
                    }
                    predicates.push(predicate.clone());
                }
                attributes.insert(attr.clone(), revealed.value.clone());
            } else if let Some(predicate) = request.predicate_for(attr) {
                let answer = proof
                    .predicates
                    .get(attr)
                    .ok_or_else(|| ProofError::invalid(format!("no predicate proof for {}", attr)))?;
                if answer.predicate != *predicate {
                    return Err(ProofError::invalid(format!(
                        "predicate proof for {} answers a different predicate",
                        attr
                    )));
                }
                let commitment = signed_commitment(proof, &answer.credential_id, attr)?;
                if !commitment.verify(&answer.value.encode(), &answer.opening.0) {
                    return Err(ProofError::invalid(format!(
                        "predicate answer for {} does not open its commitment",
                        attr
                    )));
                }
                if !answer.value.as_int().is_some_and(|v| predicate.holds_for(v)) {
                    return Err(ProofError::invalid(format!(
                        "{} does not satisfy its predicate",
                        attr
                    )));
                }
                predicates.push(predicate.clone());
            } else {
                let disclosed = proof
                    .disclosed
                    .get(attr)
                    .ok_or_else(|| ProofError::invalid(format!("{} is not disclosed", attr)))?;
                if !disclosed.value.matches_type(*ty) {
                    return Err(ProofError::invalid(format!("{} must be {}", attr, ty)));
                }
                match (&disclosed.credential_id, &disclosed.opening) {
                    (Some(id), Some(opening)) => {
                        let commitment = signed_commitment(proof, id, attr)?;
                        if !commitment.verify(&disclosed.value.encode(), &opening.0) {
                            return Err(ProofError::invalid(format!(
                                "{} does not open its commitment",
                                attr
                            )));
                        }
                    }
                    (Some(id), None) => {
                        return Err(ProofError::invalid(format!(
                            "{} cites credential {} without an opening",
                            attr, id
                        )))
                    }
                    (None, _) => self_attested.push(attr.clone()),
                }
                attributes.insert(attr.clone(), disclosed.value.clone());
            }
        }

        Ok(VerifiedProof {
            request_name: request.name().to_string(),
            holder: proof.holder.clone(),
            attributes,
            self_attested,
            predicates,
            issuers: issuers.into_iter().collect(),
        })
    }

    async fn check_credential(
        &self,
        set: &CommitmentSet,
        holder: &Identifier,
    ) -> Result<(), ProofError> {
        if set.subject != *holder {
            return Err(ProofError::invalid(format!(
                "credential {} belongs to {}",
                set.credential_id, set.subject
            )));
        }
        if set.schema_key.issuer != set.issuer {
            return Err(ProofError::invalid(format!(
                "credential {} issued under a schema of {}",
                set.credential_id, set.schema_key.issuer
            )));
        }

        let issuer = match self.resolver.resolve(&set.issuer).await {
            Ok(identity) => identity,
            Err(IdentityError::UnknownIdentity(id)) => {
                return Err(ProofError::invalid(format!("unknown issuer {}", id)))
            }
            Err(e) => return Err(e.into()),
        };
        set.verify(&issuer).map_err(|_| {
            ProofError::invalid(format!(
                "issuer signature on credential {} does not verify",
                set.credential_id
            ))
        })?;

        if set.is_expired_at(Utc::now()) {
            return Err(ProofError::invalid(format!(
                "credential {} expired",
                set.credential_id
            )));
        }
        if self
            .revocations
            .as_ref()
            .is_some_and(|r| r.is_revoked(&set.credential_id, &set.issuer))
        {
            return Err(ProofError::invalid(format!(
                "credential {} is revoked",
                set.credential_id
            )));
        }
        Ok(())
    }
}

fn signed_commitment<'a>(
    proof: &'a Proof,
    credential_id: &str,
    attr: &str,
) -> Result<&'a Commitment, ProofError> {
    proof
        .credential(credential_id)
        .ok_or_else(|| {
            ProofError::invalid(format!("{} cites unknown credential {}", attr, credential_id))
        })?
        .commitments
        .get(attr)
        .ok_or_else(|| {
            ProofError::invalid(format!(
                "credential {} has no commitment for {}",
                credential_id, attr
            ))
        })
}
