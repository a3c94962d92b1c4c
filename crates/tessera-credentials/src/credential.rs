use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use tessera_core::{canonical_bytes, AttributeValue, Attributes, Identifier, SchemaKey};
use tessera_crypto::hashing::hex32;
use tessera_crypto::{Commitment, SelectiveDisclosure, Signature};
use tessera_identity::Identity;

use crate::error::CredentialError;

/// The issuer-signed half of a credential.
///
/// The issuer signs the per-attribute commitments rather than the plaintext
/// values, so a holder can show this set to a verifier and open only the
/// attributes the verifier asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentSet {
    pub credential_id: String,
    pub schema_key: SchemaKey,
    pub issuer: Identifier,
    pub subject: Identifier,
    pub commitments: BTreeMap<String, Commitment>,
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Base58 Ed25519 signature over [`CommitmentSet::signing_payload`].
    #[serde(default)]
    pub issuer_signature: String,
}

impl CommitmentSet {
    /// Canonical JSON of everything except the signature.
    pub fn signing_payload(&self) -> Result<Vec<u8>, CredentialError> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("issuerSignature");
        }
        Ok(canonical_bytes(&value)?)
    }

    /// Verify the issuer signature with `issuer`'s current key.
    pub fn verify(&self, issuer: &Identity) -> Result<(), CredentialError> {
        if issuer.identifier != self.issuer {
            return Err(CredentialError::InvalidSignature(self.issuer.to_string()));
        }
        let signature = Signature::from_bs58(&self.issuer_signature)
            .map_err(|_| CredentialError::InvalidSignature(self.issuer.to_string()))?;
        issuer
            .verify(&self.signing_payload()?, &signature)
            .map_err(|_| CredentialError::InvalidSignature(self.issuer.to_string()))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }
}

/// Salt that opens one attribute commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opening(#[serde(with = "hex32")] pub [u8; 32]);

/// An issued credential: plaintext attributes plus the signed commitments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub attributes: Attributes,
    pub signed: CommitmentSet,
}

impl Credential {
    pub fn id(&self) -> &str {
        &self.signed.credential_id
    }

    pub fn schema_key(&self) -> &SchemaKey {
        &self.signed.schema_key
    }

    pub fn issuer(&self) -> &Identifier {
        &self.signed.issuer
    }

    pub fn subject(&self) -> &Identifier {
        &self.signed.subject
    }

    pub fn get(&self, attr: &str) -> Option<&AttributeValue> {
        self.attributes.get(attr)
    }
}

/// A credential together with its commitment openings, as kept by the holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldCredential {
    pub credential: Credential,
    pub openings: BTreeMap<String, Opening>,
}

impl HeldCredential {
    /// Commit to every attribute under fresh salts. The returned commitment
    /// set is unsigned.
    pub fn commit(
        credential_id: String,
        schema_key: SchemaKey,
        subject: Identifier,
        attributes: Attributes,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut disclosure = SelectiveDisclosure::new();
        for (name, value) in &attributes {
            disclosure.add(name.clone(), &value.encode());
        }
        let openings = disclosure
            .salts()
            .into_iter()
            .map(|(name, salt)| (name, Opening(salt)))
            .collect();

        let signed = CommitmentSet {
            credential_id,
            issuer: schema_key.issuer.clone(),
            schema_key,
            subject,
            commitments: disclosure.commitments(),
            issued_at: Utc::now(),
            expires_at,
            issuer_signature: String::new(),
        };

        Self {
            credential: Credential { attributes, signed },
            openings,
        }
    }

    /// Check that every attribute opens its signed commitment and that no
    /// commitment is left without an attribute.
    pub fn check_openings(&self) -> Result<(), CredentialError> {
        let signed = &self.credential.signed;
        if signed.commitments.len() != self.credential.attributes.len() {
            return Err(CredentialError::InvalidCredential(format!(
                "{}: {} commitments for {} attributes",
                signed.credential_id,
                signed.commitments.len(),
                self.credential.attributes.len()
            )));
        }
        for (name, value) in &self.credential.attributes {
            let opens = match (signed.commitments.get(name), self.openings.get(name)) {
                (Some(commitment), Some(opening)) => {
                    SelectiveDisclosure::verify_revealed(commitment, &value.encode(), &opening.0)
                }
                _ => false,
            };
            if !opens {
                return Err(CredentialError::InvalidCredential(format!(
                    "{}: attribute {} does not open its commitment",
                    signed.credential_id, name
                )));
            }
        }
        Ok(())
    }

    pub fn opening(&self, attr: &str) -> Option<&Opening> {
        self.openings.get(attr)
    }

    pub fn id(&self) -> &str {
        self.credential.id()
    }

    pub fn schema_key(&self) -> &SchemaKey {
        self.credential.schema_key()
    }
}
