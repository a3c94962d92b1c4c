use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tessera_core::{canonical_bytes, Identifier, Role};
use tessera_crypto::{verify, PublicKey, Signature};

use crate::error::IdentityError;

/// A published identity version.
///
/// Versions are immutable. Key rotation and endpoint changes append a new
/// version with a higher `seq_no`; the latest version is the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub identifier: Identifier,
    /// Base58 Ed25519 verification key.
    pub verkey: String,
    pub role: Role,
    /// Where the party's agent listens (e.g. "127.0.0.1:5555").
    pub endpoint: Option<String>,
    /// Version number, starting at 1 when published.
    #[serde(default)]
    pub seq_no: u64,
    #[serde(default = "Utc::now")]
    pub published_at: DateTime<Utc>,
}

impl Identity {
    /// An unpublished identity; the registry assigns `seq_no`.
    pub fn new(
        identifier: Identifier,
        verkey: impl Into<String>,
        role: Role,
        endpoint: Option<String>,
    ) -> Self {
        Self {
            identifier,
            verkey: verkey.into(),
            role,
            endpoint,
            seq_no: 0,
            published_at: Utc::now(),
        }
    }

    pub fn public_key(&self) -> Result<PublicKey, IdentityError> {
        Ok(PublicKey::from_bs58(&self.verkey)?)
    }

    /// Verify `signature` over `message` with this version's key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), IdentityError> {
        verify(message, signature, &self.public_key()?)
            .map_err(|_| IdentityError::InvalidSignature(self.identifier.to_string()))
    }

    /// Check that the identifier is the cryptonym of the verkey: either the
    /// full 32 key bytes or their first 16 bytes.
    pub fn check_cryptonym(&self) -> Result<(), IdentityError> {
        let key = self.public_key()?;
        let id_bytes = bs58::decode(self.identifier.as_str())
            .into_vec()
            .map_err(|e| tessera_core::CoreError::InvalidIdentifier(e.to_string()))?;
        let matches = match id_bytes.len() {
            32 => id_bytes.as_slice() == key.as_bytes(),
            16 => id_bytes.as_slice() == &key.as_bytes()[..16],
            _ => false,
        };
        if matches {
            Ok(())
        } else {
            Err(IdentityError::IdentifierMismatch {
                identifier: self.identifier.to_string(),
                verkey: self.verkey.clone(),
            })
        }
    }

    /// Bytes a sponsor signs to publish this identity.
    pub fn publish_payload(&self) -> Result<Vec<u8>, IdentityError> {
        Ok(canonical_bytes(&serde_json::json!({
            "op": "publish",
            "identifier": self.identifier,
            "verkey": self.verkey,
            "role": self.role,
            "endpoint": self.endpoint,
        }))?)
    }

    /// Bytes the current key signs to rotate to `new_verkey`.
    pub fn rotation_payload(
        identifier: &Identifier,
        new_verkey: &str,
        next_seq_no: u64,
    ) -> Result<Vec<u8>, IdentityError> {
        Ok(canonical_bytes(&serde_json::json!({
            "op": "rotate",
            "identifier": identifier,
            "verkey": new_verkey,
            "seqNo": next_seq_no,
        }))?)
    }

    /// Bytes the current key signs to move the endpoint.
    pub fn endpoint_payload(
        identifier: &Identifier,
        endpoint: &str,
        next_seq_no: u64,
    ) -> Result<Vec<u8>, IdentityError> {
        Ok(canonical_bytes(&serde_json::json!({
            "op": "endpoint",
            "identifier": identifier,
            "endpoint": endpoint,
            "seqNo": next_seq_no,
        }))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_crypto::{sign, KeyPair};

    fn identity_for(kp: &KeyPair) -> Identity {
        Identity::new(
            Identifier::from_verkey_bytes(kp.public_key().as_bytes()),
            kp.verkey(),
            Role::User,
            Some("127.0.0.1:5555".into()),
        )
    }

    #[test]
    fn test_cryptonym_full() {
        let kp = KeyPair::generate();
        assert!(identity_for(&kp).check_cryptonym().is_ok());
    }

    #[test]
    fn test_cryptonym_abbreviated() {
        let kp = KeyPair::generate();
        let short = bs58::encode(&kp.public_key().as_bytes()[..16]).into_string();
        let identity = Identity::new(Identifier::new(short).unwrap(), kp.verkey(), Role::User, None);
        assert!(identity.check_cryptonym().is_ok());
    }

    #[test]
    fn test_cryptonym_mismatch() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let mut identity = identity_for(&kp);
        identity.verkey = other.verkey();
        assert!(matches!(
            identity.check_cryptonym(),
            Err(IdentityError::IdentifierMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_with_identity_key() {
        let kp = KeyPair::generate();
        let identity = identity_for(&kp);
        let sig = sign(b"hello", &kp);
        assert!(identity.verify(b"hello", &sig).is_ok());
        assert!(matches!(
            identity.verify(b"bye", &sig),
            Err(IdentityError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_payloads_differ_by_operation() {
        let kp = KeyPair::generate();
        let identity = identity_for(&kp);
        let rotate = Identity::rotation_payload(&identity.identifier, &kp.verkey(), 2).unwrap();
        let endpoint = Identity::endpoint_payload(&identity.identifier, &kp.verkey(), 2).unwrap();
        assert_ne!(rotate, endpoint);
        assert_ne!(identity.publish_payload().unwrap(), rotate);
    }
}
