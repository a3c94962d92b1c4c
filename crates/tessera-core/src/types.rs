use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CoreError;

/// Decentralized identifier of a party.
///
/// Base58 text of either a 16-byte abbreviated or a 32-byte full
/// verification key. A freshly created identity uses the base58 form of its
/// first Ed25519 verification key (a cryptonym).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Parse and validate an identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        let decoded = bs58::decode(&value)
            .into_vec()
            .map_err(|e| CoreError::InvalidIdentifier(format!("{}: {}", value, e)))?;
        if decoded.len() != 16 && decoded.len() != 32 {
            return Err(CoreError::InvalidIdentifier(format!(
                "{} decodes to {} bytes, expected 16 or 32",
                value,
                decoded.len()
            )));
        }
        Ok(Self(value))
    }

    /// Build the cryptonym for a 32-byte verification key.
    pub fn from_verkey_bytes(verkey: &[u8; 32]) -> Self {
        Self(bs58::encode(verkey).into_string())
    }

    /// Get the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a published identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Network steward: may publish identities of any role.
    Steward,
    /// Trust anchor: may publish plain user identities.
    TrustAnchor,
    /// Identity without publishing rights.
    User,
}

impl Role {
    /// Whether an identity holding this role may publish one with `target`.
    pub fn can_sponsor(&self, target: Role) -> bool {
        match self {
            Self::Steward => true,
            Self::TrustAnchor => target == Role::User,
            Self::User => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Steward => write!(f, "STEWARD"),
            Self::TrustAnchor => write!(f, "TRUST_ANCHOR"),
            Self::User => write!(f, "USER"),
        }
    }
}

/// Declared type of a schema or proof-request attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Int,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Int => write!(f, "int"),
        }
    }
}

/// Value of a credential attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    String(String),
}

impl AttributeValue {
    /// Canonical byte encoding used for commitments.
    ///
    /// Integers are little-endian so predicate proofs can bind to the same
    /// commitment the issuer signed.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Int(i) => i.to_le_bytes().to_vec(),
            Self::String(s) => s.as_bytes().to_vec(),
        }
    }

    /// Whether this value is acceptable for a declared type.
    pub fn matches_type(&self, ty: AttributeType) -> bool {
        matches!(
            (self, ty),
            (Self::Int(_), AttributeType::Int) | (Self::String(_), AttributeType::String)
        )
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::String(_) => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

/// Attribute name → value, ordered by name.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Key of a published credential schema.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaKey {
    /// Schema name (e.g., "Transcript").
    pub name: String,
    /// Schema version (e.g., "1.2").
    pub version: String,
    /// Identifier of the publishing issuer.
    pub issuer: Identifier,
}

impl SchemaKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>, issuer: Identifier) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            issuer,
        }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.version, self.issuer)
    }
}

/// Canonical JSON bytes: object keys sorted, no whitespace.
///
/// Everything that gets signed in Tessera is signed over this form.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&value)?)
}
