use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::types::AttributeType;

/// Predicate kinds a proof request may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateType {
    /// Greater than or equal.
    #[serde(rename = "GE")]
    Ge,
}

/// A claim about an integer attribute, checked against its signed commitment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Predicate {
    pub attr_name: String,
    pub p_type: PredicateType,
    pub value: i64,
}

impl Predicate {
    pub fn at_least(attr_name: impl Into<String>, value: i64) -> Self {
        Self {
            attr_name: attr_name.into(),
            p_type: PredicateType::Ge,
            value,
        }
    }

    pub fn holds_for(&self, value: i64) -> bool {
        match self.p_type {
            PredicateType::Ge => value >= self.value,
        }
    }
}

/// Wire shape; validated into [`ProofRequest`] on deserialization.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProofRequest {
    name: String,
    version: String,
    attributes: BTreeMap<String, AttributeType>,
    #[serde(default)]
    verifiable_attributes: Vec<String>,
    #[serde(default)]
    predicates: Vec<Predicate>,
}

/// A verifier's request for attributes.
///
/// `verifiable_attributes` is always a subset of `attributes`, and every
/// predicate names an integer attribute of the request. Both are enforced at
/// construction and when parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawProofRequest")]
pub struct ProofRequest {
    name: String,
    version: String,
    attributes: BTreeMap<String, AttributeType>,
    verifiable_attributes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    predicates: Vec<Predicate>,
}

impl ProofRequest {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        attributes: BTreeMap<String, AttributeType>,
        verifiable_attributes: Vec<String>,
        predicates: Vec<Predicate>,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        for attr in &verifiable_attributes {
            if !attributes.contains_key(attr) {
                return Err(CoreError::InvalidProofRequest(format!(
                    "{}: verifiable attribute {} is not a requested attribute",
                    name, attr
                )));
            }
        }
        for predicate in &predicates {
            match attributes.get(&predicate.attr_name) {
                Some(AttributeType::Int) => {}
                Some(AttributeType::String) => {
                    return Err(CoreError::InvalidProofRequest(format!(
                        "{}: predicate on non-integer attribute {}",
                        name, predicate.attr_name
                    )))
                }
                None => {
                    return Err(CoreError::InvalidProofRequest(format!(
                        "{}: predicate on unrequested attribute {}",
                        name, predicate.attr_name
                    )))
                }
            }
        }

        let mut verifiable_attributes = verifiable_attributes;
        verifiable_attributes.dedup();

        Ok(Self {
            name,
            version: version.into(),
            attributes,
            verifiable_attributes,
            predicates,
        })
    }

    /// Convenience constructor from `(name, type)` pairs.
    pub fn from_parts(
        name: &str,
        version: &str,
        attributes: &[(&str, AttributeType)],
        verifiable: &[&str],
    ) -> Result<Self, CoreError> {
        Self::new(
            name,
            version,
            attributes
                .iter()
                .map(|(n, t)| (n.to_string(), *t))
                .collect(),
            verifiable.iter().map(|s| s.to_string()).collect(),
            Vec::new(),
        )
    }

    pub fn with_predicate(self, predicate: Predicate) -> Result<Self, CoreError> {
        let mut predicates = self.predicates;
        predicates.push(predicate);
        Self::new(
            self.name,
            self.version,
            self.attributes,
            self.verifiable_attributes,
            predicates,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeType> {
        &self.attributes
    }

    pub fn verifiable_attributes(&self) -> &[String] {
        &self.verifiable_attributes
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_verifiable(&self, attr: &str) -> bool {
        self.verifiable_attributes.iter().any(|a| a == attr)
    }

    pub fn predicate_for(&self, attr: &str) -> Option<&Predicate> {
        self.predicates.iter().find(|p| p.attr_name == attr)
    }

    /// Attributes that may be disclosed as plaintext.
    pub fn plain_attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .keys()
            .map(String::as_str)
            .filter(|a| !self.is_verifiable(a) && self.predicate_for(a).is_none())
    }
}

impl TryFrom<RawProofRequest> for ProofRequest {
    type Error = CoreError;

    fn try_from(raw: RawProofRequest) -> Result<Self, Self::Error> {
        Self::new(
            raw.name,
            raw.version,
            raw.attributes,
            raw.verifiable_attributes,
            raw.predicates,
        )
    }
}
