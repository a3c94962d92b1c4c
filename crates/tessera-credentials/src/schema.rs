use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use tessera_core::{AttributeType, Attributes, Identifier, SchemaKey};

use crate::error::CredentialError;

/// A published credential schema: the attribute names and types every
/// credential under this key must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub key: SchemaKey,
    pub attributes: BTreeMap<String, AttributeType>,
}

impl Schema {
    pub fn new(
        name: &str,
        version: &str,
        issuer: Identifier,
        attributes: &[(&str, AttributeType)],
    ) -> Self {
        Self {
            key: SchemaKey::new(name, version, issuer),
            attributes: attributes
                .iter()
                .map(|(n, t)| (n.to_string(), *t))
                .collect(),
        }
    }

    /// Check that `attributes` has exactly the schema's names, each with a
    /// value of the declared type.
    pub fn validate(&self, attributes: &Attributes) -> Result<(), CredentialError> {
        let mismatch = |reason: String| CredentialError::SchemaMismatch {
            schema: self.key.to_string(),
            reason,
        };

        for (name, ty) in &self.attributes {
            match attributes.get(name) {
                None => return Err(mismatch(format!("missing attribute {}", name))),
                Some(value) if !value.matches_type(*ty) => {
                    return Err(mismatch(format!("{} must be {}", name, ty)))
                }
                Some(_) => {}
            }
        }
        if let Some(extra) = attributes.keys().find(|k| !self.attributes.contains_key(*k)) {
            return Err(mismatch(format!("unexpected attribute {}", extra)));
        }
        Ok(())
    }
}

/// Registry of published schemas, shared by all parties.
pub struct SchemaRegistry {
    schemas: DashMap<SchemaKey, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            schemas: DashMap::new(),
        }
    }

    /// Publish a schema. Re-publishing an identical schema is a no-op.
    pub fn publish(&self, schema: Schema) -> Result<(), CredentialError> {
        match self.schemas.entry(schema.key.clone()) {
            Entry::Occupied(existing) => {
                if *existing.get() != schema {
                    return Err(CredentialError::SchemaConflict(schema.key.to_string()));
                }
            }
            Entry::Vacant(slot) => {
                tracing::info!(schema = %schema.key, attributes = schema.attributes.len(), "schema published");
                slot.insert(schema);
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &SchemaKey) -> Result<Schema, CredentialError> {
        self.schemas
            .get(key)
            .map(|s| s.clone())
            .ok_or_else(|| CredentialError::UnknownSchema(key.to_string()))
    }

    /// Schemas with the given name, ordered by key.
    pub fn find_by_name(&self, name: &str) -> Vec<Schema> {
        let mut found: Vec<Schema> = self
            .schemas
            .iter()
            .filter(|s| s.key.name == name)
            .map(|s| s.value().clone())
            .collect();
        found.sort_by(|a, b| a.key.cmp(&b.key));
        found
    }

    pub fn count(&self) -> usize {
        self.schemas.len()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::AttributeValue;

    fn transcript() -> Schema {
        Schema::new(
            "Transcript",
            "1.2",
            Identifier::from_verkey_bytes(&[1u8; 32]),
            &[
                ("student_name", AttributeType::String),
                ("degree", AttributeType::String),
                ("year", AttributeType::String),
                ("status", AttributeType::String),
            ],
        )
    }

    fn alice_attrs() -> Attributes {
        [
            ("student_name", "Alice Garcia"),
            ("degree", "Bachelor of Science, Marketing"),
            ("year", "2015"),
            ("status", "graduated"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), AttributeValue::from(v)))
        .collect()
    }

    #[test]
    fn test_validate_ok() {
        assert!(transcript().validate(&alice_attrs()).is_ok());
    }

    #[test]
    fn test_validate_missing_extra_and_type() {
        let schema = transcript();

        let mut missing = alice_attrs();
        missing.remove("degree");
        assert!(matches!(
            schema.validate(&missing),
            Err(CredentialError::SchemaMismatch { .. })
        ));

        let mut extra = alice_attrs();
        extra.insert("ssn".into(), "123-45-6789".into());
        assert!(schema.validate(&extra).is_err());

        let mut wrong_type = alice_attrs();
        wrong_type.insert("year".into(), AttributeValue::Int(2015));
        assert!(schema.validate(&wrong_type).is_err());
    }

    #[test]
    fn test_publish_idempotent_and_conflict() {
        let registry = SchemaRegistry::new();
        registry.publish(transcript()).unwrap();
        registry.publish(transcript()).unwrap();
        assert_eq!(registry.count(), 1);

        let mut changed = transcript();
        changed.attributes.remove("year");
        assert!(matches!(
            registry.publish(changed),
            Err(CredentialError::SchemaConflict(_))
        ));
    }

    #[test]
    fn test_get_and_find() {
        let registry = SchemaRegistry::default();
        let schema = transcript();
        registry.publish(schema.clone()).unwrap();
        assert_eq!(registry.get(&schema.key).unwrap(), schema);
        assert_eq!(registry.find_by_name("Transcript").len(), 1);

        let missing = SchemaKey::new("Job-Certificate", "0.2", schema.key.issuer.clone());
        assert!(matches!(
            registry.get(&missing),
            Err(CredentialError::UnknownSchema(_))
        ));
    }
}
