//! Declared field schemas for resource specs.

use serde::de::DeserializeOwned;

use crate::error::ValidationError;

/// Required and optional top-level keys of a kind's `spec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl FieldSchema {
    pub const fn new(required: &'static [&'static str], optional: &'static [&'static str]) -> Self {
        Self { required, optional }
    }

    /// Reject specs with missing required keys or keys outside the schema.
    pub fn check(
        &self,
        kind: &str,
        spec: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), ValidationError> {
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|field| !spec.contains_key(**field))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields {
                kind: kind.to_string(),
                fields: missing,
            });
        }

        let mut extraneous: Vec<String> = spec
            .keys()
            .filter(|key| !self.required.contains(&key.as_str()) && !self.optional.contains(&key.as_str()))
            .cloned()
            .collect();
        if !extraneous.is_empty() {
            extraneous.sort();
            return Err(ValidationError::ExtraneousFields {
                kind: kind.to_string(),
                fields: extraneous,
            });
        }

        Ok(())
    }
}

/// A spec type that can be validated against its schema and deserialized.
pub trait SchemaResource: DeserializeOwned + Send + Sync + 'static {
    const FIELDS: FieldSchema;

    /// Check the schema, then deserialize.
    fn from_spec(kind: &str, spec: &serde_json::Value) -> Result<Self, ValidationError> {
        let object = spec.as_object().ok_or_else(|| ValidationError::InvalidSpec {
            kind: kind.to_string(),
            reason: "spec must be a mapping".into(),
        })?;
        Self::FIELDS.check(kind, object)?;
        serde_json::from_value(spec.clone()).map_err(|e| ValidationError::InvalidSpec {
            kind: kind.to_string(),
            reason: e.to_string(),
        })
    }
}
