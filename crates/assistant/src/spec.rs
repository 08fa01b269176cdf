//! Assistant resource spec.

use serde::Deserialize;
use std::collections::BTreeMap;

use assistants_core::schema::{FieldSchema, SchemaResource};

/// One stream reference or a list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StreamRefs {
    One(String),
    Many(Vec<String>),
}

impl StreamRefs {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(reference) => vec![reference.clone()],
            Self::Many(references) => references.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantSpec {
    pub code_model: String,
    pub stream: StreamRefs,
    /// Alias → tool reference.
    pub tools: BTreeMap<String, String>,
    #[serde(default)]
    pub mission: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    /// TaskLog references, oldest first.
    #[serde(default)]
    pub examples: Vec<String>,
}

impl SchemaResource for AssistantSpec {
    const FIELDS: FieldSchema = FieldSchema::new(&["codeModel", "stream", "tools"], &["mission", "header", "examples"]);
}

impl AssistantSpec {
    /// `header` when set, otherwise `mission`.
    pub fn header_source(&self) -> Option<&str> {
        self.header.as_deref().or(self.mission.as_deref())
    }
}
