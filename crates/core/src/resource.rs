//! Resource identity and the wire document.
//!
//! Every reconciled object is addressed by `group/version/kind/name`.
//! Documents travel as `{apiVersion, kind, metadata: {name}, spec}` in
//! YAML or JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ReferenceError, ValidationError};

/// Default API group for assistants, prompts, task logs, streams and configs.
pub const ASSISTANTS_GROUP: &str = "assistants.thatone.ai";

/// Default API group for tools.
pub const TOOLS_GROUP: &str = "tools.thatone.ai";

/// Default API version for both groups.
pub const API_VERSION: &str = "v1";

/// A resource kind: `(group, version, kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KindRef {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl KindRef {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Build from an `apiVersion` string (`group/version`) and a kind.
    pub fn from_api_version(api_version: &str, kind: impl Into<String>) -> Result<Self, ValidationError> {
        let (group, version) = api_version
            .split_once('/')
            .filter(|(g, v)| !g.is_empty() && !v.is_empty() && !v.contains('/'))
            .ok_or_else(|| ValidationError::InvalidApiVersion(api_version.to_string()))?;
        Ok(Self::new(group, version, kind))
    }

    /// `group/version`
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    /// The key of a named resource of this kind.
    pub fn key(&self, name: impl Into<String>) -> ResourceKey {
        ResourceKey {
            group: self.group.clone(),
            version: self.version.clone(),
            kind: self.kind.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for KindRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.version, self.kind)
    }
}

/// Globally unique resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
}

impl ResourceKey {
    /// Parse the fully-qualified form `group/version/kind/name`.
    pub fn parse(path: &str) -> Result<Self, ValidationError> {
        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            [group, version, kind, name] if segments.iter().all(|s| !s.is_empty()) => Ok(Self {
                group: (*group).into(),
                version: (*version).into(),
                kind: (*kind).into(),
                name: (*name).into(),
            }),
            _ => Err(ValidationError::InvalidPath(path.to_string())),
        }
    }

    /// Expand an abbreviated reference.
    ///
    /// Accepts `name` (kind from `defaults`), `Kind/name` (group and version
    /// from `defaults`) or the fully-qualified four-segment form.
    pub fn expand(reference: &str, defaults: &KindRef) -> Result<Self, ReferenceError> {
        let segments: Vec<&str> = reference.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ReferenceError::Malformed(reference.to_string()));
        }
        match segments.as_slice() {
            [name] => Ok(defaults.key(*name)),
            [kind, name] => Ok(Self {
                group: defaults.group.clone(),
                version: defaults.version.clone(),
                kind: (*kind).into(),
                name: (*name).into(),
            }),
            [_, _, _, _] => {
                Self::parse(reference).map_err(|_| ReferenceError::Malformed(reference.to_string()))
            }
            _ => Err(ReferenceError::Malformed(reference.to_string())),
        }
    }

    pub fn kind_ref(&self) -> KindRef {
        KindRef::new(&self.group, &self.version, &self.kind)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.group, self.version, self.kind, self.name)
    }
}

/// Resource metadata. Only the name is meaningful to the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
}

/// The wire representation of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDocument {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub spec: serde_json::Value,
}

impl ResourceDocument {
    pub fn new(kind: &KindRef, name: impl Into<String>, spec: serde_json::Value) -> Self {
        Self {
            api_version: kind.api_version(),
            kind: kind.kind.clone(),
            metadata: Metadata { name: name.into() },
            spec,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn kind_ref(&self) -> Result<KindRef, ValidationError> {
        KindRef::from_api_version(&self.api_version, &self.kind)
    }

    pub fn key(&self) -> Result<ResourceKey, ValidationError> {
        Ok(self.kind_ref()?.key(self.name()))
    }

    /// The spec as a mapping, or a validation error naming the resource.
    pub fn spec_object(&self) -> Result<&serde_json::Map<String, serde_json::Value>, ValidationError> {
        self.spec.as_object().ok_or_else(|| ValidationError::MissingSpec {
            kind: self.kind.clone(),
            name: self.metadata.name.clone(),
        })
    }
}

/// A persisted document as returned by a bulk read.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResource {
    pub name: String,
    pub config: ResourceDocument,
}
