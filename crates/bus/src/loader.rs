//! Manifest loading.
//!
//! A manifest file holds one or more resource documents. YAML files may
//! separate documents with `---`; a top-level sequence is read as a list of
//! documents. JSON is read through the same YAML parser.

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use assistants_core::bus::ResourceBus;
use assistants_core::error::TransportError;
use assistants_core::resource::ResourceDocument;

const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid resource document in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Parse every document in `text`. `path` is only used in errors.
pub fn parse_manifest(path: &Path, text: &str) -> Result<Vec<ResourceDocument>, LoadError> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    documents.push(to_document(path, item)?);
                }
            }
            other => documents.push(to_document(path, other)?),
        }
    }
    Ok(documents)
}

fn to_document(path: &Path, value: Value) -> Result<ResourceDocument, LoadError> {
    serde_json::from_value(value).map_err(|e| LoadError::Invalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Read a manifest file, or every manifest in a directory in file-name order.
pub fn load_manifests(path: &Path) -> Result<Vec<ResourceDocument>, LoadError> {
    let io_error = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    if !path.is_dir() {
        let text = std::fs::read_to_string(path).map_err(io_error)?;
        return parse_manifest(path, &text);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(path)
        .map_err(io_error)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
        })
        .collect();
    files.sort();

    let mut documents = Vec::new();
    for file in files {
        let text = std::fs::read_to_string(&file).map_err(|source| LoadError::Io {
            path: file.clone(),
            source,
        })?;
        let parsed = parse_manifest(&file, &text)?;
        debug!(path = %file.display(), count = parsed.len(), "Read manifest");
        documents.extend(parsed);
    }
    Ok(documents)
}

/// Apply documents to the bus in order. Returns how many were applied.
pub async fn seed(bus: &dyn ResourceBus, cluster: &str, documents: Vec<ResourceDocument>) -> Result<usize, LoadError> {
    let count = documents.len();
    for document in documents {
        bus.apply_resource(cluster, document, false).await?;
    }
    info!(cluster = %cluster, count, "Seeded resources");
    Ok(count)
}
