//! Edit-config tool: writes one value into a Config resource.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use assistants_controller::ResourceSet;
use assistants_core::bus::ResourceBus;
use assistants_core::error::ToolError;
use assistants_core::resource::ResourceDocument;
use assistants_core::schema::{FieldSchema, SchemaResource};
use assistants_core::tool::Tool;
use assistants_core::KindRef;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EditConfigToolSpec {
    pub description: String,
    /// Reference to a Config resource.
    pub config: String,
}

impl SchemaResource for EditConfigToolSpec {
    const FIELDS: FieldSchema = FieldSchema::new(&["description", "config"], &[]);
}

/// Where an edit-config tool reads and writes configs.
#[derive(Clone)]
pub struct ConfigStore {
    pub bus: Arc<dyn ResourceBus>,
    pub cluster: String,
    pub configs: ResourceSet<Value>,
    /// Defaults for expanding abbreviated Config references.
    pub config_kind: KindRef,
}

pub struct EditConfigTool {
    spec: EditConfigToolSpec,
    store: ConfigStore,
}

impl EditConfigTool {
    pub fn new(spec: EditConfigToolSpec, store: ConfigStore) -> Self {
        Self { spec, store }
    }

    pub fn spec(&self) -> &EditConfigToolSpec {
        &self.spec
    }
}

/// Set `value` at a dotted `path`, creating intermediate mappings.
pub fn set_path(config: &mut Value, path: &str, value: Value) -> Result<(), ToolError> {
    let pieces: Vec<&str> = path.split('.').collect();
    if pieces.iter().any(|p| p.is_empty()) {
        return Err(ToolError::InvalidArguments(format!("Invalid config key: '{path}'")));
    }
    let Some((last, parents)) = pieces.split_last() else {
        return Err(ToolError::InvalidArguments("Empty config key".into()));
    };

    let mut node = config;
    for piece in parents {
        let Value::Object(map) = node else {
            return Err(ToolError::InvalidArguments(format!(
                "Config key '{path}' crosses a non-mapping value"
            )));
        };
        node = map
            .entry(piece.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    match node {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        _ => Err(ToolError::InvalidArguments(format!(
            "Config key '{path}' crosses a non-mapping value"
        ))),
    }
}

#[async_trait]
impl Tool for EditConfigTool {
    fn description(&self) -> &str {
        &self.spec.description
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let key = arguments
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'key' argument".into()))?
            .to_string();
        let value = arguments.get("value").cloned().unwrap_or(Value::Null);

        let (config_key, current) = self
            .store
            .configs
            .resolve(&self.spec.config, &self.store.config_kind)
            .map_err(|_| ToolError::ExecutionFailed {
                tool_name: "EditConfigTool".into(),
                reason: format!("Must create the config {} before editing it", self.spec.config),
            })?;

        let mut updated = (*current).clone();
        set_path(&mut updated, &key, value)?;

        let document = ResourceDocument::new(&config_key.kind_ref(), &config_key.name, updated.clone());
        self.store
            .bus
            .apply_resource(&self.store.cluster, document, false)
            .await?;
        info!(config = %config_key, key = %key, "Edited config");
        Ok(updated)
    }
}
