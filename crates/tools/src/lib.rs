//! Tool resources.
//!
//! Each tool kind is reconciled by its own schema-backed controller in the
//! tools API group. All tool controllers produce `Arc<dyn Tool>`, so a single
//! resource set can aggregate every kind for assistants to look up.

pub mod chat_completion;
pub mod edit_config;
pub mod rest_api;
pub mod send;

use serde_json::{Map, Value};
use std::sync::Arc;

use assistants_controller::{ControllerKind, ResourceController, SchemaBacked};
use assistants_core::error::ToolError;
use assistants_core::provider::Provider;
use assistants_core::tool::Tool;
use assistants_core::KindRef;

pub use chat_completion::{ChatGptTool, ChatGptToolSpec};
pub use edit_config::{ConfigStore, EditConfigTool, EditConfigToolSpec};
pub use rest_api::{RestApiTool, RestApiToolSpec};
pub use send::{SendTarget, SendTool, SendToolSpec};

pub const REST_API_TOOL: &str = "RestApiTool";
pub const CHAT_GPT_TOOL: &str = "ChatGptTool";
pub const SEND_TOOL: &str = "SendTool";
pub const EDIT_CONFIG_TOOL: &str = "EditConfigTool";

/// Collaborators tool objects are built with.
#[derive(Clone)]
pub struct ToolEnvironment {
    pub cluster: String,
    pub group: String,
    pub version: String,
    pub http: reqwest::Client,
    pub provider: Option<Arc<dyn Provider>>,
    pub send: SendTarget,
    pub configs: ConfigStore,
}

impl ToolEnvironment {
    pub fn kind(&self, kind: &str) -> KindRef {
        KindRef::new(&self.group, &self.version, kind)
    }
}

/// One controller per tool kind, in a fixed order.
pub fn tool_controllers(env: &ToolEnvironment) -> Vec<Arc<ResourceController<dyn Tool>>> {
    let http = env.http.clone();
    let rest = SchemaBacked::typed(move |spec: RestApiToolSpec| {
        Ok(Arc::new(RestApiTool::new(spec, http.clone())) as Arc<dyn Tool>)
    });

    let provider = env.provider.clone();
    let chat = SchemaBacked::typed(move |spec: ChatGptToolSpec| {
        Ok(Arc::new(ChatGptTool::new(spec, provider.clone())?) as Arc<dyn Tool>)
    });

    let target = env.send.clone();
    let send = SchemaBacked::typed(move |spec: SendToolSpec| {
        Ok(Arc::new(SendTool::new(spec, target.clone())?) as Arc<dyn Tool>)
    });

    let store = env.configs.clone();
    let edit = SchemaBacked::typed(move |spec: EditConfigToolSpec| {
        Ok(Arc::new(EditConfigTool::new(spec, store.clone())) as Arc<dyn Tool>)
    });

    [
        (REST_API_TOOL, rest),
        (CHAT_GPT_TOOL, chat),
        (SEND_TOOL, send),
        (EDIT_CONFIG_TOOL, edit),
    ]
    .into_iter()
    .map(|(kind, handling)| {
        Arc::new(ResourceController::new(
            env.cluster.clone(),
            env.kind(kind),
            ControllerKind::SchemaBacked(handling),
        ))
    })
    .collect()
}

/// Named call arguments. `null` means none.
pub(crate) fn arguments_map(arguments: Value) -> Result<Map<String, Value>, ToolError> {
    match arguments {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ToolError::InvalidArguments(format!(
            "expected named arguments, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arguments_map_accepts_objects_and_null() {
        assert_eq!(arguments_map(json!({"a": 1})).unwrap().len(), 1);
        assert!(arguments_map(Value::Null).unwrap().is_empty());
        assert!(arguments_map(json!([1])).is_err());
    }
}
