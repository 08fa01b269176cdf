//! Built-in resource kinds that carry plain data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::{FieldSchema, SchemaResource};

pub const PROMPT: &str = "Prompt";
pub const CONFIG: &str = "Config";
pub const STREAM: &str = "Stream";
pub const TASK_LOG: &str = "TaskLog";
pub const ASSISTANT: &str = "Assistant";
pub const TOOL: &str = "Tool";

/// Tool name to description, as recorded in task logs.
///
/// Equality is order-independent.
pub type ToolDescriptions = BTreeMap<String, String>;

/// A reusable prompt text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub prompt: String,
}

impl SchemaResource for Prompt {
    const FIELDS: FieldSchema = FieldSchema::new(&["prompt"], &[]);
}

/// Record of one assistant interaction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskLog {
    pub prompt: String,
    #[serde(default)]
    pub tools: ToolDescriptions,
    #[serde(default)]
    pub steps: String,
    #[serde(default)]
    pub code: String,
}

impl SchemaResource for TaskLog {
    const FIELDS: FieldSchema = FieldSchema::new(&["prompt"], &["tools", "steps", "code"]);
}

/// Binding of a named stream definition to a pub/sub stream id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSpec {
    pub stream: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo_prefix: Option<String>,
}

fn default_format() -> String {
    "$message".into()
}

impl SchemaResource for StreamSpec {
    const FIELDS: FieldSchema = FieldSchema::new(&["stream"], &["format", "filter", "echoPrefix"]);
}
