//! Send tool: publishes a message to a data stream.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use assistants_controller::ResourceSet;
use assistants_core::bus::StreamBus;
use assistants_core::error::{ToolError, ValidationError};
use assistants_core::kinds::StreamSpec;
use assistants_core::schema::{FieldSchema, SchemaResource};
use assistants_core::tool::Tool;
use assistants_core::KindRef;
use assistants_template::{Template, plain_text};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendToolSpec {
    pub description: String,
    /// Reference to a Stream resource.
    #[serde(default)]
    pub stream: Option<String>,
    /// Raw stream id.
    #[serde(default)]
    pub send_url: Option<String>,
    #[serde(default)]
    pub format: Option<Value>,
    #[serde(default)]
    pub join: Option<String>,
    #[serde(default)]
    pub print: bool,
    #[serde(default)]
    pub synchronous: bool,
}

impl SchemaResource for SendToolSpec {
    const FIELDS: FieldSchema = FieldSchema::new(
        &["description"],
        &["stream", "sendUrl", "format", "join", "print", "synchronous"],
    );
}

/// Where a send tool finds streams and how it publishes.
#[derive(Clone)]
pub struct SendTarget {
    pub bus: Arc<dyn StreamBus>,
    pub streams: ResourceSet<StreamSpec>,
    /// Defaults for expanding abbreviated Stream references.
    pub stream_kind: KindRef,
}

pub struct SendTool {
    spec: SendToolSpec,
    target: SendTarget,
}

impl SendTool {
    pub fn new(spec: SendToolSpec, target: SendTarget) -> Result<Self, ValidationError> {
        if spec.stream.is_none() && spec.send_url.is_none() {
            return Err(ValidationError::InvalidSpec {
                kind: "SendTool".into(),
                reason: "SendTool must have either 'sendUrl' or 'stream'".into(),
            });
        }
        Ok(Self { spec, target })
    }

    pub fn spec(&self) -> &SendToolSpec {
        &self.spec
    }

    fn stream_id(&self) -> Result<String, ToolError> {
        if let Some(url) = &self.spec.send_url {
            return Ok(url.clone());
        }
        let reference = self.spec.stream.as_deref().unwrap_or_default();
        let (_, stream) = self
            .target
            .streams
            .resolve(reference, &self.target.stream_kind)
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "SendTool".into(),
                reason: e.to_string(),
            })?;
        Ok(stream.stream.clone())
    }

    fn message(&self, arguments: Value) -> Result<Value, ToolError> {
        if let Some(format) = &self.spec.format {
            let bindings = match arguments {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                _ => {
                    return Err(ToolError::InvalidArguments(
                        "SendTool with 'format' must be called with named arguments".into(),
                    ));
                }
            };
            return Ok(format_message(format, &bindings));
        }
        if let Some(separator) = &self.spec.join {
            let items = match arguments {
                Value::Array(items) => items,
                Value::Object(_) => {
                    return Err(ToolError::InvalidArguments(
                        "SendTool with 'join' must be called with positional arguments".into(),
                    ));
                }
                Value::Null => Vec::new(),
                other => vec![other],
            };
            let joined: Vec<String> = items.into_iter().map(plain_text).collect();
            return Ok(Value::String(joined.join(separator)));
        }
        Ok(arguments)
    }
}

/// Render every string in a nested format value.
pub fn format_message(format: &Value, bindings: &Map<String, Value>) -> Value {
    match format {
        Value::String(text) => Template::parse(text).render(bindings).into_value(),
        Value::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), format_message(value, bindings)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| format_message(v, bindings)).collect()),
        other => other.clone(),
    }
}

#[async_trait]
impl Tool for SendTool {
    fn description(&self) -> &str {
        &self.spec.description
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let message = self.message(arguments)?;
        if self.spec.print {
            info!(message = %message, "SendTool message");
        }
        let stream_id = self.stream_id()?;
        self.target
            .bus
            .publish(&stream_id, message.clone(), self.spec.synchronous)
            .await?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistants_core::error::TransportError;
    use assistants_core::resource::{API_VERSION, ASSISTANTS_GROUP};
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct RecordingBus {
        published: Mutex<Vec<(String, Value, bool)>>,
    }

    #[async_trait]
    impl StreamBus for RecordingBus {
        async fn subscribe(&self, _stream_id: &str) -> Result<mpsc::Receiver<Value>, TransportError> {
            Err(TransportError::Unavailable("recording only".into()))
        }

        async fn publish(&self, stream_id: &str, payload: Value, sync: bool) -> Result<(), TransportError> {
            self.published.lock().unwrap().push((stream_id.into(), payload, sync));
            Ok(())
        }
    }

    fn tool(spec: Value, bus: Arc<RecordingBus>) -> Result<SendTool, ValidationError> {
        let spec = SendToolSpec::from_spec("SendTool", &spec)?;
        SendTool::new(
            spec,
            SendTarget {
                bus,
                streams: ResourceSet::new(),
                stream_kind: KindRef::new(ASSISTANTS_GROUP, API_VERSION, "Stream"),
            },
        )
    }

    #[tokio::test]
    async fn format_renders_named_arguments() {
        let bus = Arc::new(RecordingBus::default());
        let send = tool(
            json!({
                "description": "notify",
                "sendUrl": "alerts",
                "format": {"text": "Hello $name", "count": "${n|int}", "tags": ["$name"]},
                "synchronous": true
            }),
            bus.clone(),
        )
        .unwrap();

        let out = send.call(json!({"name": "Ada", "n": "3"})).await.unwrap();
        let expected = json!({"text": "Hello Ada", "count": 3, "tags": ["Ada"]});
        assert_eq!(out, expected);
        assert_eq!(
            bus.published.lock().unwrap().as_slice(),
            &[("alerts".to_string(), expected, true)]
        );
    }

    #[tokio::test]
    async fn join_concatenates_positional_arguments() {
        let bus = Arc::new(RecordingBus::default());
        let send = tool(
            json!({"description": "d", "sendUrl": "s", "join": ", "}),
            bus.clone(),
        )
        .unwrap();
        let out = send.call(json!(["a", 1, true])).await.unwrap();
        assert_eq!(out, json!("a, 1, true"));
        assert!(send.call(json!({"k": "v"})).await.is_err());
    }

    #[tokio::test]
    async fn unresolved_stream_reference_fails() {
        let bus = Arc::new(RecordingBus::default());
        let send = tool(json!({"description": "d", "stream": "nowhere"}), bus.clone()).unwrap();
        let err = send.call(json!("hi")).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        assert!(bus.published.lock().unwrap().is_empty());
    }

    #[test]
    fn needs_a_destination() {
        let bus = Arc::new(RecordingBus::default());
        assert!(tool(json!({"description": "d"}), bus).is_err());
    }
}
