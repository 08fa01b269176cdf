//! REST API tool: a parameterized HTTP request.
//!
//! Every string in the spec (method, url, header and param keys and
//! values, string bodies and JSON body entries) is a template rendered
//! against the call arguments. The response body is the result.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use assistants_core::error::ToolError;
use assistants_core::schema::{FieldSchema, SchemaResource};
use assistants_core::tool::Tool;
use assistants_template::{Template, plain_text};

use crate::arguments_map;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RestApiToolSpec {
    pub description: String,
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Map<String, Value>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub data: Option<Value>,
    /// Accepted for compatibility; requests are not retried.
    #[serde(default)]
    pub backoff: Option<f64>,
    /// Accepted for compatibility; requests are not retried.
    #[serde(default)]
    pub attempts: Option<u32>,
}

impl SchemaResource for RestApiToolSpec {
    const FIELDS: FieldSchema = FieldSchema::new(
        &["description", "method", "url"],
        &["headers", "params", "data", "backoff", "attempts"],
    );
}

pub struct RestApiTool {
    spec: RestApiToolSpec,
    client: reqwest::Client,
}

impl RestApiTool {
    pub fn new(spec: RestApiToolSpec, client: reqwest::Client) -> Self {
        Self { spec, client }
    }

    pub fn spec(&self) -> &RestApiToolSpec {
        &self.spec
    }
}

fn render(text: &str, arguments: &Map<String, Value>) -> String {
    Template::parse(text).render_string(arguments)
}

/// Render keys, and values when they are strings.
fn render_pairs(pairs: &Map<String, Value>, arguments: &Map<String, Value>) -> Vec<(String, Value)> {
    pairs
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) => Value::String(render(text, arguments)),
                other => other.clone(),
            };
            (render(key, arguments), value)
        })
        .collect()
}

#[async_trait]
impl Tool for RestApiTool {
    fn description(&self) -> &str {
        &self.spec.description
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let arguments = arguments_map(arguments)?;

        let method = render(&self.spec.method, &arguments).to_uppercase();
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| ToolError::InvalidArguments(format!("Invalid HTTP method: {method}")))?;
        let url = render(&self.spec.url, &arguments);

        let mut request = self.client.request(method.clone(), &url);
        for (key, value) in render_pairs(&self.spec.headers, &arguments) {
            request = request.header(key, plain_text(value));
        }
        if !self.spec.params.is_empty() {
            let params: Vec<(String, String)> = render_pairs(&self.spec.params, &arguments)
                .into_iter()
                .map(|(key, value)| (key, plain_text(value)))
                .collect();
            request = request.query(&params);
        }
        match &self.spec.data {
            Some(Value::String(body)) => request = request.body(render(body, &arguments)),
            Some(Value::Object(body)) => {
                let body: Map<String, Value> = render_pairs(body, &arguments).into_iter().collect();
                request = request.json(&body);
            }
            _ => {}
        }

        debug!(method = %method, url = %url, "Sending REST request");
        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Request(e.to_string()))?;
        debug!(status, url = %url, "REST response");

        Ok(Value::String(body))
    }
}
