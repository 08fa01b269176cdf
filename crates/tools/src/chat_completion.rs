//! Chat-completion tool: a chain of prompted LLM calls.
//!
//! Calls run in order. Each call's prompts are templates over the call
//! arguments plus `result`, the previous call's answer. A `retain` pattern
//! keeps only capture group 1 of a match at the start of the answer.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use assistants_core::error::{ProviderError, ToolError, ValidationError};
use assistants_core::message::Message;
use assistants_core::provider::{Provider, ProviderRequest};
use assistants_core::schema::{FieldSchema, SchemaResource};
use assistants_core::tool::Tool;
use assistants_template::Template;

use crate::arguments_map;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCall {
    pub system_prompt: String,
    pub user_prompt: String,
    #[serde(default)]
    pub retain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatGptToolSpec {
    pub description: String,
    pub model: String,
    pub calls: Vec<ChatCall>,
}

impl SchemaResource for ChatGptToolSpec {
    const FIELDS: FieldSchema = FieldSchema::new(&["description", "model", "calls"], &[]);
}

struct CompiledCall {
    system: Template,
    user: Template,
    retain: Option<Regex>,
}

pub struct ChatGptTool {
    spec: ChatGptToolSpec,
    calls: Vec<CompiledCall>,
    provider: Option<Arc<dyn Provider>>,
}

impl ChatGptTool {
    /// Compile prompts and `retain` patterns. A bad pattern rejects the spec.
    pub fn new(spec: ChatGptToolSpec, provider: Option<Arc<dyn Provider>>) -> Result<Self, ValidationError> {
        let calls = spec
            .calls
            .iter()
            .enumerate()
            .map(|(index, call)| {
                let retain = call
                    .retain
                    .as_deref()
                    .map(|pattern| {
                        Regex::new(&format!("^(?:{pattern})")).map_err(|e| ValidationError::InvalidField {
                            kind: "ChatGptTool".into(),
                            field: format!("calls[{index}].retain"),
                            reason: e.to_string(),
                        })
                    })
                    .transpose()?;
                Ok(CompiledCall {
                    system: Template::parse(&call.system_prompt),
                    user: Template::parse(&call.user_prompt),
                    retain,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        Ok(Self { spec, calls, provider })
    }

    pub fn spec(&self) -> &ChatGptToolSpec {
        &self.spec
    }
}

fn retained(pattern: &Regex, answer: String) -> String {
    match pattern.captures(&answer).and_then(|c| c.get(1)) {
        Some(group) => group.as_str().to_string(),
        None => answer,
    }
}

#[async_trait]
impl Tool for ChatGptTool {
    fn description(&self) -> &str {
        &self.spec.description
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured("no LLM provider for ChatGptTool".into()))?;

        let mut params: Map<String, Value> = Map::new();
        params.insert("result".into(), Value::Null);
        params.extend(arguments_map(arguments)?);

        let mut result = Value::Null;
        for (index, call) in self.calls.iter().enumerate() {
            let messages = vec![
                Message::system(call.system.render_string(&params)),
                Message::user(call.user.render_string(&params)),
            ];
            debug!(model = %self.spec.model, call = index, "Chat completion call");
            let response = provider
                .complete(ProviderRequest::new(&self.spec.model, messages))
                .await?;

            let mut answer = response.message.content;
            if let Some(pattern) = &call.retain {
                answer = retained(pattern, answer);
            }
            result = Value::String(answer);
            params.insert("result".into(), result.clone());
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistants_core::provider::ProviderResponse;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replies with canned answers in order and records every request.
    struct ScriptedProvider {
        answers: Mutex<Vec<String>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().rev().map(|s| s.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let model = request.model.clone();
            self.requests.lock().unwrap().push(request);
            let content = self.answers.lock().unwrap().pop().unwrap_or_default();
            Ok(ProviderResponse {
                message: Message::assistant(content),
                usage: None,
                model,
            })
        }
    }

    fn spec(calls: Value) -> ChatGptToolSpec {
        ChatGptToolSpec::from_spec(
            "ChatGptTool",
            &json!({"description": "summarize", "model": "gpt-4o-mini", "calls": calls}),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn calls_thread_previous_result() {
        let provider = Arc::new(ScriptedProvider::new(&["first answer", "Title: Final\nrest"]));
        let tool = ChatGptTool::new(
            spec(json!([
                {"systemPrompt": "Be terse.", "userPrompt": "Summarize $text"},
                {"systemPrompt": "Title it.", "userPrompt": "Given: $result", "retain": "Title: (.*)"}
            ])),
            Some(provider.clone()),
        )
        .unwrap();

        let out = tool.call(json!({"text": "the doc"})).await.unwrap();
        assert_eq!(out, json!("Final"));

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages[1].content, "Summarize the doc");
        assert_eq!(requests[1].messages[1].content, "Given: first answer");
        assert_eq!(requests[1].model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn retain_without_match_keeps_answer() {
        let provider = Arc::new(ScriptedProvider::new(&["no title here"]));
        let tool = ChatGptTool::new(
            spec(json!([{"systemPrompt": "s", "userPrompt": "u", "retain": "Title: (.*)"}])),
            Some(provider),
        )
        .unwrap();
        assert_eq!(tool.call(Value::Null).await.unwrap(), json!("no title here"));
    }

    #[test]
    fn bad_retain_pattern_is_a_validation_error() {
        let err = ChatGptTool::new(
            spec(json!([{"systemPrompt": "s", "userPrompt": "u", "retain": "("}])),
            None,
        )
        .err()
        .unwrap();
        assert!(matches!(err, ValidationError::InvalidField { .. }));
    }

    #[tokio::test]
    async fn missing_provider_fails_the_call() {
        let tool = ChatGptTool::new(spec(json!([])), None).unwrap();
        let err = tool.call(Value::Null).await.unwrap_err();
        assert!(matches!(err, ToolError::Provider(ProviderError::NotConfigured(_))));
    }
}
