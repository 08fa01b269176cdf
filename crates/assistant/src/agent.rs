//! A code agent backed by a single chat completion per turn.
//!
//! The reply is split at the first fenced block: text before it is the
//! explanation, the block body is the code. Running the code is left to
//! external agent engines, so the result is the code itself, or the
//! explanation when no code was written. The toolbox is not called here;
//! the system prompt names the tools the generated code may call.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use assistants_core::error::{AgentError, ProviderError};
use assistants_core::{AgentFactory, AgentReply, CodeAgent, Message, Provider, ProviderRequest, Toolbox};

const FENCE: &str = "```";

pub struct LlmCodeAgent {
    provider: Arc<dyn Provider>,
    model: String,
    code_language: String,
    toolbox: Toolbox,
    history: String,
    conversation: Vec<Message>,
}

impl LlmCodeAgent {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, code_language: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            code_language: code_language.into(),
            toolbox: Toolbox::new(),
            history: String::new(),
            conversation: Vec::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Turns exchanged since the last reset.
    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    fn system_prompt(&self) -> String {
        let names = self.toolbox.names();
        let tools = if names.is_empty() {
            "No tools are available.".to_string()
        } else {
            format!("Callable tools: {}.", names.join(", "))
        };
        format!(
            "You solve tasks by writing {lang} code that calls the available tools. \
             Answer with a short explanation followed by one ```{lang} fenced code block.\n\
             {tools}\n\n{history}",
            lang = self.code_language,
            history = self.history,
        )
    }
}

/// Split a reply into explanation and the first fenced code block.
pub fn split_reply(text: &str) -> (String, String) {
    let Some(start) = text.find(FENCE) else {
        return (text.trim().to_string(), String::new());
    };
    let explanation = text[..start].trim().to_string();
    let after_fence = &text[start + FENCE.len()..];
    // Skip the language tag.
    let body = match after_fence.find('\n') {
        Some(newline) => &after_fence[newline + 1..],
        None => "",
    };
    let code = match body.find(FENCE) {
        Some(end) => &body[..end],
        None => body,
    };
    (explanation, code.trim_end().to_string())
}

#[async_trait]
impl CodeAgent for LlmCodeAgent {
    fn set_toolbox(&mut self, toolbox: Toolbox) {
        self.toolbox = toolbox;
    }

    fn set_history(&mut self, history: String) {
        self.history = history;
    }

    fn clear_cache(&mut self) {
        self.toolbox = Toolbox::new();
    }

    fn reset(&mut self) {
        self.conversation.clear();
    }

    async fn chat(&mut self, message: &str) -> Result<AgentReply, AgentError> {
        let mut messages = Vec::with_capacity(self.conversation.len() + 2);
        messages.push(Message::system(self.system_prompt()));
        messages.extend(self.conversation.iter().cloned());
        messages.push(Message::user(message));

        let response = self
            .provider
            .complete(ProviderRequest::new(&self.model, messages))
            .await?;
        let text = response.message.content;
        if text.trim().is_empty() {
            return Err(AgentError::EmptyReply(self.model.clone()));
        }

        let (explanation, code) = split_reply(&text);
        debug!(model = %self.model, tools = self.toolbox.len(), "Agent turn complete");
        self.conversation.push(Message::user(message));
        self.conversation.push(Message::assistant(text));

        let result = if code.is_empty() {
            Value::String(explanation.clone())
        } else {
            Value::String(code.clone())
        };
        Ok(AgentReply {
            explanation,
            code,
            result,
        })
    }
}

/// Builds [`LlmCodeAgent`]s on a shared provider.
pub struct LlmAgentFactory {
    provider: Option<Arc<dyn Provider>>,
    code_language: String,
    default_model: Option<String>,
}

impl LlmAgentFactory {
    pub fn new(provider: Option<Arc<dyn Provider>>, code_language: impl Into<String>) -> Self {
        Self {
            provider,
            code_language: code_language.into(),
            default_model: None,
        }
    }

    /// Model used when an assistant leaves `codeModel` blank.
    pub fn with_default_model(mut self, model: Option<String>) -> Self {
        self.default_model = model.filter(|m| !m.trim().is_empty());
        self
    }
}

impl AgentFactory for LlmAgentFactory {
    fn create(&self, code_model: &str) -> Result<Box<dyn CodeAgent>, AgentError> {
        let code_model = match (code_model.trim().is_empty(), &self.default_model) {
            (false, _) => code_model,
            (true, Some(default)) => default.as_str(),
            (true, None) => return Err(AgentError::UnknownModel(code_model.to_string())),
        };
        let provider = self
            .provider
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("no provider for code agents".into()))?;
        Ok(Box::new(LlmCodeAgent::new(provider, code_model, &self.code_language)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistants_core::{ProviderResponse, Role};
    use std::sync::Mutex;

    /// Replies with queued texts and records every request.
    struct ScriptedProvider {
        replies: Mutex<Vec<String>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
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
            let text = self.replies.lock().unwrap().pop().unwrap_or_default();
            Ok(ProviderResponse {
                message: Message::assistant(text),
                usage: None,
                model,
            })
        }
    }

    #[test]
    fn split_reply_takes_first_block() {
        let (explanation, code) = split_reply("I will add.\n```python\nx = 1 + 2\n```\nthen\n```python\nignored\n```");
        assert_eq!(explanation, "I will add.");
        assert_eq!(code, "x = 1 + 2");
    }

    #[test]
    fn split_reply_without_code() {
        assert_eq!(split_reply("  just text "), ("just text".to_string(), String::new()));
    }

    #[test]
    fn split_reply_unterminated_block() {
        let (_, code) = split_reply("go\n```\nprint(1)\n");
        assert_eq!(code, "print(1)");
    }

    #[tokio::test]
    async fn chat_keeps_conversation_until_reset() {
        let provider = Arc::new(ScriptedProvider::new(&["first\n```python\na()\n```", "second"]));
        let mut agent = LlmCodeAgent::new(provider.clone(), "gpt-test", "python");
        agent.set_history("Tools:\n- a: does a\n".into());

        let reply = agent.chat("do a").await.unwrap();
        assert_eq!(reply.code, "a()");
        assert_eq!(reply.result, Value::String("a()".into()));

        let reply = agent.chat("and again").await.unwrap();
        assert_eq!(reply.result, Value::String("second".into()));
        assert_eq!(agent.conversation().len(), 4);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].model, "gpt-test");
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert!(requests[0].messages[0].content.contains("- a: does a"));
        assert_eq!(requests[1].messages.len(), 4);
        drop(requests);

        agent.reset();
        assert!(agent.conversation().is_empty());
    }

    struct NamedTool;

    #[async_trait]
    impl assistants_core::Tool for NamedTool {
        fn description(&self) -> &str {
            "looks things up"
        }

        async fn call(&self, arguments: Value) -> Result<Value, assistants_core::ToolError> {
            Ok(arguments)
        }
    }

    #[tokio::test]
    async fn system_prompt_names_callable_tools() {
        let provider = Arc::new(ScriptedProvider::new(&["none", "still none"]));
        let mut agent = LlmCodeAgent::new(provider.clone(), "gpt-test", "python");
        agent.chat("hi").await.unwrap();

        let mut toolbox = Toolbox::new();
        toolbox.insert("lookup", Arc::new(NamedTool));
        agent.set_toolbox(toolbox);
        agent.chat("hi again").await.unwrap();

        let requests = provider.requests.lock().unwrap();
        assert!(requests[0].messages[0].content.contains("No tools are available."));
        assert!(requests[1].messages[0].content.contains("Callable tools: lookup."));
    }

    #[tokio::test]
    async fn empty_reply_is_an_error() {
        let mut agent = LlmCodeAgent::new(Arc::new(ScriptedProvider::new(&["   "])), "m", "python");
        assert!(matches!(agent.chat("hi").await, Err(AgentError::EmptyReply(_))));
    }

    #[test]
    fn factory_without_provider_fails() {
        let factory = LlmAgentFactory::new(None, "python");
        assert!(matches!(factory.create("gpt"), Err(AgentError::Provider(_))));
        let factory = LlmAgentFactory::new(Some(Arc::new(ScriptedProvider::new(&[]))), "python");
        assert!(factory.create("gpt").is_ok());
        assert!(matches!(factory.create(" "), Err(AgentError::UnknownModel(_))));
    }

    #[tokio::test]
    async fn blank_model_falls_back_to_default() {
        let provider = Arc::new(ScriptedProvider::new(&["ok"]));
        let factory =
            LlmAgentFactory::new(Some(provider.clone()), "python").with_default_model(Some("gpt-fallback".into()));
        let mut agent = factory.create("").unwrap();
        agent.chat("hi").await.unwrap();
        assert_eq!(provider.requests.lock().unwrap()[0].model, "gpt-fallback");

        let factory = LlmAgentFactory::new(Some(provider), "python").with_default_model(Some("  ".into()));
        assert!(matches!(factory.create(""), Err(AgentError::UnknownModel(_))));
    }
}
