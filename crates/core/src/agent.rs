//! Conversational code agent abstraction.
//!
//! Given a toolbox and a history, an agent answers a message with an
//! explanation, the code it would run, and the end result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::tool::Toolbox;

/// Structured answer of one chat turn.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentReply {
    pub explanation: String,
    pub code: String,
    pub result: serde_json::Value,
}

/// A stateful code-writing agent.
#[async_trait]
pub trait CodeAgent: Send {
    fn set_toolbox(&mut self, toolbox: Toolbox);

    /// Conversation priming text prepended to every exchange.
    fn set_history(&mut self, history: String);

    /// Drop tools cached from a previous turn.
    fn clear_cache(&mut self);

    /// Forget the running conversation.
    fn reset(&mut self);

    async fn chat(&mut self, message: &str) -> Result<AgentReply, AgentError>;
}

/// Builds agents for a `codeModel` name.
pub trait AgentFactory: Send + Sync {
    fn create(&self, code_model: &str) -> Result<Box<dyn CodeAgent>, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_defaults_to_null_result() {
        let reply = AgentReply::default();
        assert!(reply.result.is_null());
        assert!(reply.code.is_empty());
    }
}
