//! # Assistants Assistant
//!
//! The Assistant resource kind and the runtime that wires every controller
//! together. An assistant binds a code agent to data streams: each inbound
//! message is formatted, answered with history assembled from example task
//! logs, recorded as a new TaskLog and echoed back to the stream.

pub mod agent;
pub mod assistant;
pub mod context;
pub mod filter;
pub mod history;
pub mod runtime;
pub mod spec;

pub use agent::{LlmAgentFactory, LlmCodeAgent, split_reply};
pub use assistant::{Assistant, AssistantHandlers, BoundStream, ChatOutcome};
pub use context::{AssistantContext, Conventions, TaskLogNames};
pub use filter::MessageFilter;
pub use history::{HistoryAssembler, tool_block};
pub use runtime::{Collaborators, KindStatus, Runtime, RuntimeOptions};
pub use spec::{AssistantSpec, StreamRefs};
