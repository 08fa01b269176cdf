//! # Assistants Core
//!
//! Domain types, traits, and error definitions for the assistants resource
//! runtime. Every collaborator (event bus, code agent, LLM provider, tool)
//! is a trait here; implementations live in their own crates.

pub mod agent;
pub mod bus;
pub mod error;
pub mod kinds;
pub mod message;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentFactory, AgentReply, CodeAgent};
pub use bus::{PendingOperation, ResourceBus, StreamBus, Verdict};
pub use error::{
    AgentError, BindingError, Error, ProviderError, ReferenceError, Result, ToolError, TransportError,
    ValidationError,
};
pub use kinds::{Prompt, StreamSpec, TaskLog, ToolDescriptions};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use resource::{KindRef, Metadata, ResourceDocument, ResourceKey, StoredResource};
pub use schema::{FieldSchema, SchemaResource};
pub use tool::{Tool, Toolbox};
