//! Error types for the assistants domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the reconciliation loop
//! decides per context whether an error rejects an operation, is skipped,
//! or is only logged.

use thiserror::Error;

/// The top-level error type for all assistants operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Resource validation (reject, no state change) ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Dangling references (skip and continue) ---
    #[error("Reference error: {0}")]
    Reference(#[from] ReferenceError),

    // --- Immutable field changes (fail the reconfigure) ---
    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    // --- Bus / stream delivery ---
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Agent errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A resource document is malformed or incomplete.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{kind}/{name}: config is missing required key: spec")]
    MissingSpec { kind: String, name: String },

    #[error("{kind}: spec is missing required keys: {}", .fields.join(", "))]
    MissingFields { kind: String, fields: Vec<String> },

    #[error("{kind}: spec contains extraneous keys: {}", .fields.join(", "))]
    ExtraneousFields { kind: String, fields: Vec<String> },

    #[error("{kind}: invalid field '{field}': {reason}")]
    InvalidField {
        kind: String,
        field: String,
        reason: String,
    },

    #[error("{kind}: spec could not be read: {reason}")]
    InvalidSpec { kind: String, reason: String },

    #[error("expected {expected}, got {actual}")]
    WrongKind { expected: String, actual: String },

    #[error("invalid resource path '{0}': expected group/version/kind/name")]
    InvalidPath(String),

    #[error("invalid apiVersion '{0}': expected group/version")]
    InvalidApiVersion(String),

    #[error("{kind}/{name}: resource factory declined the config")]
    Declined { kind: String, name: String },
}

/// A reference to another resource could not be resolved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReferenceError {
    #[error("missing {kind}: {reference}")]
    Missing { kind: String, reference: String },

    #[error("malformed reference '{0}'")]
    Malformed(String),
}

/// An attempt to change a field that is fixed at creation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("cannot change '{field}' after initialization ({current} -> {requested})")]
    Immutable {
        field: String,
        current: String,
        requested: String,
    },
}

/// Failures talking to the event bus or a data stream.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("delivery to {target} failed: {reason}")]
    DeliveryFailed { target: String, reason: String },

    #[error("subscription closed: {0}")]
    Closed(String),

    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool request failed: {0}")]
    Request(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Unknown code model: {0}")]
    UnknownModel(String),

    #[error("Agent produced no answer: {0}")]
    EmptyReply(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Tool(#[from] ToolError),
}
