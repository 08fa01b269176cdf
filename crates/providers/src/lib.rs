//! LLM provider implementations.
//!
//! All providers implement the `assistants_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
