//! In-process event bus and manifest loading.

pub mod loader;
pub mod memory;

pub use loader::{load_manifests, parse_manifest, seed, LoadError};
pub use memory::{merge_values, InMemoryBus};
