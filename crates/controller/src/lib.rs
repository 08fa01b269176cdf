//! # Assistants Controller
//!
//! The resource reconciliation engine: one [`ResourceController`] per kind
//! consumes pending operations and owns the live objects, and any number
//! of [`ResourceSet`]s aggregate controllers into cluster-wide lookup
//! tables keyed by `group/version/kind/name`.

pub mod controller;
pub mod handling;
pub mod set;

pub use controller::ResourceController;
pub use handling::{ControllerKind, ResourceHandlers, SchemaBacked};
pub use set::ResourceSet;
