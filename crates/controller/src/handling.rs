//! How a controller turns documents into live objects.
//!
//! Plain data kinds are [`ControllerKind::SchemaBacked`]: the spec is
//! checked against a field schema, deserialized and converted, and an
//! update replaces the stored object. Kinds whose objects own running
//! tasks are [`ControllerKind::Custom`]: creation, reconfiguration and
//! teardown are delegated to [`ResourceHandlers`], and an update mutates
//! the existing object so outstanding handles stay valid.

use async_trait::async_trait;
use std::sync::Arc;

use assistants_core::{Error, FieldSchema, ResourceDocument, SchemaResource, ValidationError};

/// Lifecycle hooks for kinds with live behavior.
#[async_trait]
pub trait ResourceHandlers<R: ?Sized + Send + Sync + 'static>: Send + Sync {
    /// Build a new object. `Ok(None)` declines the document.
    async fn create(&self, name: &str, document: &ResourceDocument) -> Result<Option<Arc<R>>, Error>;

    /// Reconfigure an existing object in place. An error leaves it unchanged.
    async fn update(&self, current: &Arc<R>, document: &ResourceDocument) -> Result<(), Error>;

    /// Teardown after the object left the table.
    async fn delete(&self, _resource: Arc<R>) {}
}

/// Validation plus conversion for a plain data kind.
pub struct SchemaBacked<R: ?Sized> {
    fields: Option<FieldSchema>,
    build: Box<dyn Fn(&ResourceDocument) -> Result<Arc<R>, ValidationError> + Send + Sync>,
}

impl<R: ?Sized + 'static> SchemaBacked<R> {
    /// Validate against `T::FIELDS`, deserialize into `T`, then convert.
    pub fn typed<T, F>(into: F) -> Self
    where
        T: SchemaResource,
        F: Fn(T) -> Result<Arc<R>, ValidationError> + Send + Sync + 'static,
    {
        Self {
            fields: Some(T::FIELDS),
            build: Box::new(move |document: &ResourceDocument| {
                document.spec_object()?;
                into(T::from_spec(&document.kind, &document.spec)?)
            }),
        }
    }

    /// Accept any spec mapping.
    pub fn untyped<F>(build: F) -> Self
    where
        F: Fn(&serde_json::Map<String, serde_json::Value>) -> Result<Arc<R>, ValidationError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            fields: None,
            build: Box::new(move |document: &ResourceDocument| build(document.spec_object()?)),
        }
    }

    /// The declared schema, if the kind has one.
    pub fn fields(&self) -> Option<&FieldSchema> {
        self.fields.as_ref()
    }

    pub fn build(&self, document: &ResourceDocument) -> Result<Arc<R>, ValidationError> {
        (self.build)(document)
    }
}

/// Chosen once when the controller is built.
pub enum ControllerKind<R: ?Sized + Send + Sync + 'static> {
    SchemaBacked(SchemaBacked<R>),
    Custom(Arc<dyn ResourceHandlers<R>>),
}

impl<R: ?Sized + Send + Sync + 'static> ControllerKind<R> {
    pub fn is_custom(&self) -> bool {
        matches!(self, ControllerKind::Custom(_))
    }
}

impl<R: ?Sized + Send + Sync + 'static> std::fmt::Debug for ControllerKind<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerKind::SchemaBacked(schema) => f
                .debug_tuple("SchemaBacked")
                .field(&schema.fields)
                .finish(),
            ControllerKind::Custom(_) => f.write_str("Custom"),
        }
    }
}
