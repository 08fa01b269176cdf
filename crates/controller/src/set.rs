//! Cross-kind lookup tables fed by controllers.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use assistants_core::{KindRef, ReferenceError, ResourceKey};

use crate::controller::ResourceController;

/// Fully-qualified name → resource, aggregated from any number of
/// controllers.
///
/// Only registered controllers mutate a set. Entries are `Arc` aliases of
/// the controllers' own objects.
pub struct ResourceSet<R: ?Sized> {
    resources: Arc<RwLock<HashMap<String, Arc<R>>>>,
}

impl<R: ?Sized> Clone for ResourceSet<R> {
    fn clone(&self) -> Self {
        Self {
            resources: Arc::clone(&self.resources),
        }
    }
}

impl<R: ?Sized> Default for ResourceSet<R> {
    fn default() -> Self {
        Self {
            resources: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<R: ?Sized + Send + Sync + 'static> ResourceSet<R> {
    /// Mirror a controller's table into this set, now and on every future
    /// add or remove.
    pub fn register(&self, controller: &ResourceController<R>) {
        controller.attach_parent(self.clone());
    }
}

impl<R: ?Sized> ResourceSet<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up by fully-qualified name (`group/version/kind/name`).
    pub fn get(&self, name: &str) -> Option<Arc<R>> {
        self.resources.read().get(name).cloned()
    }

    pub fn get_key(&self, key: &ResourceKey) -> Option<Arc<R>> {
        self.get(&key.to_string())
    }

    /// Expand an abbreviated reference against `defaults` and look it up.
    pub fn resolve(&self, reference: &str, defaults: &KindRef) -> Result<(ResourceKey, Arc<R>), ReferenceError> {
        let key = ResourceKey::expand(reference, defaults)?;
        match self.get_key(&key) {
            Some(resource) => Ok((key, resource)),
            None => Err(ReferenceError::Missing {
                kind: key.kind.clone(),
                reference: reference.to_string(),
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.read().contains_key(name)
    }

    /// Sorted fully-qualified names.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.resources.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    pub(crate) fn insert(&self, key: String, resource: Arc<R>) {
        self.resources.write().insert(key, resource);
    }

    pub(crate) fn remove(&self, key: &str) {
        self.resources.write().remove(key);
    }
}

impl<R: ?Sized> std::fmt::Debug for ResourceSet<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSet").field("keys", &self.keys()).finish()
    }
}
