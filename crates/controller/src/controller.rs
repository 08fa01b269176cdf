//! Per-kind reconciliation state machine.
//!
//! Each name is either absent or present. Operations are applied strictly
//! in arrival order; a failing operation is rejected and leaves the table
//! untouched, and the loop moves on to the next one.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use assistants_core::{
    Error, KindRef, PendingOperation, ResourceBus, ResourceDocument, ResourceKey, TransportError,
    ValidationError, Verdict,
};

use crate::handling::ControllerKind;
use crate::set::ResourceSet;

struct State<R: ?Sized> {
    resources: HashMap<String, Arc<R>>,
    applied: HashMap<String, ResourceDocument>,
    parents: Vec<ResourceSet<R>>,
}

/// Owns the authoritative name → object table for one resource kind.
pub struct ResourceController<R: ?Sized + Send + Sync + 'static> {
    cluster: String,
    kind: KindRef,
    handling: ControllerKind<R>,
    state: RwLock<State<R>>,
    // Serializes apply/remove across the watch loop and in-process callers.
    serial: Mutex<()>,
}

impl<R: ?Sized + Send + Sync + 'static> ResourceController<R> {
    pub fn new(cluster: impl Into<String>, kind: KindRef, handling: ControllerKind<R>) -> Self {
        Self {
            cluster: cluster.into(),
            kind,
            handling,
            state: RwLock::new(State {
                resources: HashMap::new(),
                applied: HashMap::new(),
                parents: Vec::new(),
            }),
            serial: Mutex::new(()),
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn kind(&self) -> &KindRef {
        &self.kind
    }

    pub fn handling(&self) -> &ControllerKind<R> {
        &self.handling
    }

    pub fn key(&self, name: &str) -> ResourceKey {
        self.kind.key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<R>> {
        self.state.read().resources.get(name).cloned()
    }

    /// The last document applied for a present name.
    pub fn document(&self, name: &str) -> Option<ResourceDocument> {
        self.state.read().applied.get(name).cloned()
    }

    /// Sorted names of present resources.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().resources.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.state.read().resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().resources.is_empty()
    }

    /// Add a parent set and replay the current table into it.
    pub(crate) fn attach_parent(&self, parent: ResourceSet<R>) {
        let mut state = self.state.write();
        for (name, resource) in &state.resources {
            parent.insert(self.kind.key(name).to_string(), Arc::clone(resource));
        }
        state.parents.push(parent);
    }

    /// Create or update `name` from `document`.
    ///
    /// Re-applying the document already in effect returns the existing
    /// object untouched.
    pub async fn apply(&self, name: &str, document: &ResourceDocument) -> Result<Arc<R>, Error> {
        let _serial = self.serial.lock().await;

        let kind = document.kind_ref()?;
        if kind != self.kind {
            return Err(ValidationError::WrongKind {
                expected: self.kind.to_string(),
                actual: kind.to_string(),
            }
            .into());
        }
        if document.name() != name {
            return Err(ValidationError::InvalidField {
                kind: self.kind.kind.clone(),
                field: "metadata.name".into(),
                reason: format!("'{}' does not match operation name '{}'", document.name(), name),
            }
            .into());
        }

        let current = {
            let state = self.state.read();
            match state.resources.get(name) {
                Some(existing) if state.applied.get(name) == Some(document) => {
                    debug!(kind = %self.kind.kind, name = %name, "Config unchanged");
                    return Ok(Arc::clone(existing));
                }
                existing => existing.cloned(),
            }
        };

        match current {
            None => {
                let resource = match &self.handling {
                    ControllerKind::SchemaBacked(schema) => schema.build(document)?,
                    ControllerKind::Custom(handlers) => handlers
                        .create(name, document)
                        .await?
                        .ok_or_else(|| ValidationError::Declined {
                            kind: self.kind.kind.clone(),
                            name: name.to_string(),
                        })?,
                };
                self.insert(name, Arc::clone(&resource), document.clone());
                info!(kind = %self.kind.kind, name = %name, "Created");
                Ok(resource)
            }
            Some(existing) => {
                let resource = match &self.handling {
                    ControllerKind::SchemaBacked(schema) => schema.build(document)?,
                    ControllerKind::Custom(handlers) => {
                        handlers.update(&existing, document).await?;
                        existing
                    }
                };
                self.insert(name, Arc::clone(&resource), document.clone());
                info!(kind = %self.kind.kind, name = %name, "Reconfigured");
                Ok(resource)
            }
        }
    }

    /// Delete `name`, running the teardown hook. Deleting an absent name is
    /// a no-op.
    pub async fn remove(&self, name: &str) -> Option<Arc<R>> {
        let _serial = self.serial.lock().await;

        let removed = {
            let mut state = self.state.write();
            state.applied.remove(name);
            let removed = state.resources.remove(name);
            if removed.is_some() {
                let key = self.kind.key(name).to_string();
                for parent in &state.parents {
                    parent.remove(&key);
                }
            }
            removed
        };

        match &removed {
            Some(resource) => {
                if let ControllerKind::Custom(handlers) = &self.handling {
                    handlers.delete(Arc::clone(resource)).await;
                }
                info!(kind = %self.kind.kind, name = %name, "Deleted");
            }
            None => debug!(kind = %self.kind.kind, name = %name, "Delete of absent resource"),
        }
        removed
    }

    /// Apply one operation and settle it.
    pub async fn reconcile(&self, op: PendingOperation) -> Verdict {
        let verdict = match op.new_config().cloned() {
            None => {
                self.remove(op.name()).await;
                Verdict::Accepted
            }
            Some(document) => match self.apply(op.name(), &document).await {
                Ok(_) => Verdict::Accepted,
                Err(e) => {
                    warn!(kind = %self.kind.kind, name = %op.name(), error = %e, "Rejected");
                    Verdict::Rejected
                }
            },
        };
        op.settle(verdict);
        verdict
    }

    /// Replay every persisted resource of this kind. Returns how many
    /// loaded.
    pub async fn load_existing(&self, bus: &dyn ResourceBus) -> Result<usize, TransportError> {
        let stored = bus.read_all_resources(&self.cluster, &self.kind).await?;
        let mut loaded = 0;
        for resource in stored {
            match self.apply(&resource.name, &resource.config).await {
                Ok(_) => loaded += 1,
                Err(e) => warn!(
                    kind = %self.kind.kind,
                    name = %resource.name,
                    error = %e,
                    "Failed to load resource"
                ),
            }
        }
        Ok(loaded)
    }

    /// Process operations until the watch closes.
    pub async fn run(&self, mut operations: mpsc::Receiver<PendingOperation>) {
        while let Some(op) = operations.recv().await {
            self.reconcile(op).await;
        }
        info!(kind = %self.kind.kind, "Resource watch closed");
    }

    /// Subscribe, bulk-load, then serve the watch on its own task.
    pub async fn start(self: Arc<Self>, bus: Arc<dyn ResourceBus>) -> Result<JoinHandle<()>, TransportError> {
        let operations = bus.subscribe_to_resource_changes(&self.cluster, &self.kind).await?;
        let loaded = self.load_existing(bus.as_ref()).await?;
        info!(
            cluster = %self.cluster,
            kind = %self.kind,
            loaded,
            "Started resource controller"
        );
        Ok(tokio::spawn(async move { self.run(operations).await }))
    }

    fn insert(&self, name: &str, resource: Arc<R>, document: ResourceDocument) {
        let mut state = self.state.write();
        let key = self.kind.key(name).to_string();
        for parent in &state.parents {
            parent.insert(key.clone(), Arc::clone(&resource));
        }
        state.resources.insert(name.to_string(), resource);
        state.applied.insert(name.to_string(), document);
    }
}

impl<R: ?Sized + Send + Sync + 'static> std::fmt::Debug for ResourceController<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceController")
            .field("cluster", &self.cluster)
            .field("kind", &self.kind)
            .field("handling", &self.handling)
            .finish()
    }
}
