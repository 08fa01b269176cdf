//! In-process event bus.
//!
//! Resources are stored per `(cluster, kind)`. Every watch gets its own
//! delivery task that hands out one [`PendingOperation`] at a time and waits
//! for its verdict; an operation dropped without a verdict is delivered
//! again. Data streams fan out each payload to every live subscriber.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use assistants_core::bus::{PendingOperation, ResourceBus, StreamBus};
use assistants_core::error::TransportError;
use assistants_core::resource::{KindRef, ResourceDocument, StoredResource};

type TableKey = (String, KindRef);

#[derive(Debug, Clone)]
struct Change {
    name: String,
    new_config: Option<ResourceDocument>,
    old_config: Option<ResourceDocument>,
}

struct Inner {
    resources: RwLock<HashMap<TableKey, BTreeMap<String, ResourceDocument>>>,
    watchers: RwLock<HashMap<TableKey, Vec<mpsc::UnboundedSender<Change>>>>,
    streams: RwLock<HashMap<String, Vec<mpsc::Sender<Value>>>>,
    stream_buffer: usize,
}

/// Resource store plus pub/sub streams, all in memory.
#[derive(Clone)]
pub struct InMemoryBus {
    inner: Arc<Inner>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::with_stream_buffer(64)
    }

    /// `stream_buffer` bounds each stream subscriber's queue.
    pub fn with_stream_buffer(stream_buffer: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                resources: RwLock::new(HashMap::new()),
                watchers: RwLock::new(HashMap::new()),
                streams: RwLock::new(HashMap::new()),
                stream_buffer: stream_buffer.max(1),
            }),
        }
    }

    /// Delete a resource. Returns whether it existed.
    pub async fn delete_resource(&self, cluster: &str, kind: &KindRef, name: &str) -> Result<bool, TransportError> {
        let key = (cluster.to_string(), kind.clone());
        let old = self
            .inner
            .resources
            .write()
            .get_mut(&key)
            .and_then(|table| table.remove(name));
        let existed = old.is_some();
        if existed {
            self.notify(
                &key,
                Change {
                    name: name.to_string(),
                    new_config: None,
                    old_config: old,
                },
            );
        }
        Ok(existed)
    }

    /// Number of live subscribers on a stream.
    pub fn subscriber_count(&self, stream_id: &str) -> usize {
        self.inner
            .streams
            .read()
            .get(stream_id)
            .map(|senders| senders.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }

    fn notify(&self, key: &TableKey, change: Change) {
        let mut watchers = self.inner.watchers.write();
        if let Some(senders) = watchers.get_mut(key) {
            senders.retain(|sender| sender.send(change.clone()).is_ok());
        }
    }

    fn store(&self, cluster: &str, document: ResourceDocument, exclusive: bool, merge: bool) -> Result<(), TransportError> {
        let kind = document.kind_ref().map_err(|e| TransportError::DeliveryFailed {
            target: document.kind.clone(),
            reason: e.to_string(),
        })?;
        let key = (cluster.to_string(), kind);
        let name = document.name().to_string();

        let change = {
            let mut resources = self.inner.resources.write();
            let table = resources.entry(key.clone()).or_default();
            let old = table.get(&name).cloned();
            if exclusive && old.is_some() {
                return Err(TransportError::AlreadyExists(key.1.key(&name).to_string()));
            }
            let new = match (&old, merge) {
                (Some(old), true) => {
                    let mut merged = document.clone();
                    merged.spec = merge_values(old.spec.clone(), document.spec);
                    merged
                }
                _ => document,
            };
            if old.as_ref() == Some(&new) {
                debug!(kind = %key.1.kind, name = %name, "Resource unchanged");
                return Ok(());
            }
            table.insert(name.clone(), new.clone());
            Change {
                name,
                new_config: Some(new),
                old_config: old,
            }
        };
        self.notify(&key, change);
        Ok(())
    }
}

/// Recursively merge `patch` into `base`; mappings merge, anything else
/// replaces.
pub fn merge_values(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            for (key, value) in patch {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, patch) => patch,
    }
}

/// Hand changes to the watcher one at a time, redelivering unsettled ones.
async fn deliver(mut changes: mpsc::UnboundedReceiver<Change>, operations: mpsc::Sender<PendingOperation>) {
    while let Some(change) = changes.recv().await {
        loop {
            let (op, verdict) = PendingOperation::new(
                change.name.clone(),
                change.new_config.clone(),
                change.old_config.clone(),
            );
            if operations.send(op).await.is_err() {
                return;
            }
            match verdict.await {
                Ok(verdict) => {
                    debug!(name = %change.name, ?verdict, "Operation settled");
                    break;
                }
                Err(_) => warn!(name = %change.name, "Operation dropped without verdict, redelivering"),
            }
        }
    }
}

#[async_trait]
impl ResourceBus for InMemoryBus {
    async fn subscribe_to_resource_changes(
        &self,
        cluster: &str,
        kind: &KindRef,
    ) -> Result<mpsc::Receiver<PendingOperation>, TransportError> {
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        let (op_tx, op_rx) = mpsc::channel(1);
        self.inner
            .watchers
            .write()
            .entry((cluster.to_string(), kind.clone()))
            .or_default()
            .push(change_tx);
        tokio::spawn(deliver(change_rx, op_tx));
        Ok(op_rx)
    }

    async fn read_all_resources(&self, cluster: &str, kind: &KindRef) -> Result<Vec<StoredResource>, TransportError> {
        let resources = self.inner.resources.read();
        Ok(resources
            .get(&(cluster.to_string(), kind.clone()))
            .map(|table| {
                table
                    .iter()
                    .map(|(name, config)| StoredResource {
                        name: name.clone(),
                        config: config.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn read_resource(
        &self,
        cluster: &str,
        kind: &KindRef,
        name: &str,
    ) -> Result<Option<ResourceDocument>, TransportError> {
        Ok(self
            .inner
            .resources
            .read()
            .get(&(cluster.to_string(), kind.clone()))
            .and_then(|table| table.get(name).cloned()))
    }

    async fn create_resource(&self, cluster: &str, document: ResourceDocument) -> Result<(), TransportError> {
        self.store(cluster, document, true, false)
    }

    async fn apply_resource(&self, cluster: &str, document: ResourceDocument, merge: bool) -> Result<(), TransportError> {
        self.store(cluster, document, false, merge)
    }
}

#[async_trait]
impl StreamBus for InMemoryBus {
    async fn subscribe(&self, stream_id: &str) -> Result<mpsc::Receiver<Value>, TransportError> {
        let (tx, rx) = mpsc::channel(self.inner.stream_buffer);
        self.inner
            .streams
            .write()
            .entry(stream_id.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }

    async fn publish(&self, stream_id: &str, payload: Value, sync: bool) -> Result<(), TransportError> {
        let senders: Vec<mpsc::Sender<Value>> = {
            let mut streams = self.inner.streams.write();
            match streams.get_mut(stream_id) {
                Some(senders) => {
                    senders.retain(|s| !s.is_closed());
                    senders.clone()
                }
                None => Vec::new(),
            }
        };
        if senders.is_empty() {
            debug!(stream = %stream_id, "No subscribers");
            return Ok(());
        }

        for sender in senders {
            if sync {
                if sender.send(payload.clone()).await.is_err() {
                    debug!(stream = %stream_id, "Subscriber went away");
                }
                continue;
            }
            match sender.try_send(payload.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(payload)) => {
                    tokio::spawn(async move {
                        let _ = sender.send(payload).await;
                    });
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(stream = %stream_id, "Subscriber went away");
                }
            }
        }
        Ok(())
    }
}
