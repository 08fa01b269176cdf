//! Event-bus traits: resource change watches and data streams.
//!
//! A watch yields [`PendingOperation`]s. Each one must be settled with
//! exactly one verdict; [`PendingOperation::accept`] and
//! [`PendingOperation::reject`] consume the operation so the type system
//! enforces that. An operation dropped without a verdict is redelivered.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::TransportError;
use crate::resource::{KindRef, ResourceDocument, StoredResource};

/// Outcome reported back to the reconciliation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected,
}

/// One observed change to a named resource.
#[derive(Debug)]
pub struct PendingOperation {
    name: String,
    new_config: Option<ResourceDocument>,
    old_config: Option<ResourceDocument>,
    ack: oneshot::Sender<Verdict>,
}

impl PendingOperation {
    /// Create an operation and the receiver its verdict will arrive on.
    ///
    /// The receiver resolves to an error if the operation is dropped
    /// unsettled.
    pub fn new(
        name: impl Into<String>,
        new_config: Option<ResourceDocument>,
        old_config: Option<ResourceDocument>,
    ) -> (Self, oneshot::Receiver<Verdict>) {
        let (ack, verdict) = oneshot::channel();
        (
            Self {
                name: name.into(),
                new_config,
                old_config,
                ack,
            },
            verdict,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The incoming document; `None` means the resource was deleted.
    pub fn new_config(&self) -> Option<&ResourceDocument> {
        self.new_config.as_ref()
    }

    /// The previous document; `None` means the resource did not exist.
    pub fn old_config(&self) -> Option<&ResourceDocument> {
        self.old_config.as_ref()
    }

    pub fn accept(self) {
        self.settle(Verdict::Accepted);
    }

    pub fn reject(self) {
        self.settle(Verdict::Rejected);
    }

    pub fn settle(self, verdict: Verdict) {
        // The source may have stopped listening; nothing left to report to.
        let _ = self.ack.send(verdict);
    }
}

/// Cluster resource store with change notification.
#[async_trait]
pub trait ResourceBus: Send + Sync {
    /// Watch changes to every resource of `kind`.
    async fn subscribe_to_resource_changes(
        &self,
        cluster: &str,
        kind: &KindRef,
    ) -> Result<mpsc::Receiver<PendingOperation>, TransportError>;

    /// Every persisted resource of `kind`.
    async fn read_all_resources(
        &self,
        cluster: &str,
        kind: &KindRef,
    ) -> Result<Vec<StoredResource>, TransportError>;

    async fn read_resource(
        &self,
        cluster: &str,
        kind: &KindRef,
        name: &str,
    ) -> Result<Option<ResourceDocument>, TransportError>;

    /// Store a new resource. Fails if the name is taken.
    async fn create_resource(&self, cluster: &str, document: ResourceDocument) -> Result<(), TransportError>;

    /// Create or replace a resource. With `merge`, spec keys are merged into
    /// the existing spec instead of replacing it.
    async fn apply_resource(
        &self,
        cluster: &str,
        document: ResourceDocument,
        merge: bool,
    ) -> Result<(), TransportError>;
}

/// Pub/sub data streams carrying JSON payloads.
#[async_trait]
pub trait StreamBus: Send + Sync {
    async fn subscribe(&self, stream_id: &str) -> Result<mpsc::Receiver<serde_json::Value>, TransportError>;

    /// Publish a payload. With `sync`, return only once every current
    /// subscriber has received it.
    async fn publish(&self, stream_id: &str, payload: serde_json::Value, sync: bool) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accept_reports_verdict() {
        let (op, verdict) = PendingOperation::new("x", None, None);
        assert_eq!(op.name(), "x");
        assert!(op.new_config().is_none());
        op.accept();
        assert_eq!(verdict.await.unwrap(), Verdict::Accepted);
    }

    #[tokio::test]
    async fn dropped_operation_closes_verdict() {
        let (op, verdict) = PendingOperation::new("x", None, None);
        drop(op);
        assert!(verdict.await.is_err());
    }

    #[tokio::test]
    async fn reject_after_source_gone_is_silent() {
        let (op, verdict) = PendingOperation::new("x", None, None);
        drop(verdict);
        op.reject();
    }
}
