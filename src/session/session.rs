//! The session dispatcher.
//!
//! A [`Session`] owns the operator's selection and one worker task per placed
//! instance. Calls for an instance are routed to its worker and answered over
//! a oneshot channel once the worker has applied them. Different instances are
//! processed concurrently; calls for a single instance are strictly serialized.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use crate::cascade::{CascadeResolver, FetchRequest, InstanceState, UpdateOutcome};
use crate::catalog::{RequirementCatalog, RuleTable};
use crate::graph::{self, ProvisioningPlan, SelectionSet, Violations};
use crate::inventory::InventoryClient;
use crate::provision::{ProvisionError, ProvisioningExecutor, provision_if_valid};
use crate::types::{FieldName, FieldValue, InstanceId, ModuleType};

use super::config::SessionConfig;
use super::message::{SessionEvent, WorkerMessage};
use super::worker::InstanceWorker;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no instance {0} in this session")]
    UnknownInstance(InstanceId),

    #[error("module type {0} is not in the catalog")]
    UnknownModuleType(ModuleType),

    /// The worker stopped before answering.
    #[error("worker for instance {0} is no longer running")]
    ChannelClosed(InstanceId),

    #[error("session has been shut down")]
    ShutDown,
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Per-instance worker handle.
struct WorkerHandle {
    tx: mpsc::Sender<WorkerMessage>,
    task: JoinHandle<()>,
    cancel: CancellationToken,
}

/// A configuration session: the selection plus a live worker per instance.
pub struct Session<C> {
    config: SessionConfig,
    catalog: Arc<RequirementCatalog>,
    resolver: CascadeResolver,
    client: Arc<C>,

    /// Active workers, keyed by instance.
    workers: RwLock<HashMap<InstanceId, WorkerHandle>>,

    /// Selected instances in placement order.
    selection: RwLock<SelectionSet>,

    next_id: AtomicU64,
    events: broadcast::Sender<SessionEvent>,

    /// Parent of every worker's cancellation token.
    shutdown: CancellationToken,
}

impl<C: InventoryClient> Session<C> {
    pub fn new(
        config: SessionConfig,
        catalog: RequirementCatalog,
        rules: RuleTable,
        client: Arc<C>,
    ) -> Self {
        info!(
            modules = catalog.len(),
            rules = rules.rules().len(),
            "Creating session"
        );

        let resolver = CascadeResolver::new(Arc::new(rules))
            .with_default_sentinel(config.default_sentinel.clone());
        let (events, _) = broadcast::channel(config.event_buffer.max(1));

        Session {
            config,
            catalog: Arc::new(catalog),
            resolver,
            client,
            workers: RwLock::new(HashMap::new()),
            selection: RwLock::new(SelectionSet::new()),
            next_id: AtomicU64::new(1),
            events,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &RequirementCatalog {
        &self.catalog
    }

    /// Places a new instance of `module_type` and starts its worker.
    ///
    /// The worker requests the type's root option sources immediately.
    #[instrument(skip_all)]
    pub async fn add_instance(&self, module_type: impl Into<ModuleType>) -> Result<InstanceId> {
        if self.shutdown.is_cancelled() {
            return Err(SessionError::ShutDown);
        }
        let module_type = module_type.into();
        if !self.catalog.contains(&module_type) {
            return Err(SessionError::UnknownModuleType(module_type));
        }

        let id = InstanceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let worker = InstanceWorker::new(
            InstanceState::new(id, module_type.clone()),
            self.resolver.clone(),
            Arc::clone(&self.client),
            self.config.fetch_timeout,
            self.config.retry,
            self.events.clone(),
        );

        let (tx, rx) = mpsc::channel(self.config.channel_buffer.max(1));
        let cancel = self.shutdown.child_token();
        let task = tokio::spawn(worker.run(rx, tx.downgrade(), cancel.clone()));

        let mut workers = self.workers.write().await;
        workers.insert(id, WorkerHandle { tx, task, cancel });
        self.selection.write().await.add(id, module_type.clone());

        debug!(instance = %id, %module_type, "Instance added");
        Ok(id)
    }

    /// Removes an instance, discarding its configuration and cancelling its
    /// in-flight fetches.
    #[instrument(skip(self), fields(instance = %id))]
    pub async fn remove_instance(&self, id: InstanceId) -> Result<()> {
        let mut workers = self.workers.write().await;
        let handle = workers.remove(&id).ok_or(SessionError::UnknownInstance(id))?;
        self.selection.write().await.remove(id);
        drop(workers);

        handle.cancel.cancel();
        let _ = handle.tx.try_send(WorkerMessage::Shutdown);
        debug!("Instance removed");
        Ok(())
    }

    /// Writes a field of an instance and cascades.
    ///
    /// Returns once the worker has applied the write; the cleared fields and
    /// dispatched fetches are in the outcome.
    #[instrument(skip(self, field, value), fields(instance = %id))]
    pub async fn update(
        &self,
        id: InstanceId,
        field: impl Into<FieldName>,
        value: impl Into<FieldValue>,
    ) -> Result<UpdateOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(
            id,
            WorkerMessage::Update {
                field: field.into(),
                value: value.into(),
                reply,
            },
        )
        .await?;
        rx.await.map_err(|_| SessionError::ChannelClosed(id))
    }

    /// Re-requests a field's options. `None` if the field has no source or its
    /// trigger has no usable value.
    #[instrument(skip(self, field), fields(instance = %id))]
    pub async fn refresh(
        &self,
        id: InstanceId,
        field: impl Into<FieldName>,
    ) -> Result<Option<FetchRequest>> {
        let (reply, rx) = oneshot::channel();
        self.send(
            id,
            WorkerMessage::Refresh {
                field: field.into(),
                reply,
            },
        )
        .await?;
        rx.await.map_err(|_| SessionError::ChannelClosed(id))
    }

    /// A snapshot of the instance's configuration and option sets.
    pub async fn view(&self, id: InstanceId) -> Result<InstanceState> {
        let (reply, rx) = oneshot::channel();
        self.send(id, WorkerMessage::Snapshot(reply)).await?;
        rx.await.map_err(|_| SessionError::ChannelClosed(id))
    }

    pub async fn selection(&self) -> SelectionSet {
        self.selection.read().await.clone()
    }

    pub async fn instance_count(&self) -> usize {
        self.workers.read().await.len()
    }

    /// Validates the current selection against the catalog.
    pub async fn resolve(&self) -> std::result::Result<ProvisioningPlan, Violations> {
        let selection = self.selection.read().await;
        graph::resolve(&selection, &self.catalog)
    }

    /// Validates the current selection and, if it passes, runs `executor` on
    /// the plan.
    pub async fn provision<X: ProvisioningExecutor>(
        &self,
        executor: &X,
    ) -> std::result::Result<ProvisioningPlan, ProvisionError<X::Error>> {
        let selection = self.selection().await;
        provision_if_valid(&selection, &self.catalog, executor).await
    }

    /// Subscribes to option set events from every instance.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stops every worker and waits for them to exit.
    pub async fn shutdown(&self) {
        info!("Shutting down session");
        self.shutdown.cancel();

        let handles: Vec<_> = self.workers.write().await.drain().collect();
        for (id, handle) in handles {
            trace!(instance = %id, "Waiting for worker");
            let _ = handle.tx.try_send(WorkerMessage::Shutdown);
            let _ = handle.task.await;
        }
    }

    async fn send(&self, id: InstanceId, msg: WorkerMessage) -> Result<()> {
        let tx = {
            let workers = self.workers.read().await;
            let handle = workers.get(&id).ok_or(SessionError::UnknownInstance(id))?;
            handle.tx.clone()
        };
        tx.send(msg)
            .await
            .map_err(|_| SessionError::ChannelClosed(id))
    }
}

impl<C> Drop for Session<C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
