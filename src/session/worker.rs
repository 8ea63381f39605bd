//! Per-instance event loop.
//!
//! Each placed module instance gets a dedicated worker task that owns its
//! [`InstanceState`] and processes messages serially. Instances run
//! concurrently with each other.
//!
//! # Fetch dispatch
//!
//! Every [`FetchRequest`] produced by the resolver is spawned as its own task
//! with a child [`CancellationToken`]. The task runs the inventory call under
//! the configured timeout and retry policy and posts the result back to the
//! worker's mailbox, where the resolver decides whether it still applies.
//! Invalidating a field cancels its in-flight fetch; a result that slips
//! through anyway is discarded by tag. A fetch that panics is reported as a
//! transient failure so the option set never stays loading.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::cascade::{CascadeResolver, FetchOutcome, FetchRequest, InstanceState, UpdateOutcome};
use crate::inventory::{FetchFailure, InventoryClient, RetryConfig, RetryPolicy, retry_with_backoff};
use crate::types::{FieldName, OptionItem};

use super::message::{SessionEvent, WorkerMessage};

/// State and resources for one instance.
pub(crate) struct InstanceWorker<C> {
    state: InstanceState,
    resolver: CascadeResolver,
    client: Arc<C>,
    fetch_timeout: Duration,
    retry: RetryConfig,

    /// Cancellation tokens for in-flight fetches, keyed by field.
    inflight: HashMap<FieldName, CancellationToken>,

    events: broadcast::Sender<SessionEvent>,
}

impl<C: InventoryClient> InstanceWorker<C> {
    pub(crate) fn new(
        state: InstanceState,
        resolver: CascadeResolver,
        client: Arc<C>,
        fetch_timeout: Duration,
        retry: RetryConfig,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        InstanceWorker {
            state,
            resolver,
            client,
            fetch_timeout,
            retry,
            inflight: HashMap::new(),
            events,
        }
    }

    /// Runs the event loop until shutdown.
    ///
    /// Root option sources are requested before the first message is read.
    /// `mailbox` is a weak handle on the worker's own channel, used by fetch
    /// tasks to post results without keeping the channel open.
    #[instrument(skip_all, fields(instance = %self.state.id(), module_type = %self.state.module_type()))]
    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::Receiver<WorkerMessage>,
        mailbox: mpsc::WeakSender<WorkerMessage>,
        shutdown: CancellationToken,
    ) {
        info!("Instance worker started");

        let primed = self.resolver.prime(&mut self.state);
        for request in primed {
            self.dispatch(request, &mailbox, &shutdown);
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping instance worker");
                    break;
                }

                msg = rx.recv() => {
                    match msg {
                        Some(WorkerMessage::Shutdown) => {
                            info!("Shutdown message received");
                            break;
                        }
                        Some(msg) => self.handle_message(msg, &mailbox, &shutdown),
                        None => {
                            info!("Message channel closed");
                            break;
                        }
                    }
                }
            }
        }

        for (_, token) in self.inflight.drain() {
            token.cancel();
        }
        info!("Instance worker stopped");
    }

    fn handle_message(
        &mut self,
        msg: WorkerMessage,
        mailbox: &mpsc::WeakSender<WorkerMessage>,
        shutdown: &CancellationToken,
    ) {
        match msg {
            WorkerMessage::Update {
                field,
                value,
                reply,
            } => {
                let outcome = self.resolver.update(&mut self.state, field, value);
                self.apply(&outcome, mailbox, shutdown);
                let _ = reply.send(outcome);
            }
            WorkerMessage::Refresh { field, reply } => {
                let request = self.resolver.refresh(&mut self.state, &field);
                if let Some(request) = &request {
                    self.dispatch(request.clone(), mailbox, shutdown);
                }
                let _ = reply.send(request);
            }
            WorkerMessage::FetchCompleted { request, result } => {
                self.handle_fetch_completed(request, result, mailbox, shutdown);
            }
            WorkerMessage::Snapshot(reply) => {
                let _ = reply.send(self.state.clone());
            }
            WorkerMessage::Shutdown => {}
        }
    }

    /// Cancels fetches for every invalidated field, then dispatches the new
    /// requests.
    fn apply(
        &mut self,
        outcome: &UpdateOutcome,
        mailbox: &mpsc::WeakSender<WorkerMessage>,
        shutdown: &CancellationToken,
    ) {
        for field in &outcome.invalidated {
            if let Some(token) = self.inflight.remove(field) {
                trace!(%field, "cancelling in-flight fetch");
                token.cancel();
            }
        }
        for request in &outcome.fetches {
            self.dispatch(request.clone(), mailbox, shutdown);
        }
    }

    fn handle_fetch_completed(
        &mut self,
        request: FetchRequest,
        result: Result<Vec<OptionItem>, FetchFailure>,
        mailbox: &mpsc::WeakSender<WorkerMessage>,
        shutdown: &CancellationToken,
    ) {
        let outcome =
            self.resolver
                .on_fetch_result(&mut self.state, &request.field, &request.tag, result);
        let instance = self.state.id();

        let event = match outcome {
            FetchOutcome::Applied {
                field,
                option_count,
                follow_up,
            } => {
                self.inflight.remove(&field);
                debug!(%field, option_count, "options ready");
                if let Some(follow_up) = follow_up {
                    info!(%field, value = %self.state.value(&field), "sole option auto-selected");
                    self.apply(&follow_up, mailbox, shutdown);
                }
                SessionEvent::OptionsReady {
                    instance,
                    field,
                    option_count,
                }
            }
            FetchOutcome::Failed { field, failure } => {
                self.inflight.remove(&field);
                warn!(%field, kind = %request.kind, error = %failure, "option fetch failed");
                SessionEvent::OptionsFailed {
                    instance,
                    field,
                    failure,
                }
            }
            FetchOutcome::Discarded { field, reason } => SessionEvent::StaleResultDiscarded {
                instance,
                field,
                reason,
            },
        };

        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    /// Spawns the inventory call for `request`.
    fn dispatch(
        &mut self,
        request: FetchRequest,
        mailbox: &mpsc::WeakSender<WorkerMessage>,
        shutdown: &CancellationToken,
    ) {
        if !self.resolver.mark_dispatched(&mut self.state, &request) {
            trace!(field = %request.field, seq = request.tag.seq, "request superseded before dispatch");
            return;
        }

        let token = shutdown.child_token();
        if let Some(previous) = self.inflight.insert(request.field.clone(), token.clone()) {
            previous.cancel();
        }

        debug!(
            field = %request.field,
            kind = %request.kind,
            parent = request.parent().unwrap_or("<root>"),
            seq = request.tag.seq,
            "dispatching option fetch"
        );

        let client = Arc::clone(&self.client);
        let timeout = self.fetch_timeout;
        let retry = self.retry;
        let mailbox = mailbox.clone();
        let kind = request.kind.clone();
        let parent = request.parent().map(str::to_string);

        tokio::spawn(async move {
            let mut fetch = tokio::spawn(async move {
                retry_with_backoff(retry, RetryPolicy::RetryTransient, || {
                    let client = Arc::clone(&client);
                    let kind = kind.clone();
                    let parent = parent.clone();
                    async move {
                        match tokio::time::timeout(timeout, client.fetch_options(kind, parent)).await {
                            Ok(result) => result,
                            Err(_) => Err(FetchFailure::timeout(timeout)),
                        }
                    }
                })
                .await
                .into_result()
            });

            let result = tokio::select! {
                _ = token.cancelled() => {
                    trace!(field = %request.field, seq = request.tag.seq, "fetch cancelled");
                    fetch.abort();
                    return;
                }
                joined = &mut fetch => match joined {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(field = %request.field, error = %e, "option fetch task panicked");
                        Err(FetchFailure::transient("inventory lookup panicked"))
                    }
                },
            };

            if let Some(tx) = mailbox.upgrade() {
                let _ = tx.send(WorkerMessage::FetchCompleted { request, result }).await;
            }
        });
    }
}
