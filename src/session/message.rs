//! Worker messages and session events.

use serde::Serialize;
use tokio::sync::oneshot;

use crate::cascade::{DiscardReason, FetchRequest, InstanceState, UpdateOutcome};
use crate::inventory::FetchFailure;
use crate::types::{FieldName, FieldValue, InstanceId, OptionItem};

/// Messages that can be sent to an instance worker.
///
/// Workers receive these via `tokio::sync::mpsc` and process them serially,
/// so every transition of one instance's state happens in arrival order.
#[derive(Debug)]
pub(crate) enum WorkerMessage {
    /// Write a field and cascade.
    Update {
        field: FieldName,
        value: FieldValue,
        reply: oneshot::Sender<UpdateOutcome>,
    },

    /// Re-request a field's options for its current trigger value.
    Refresh {
        field: FieldName,
        reply: oneshot::Sender<Option<FetchRequest>>,
    },

    /// A dispatched fetch finished (after retries).
    FetchCompleted {
        request: FetchRequest,
        result: Result<Vec<OptionItem>, FetchFailure>,
    },

    /// Clone the current state.
    Snapshot(oneshot::Sender<InstanceState>),

    /// Stop the worker and cancel its in-flight fetches.
    Shutdown,
}

/// Option set changes published to session subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    OptionsReady {
        instance: InstanceId,
        field: FieldName,
        option_count: usize,
    },

    OptionsFailed {
        instance: InstanceId,
        field: FieldName,
        failure: FetchFailure,
    },

    /// A late result was dropped without touching the instance.
    StaleResultDiscarded {
        instance: InstanceId,
        field: FieldName,
        reason: DiscardReason,
    },
}

impl SessionEvent {
    pub fn instance(&self) -> InstanceId {
        match self {
            SessionEvent::OptionsReady { instance, .. }
            | SessionEvent::OptionsFailed { instance, .. }
            | SessionEvent::StaleResultDiscarded { instance, .. } => *instance,
        }
    }

    pub fn field(&self) -> &FieldName {
        match self {
            SessionEvent::OptionsReady { field, .. }
            | SessionEvent::OptionsFailed { field, .. }
            | SessionEvent::StaleResultDiscarded { field, .. } => field,
        }
    }
}
