//! Shared test utilities and arbitrary generators for property-based testing.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use proptest::prelude::*;
use tokio::sync::oneshot;

use crate::catalog::{OptionKind, RequirementCatalog};
use crate::graph::{SelectedModule, SelectionSet};
use crate::inventory::{FetchFailure, InventoryClient};
use crate::types::{FieldValue, InstanceId, OptionItem};

pub fn arb_field_value() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        Just(FieldValue::Empty),
        any::<bool>().prop_map(FieldValue::Bool),
        any::<i64>().prop_map(FieldValue::from),
        "[a-z0-9-]{0,12}".prop_map(FieldValue::Text),
    ]
}

/// An acyclic catalog over types `t0..tn` and a selection drawn from them.
///
/// Type `ti` only ever requires types `tj` with `j < i`, and every selected
/// type is declared.
pub fn arb_dag_scenario() -> impl Strategy<Value = (RequirementCatalog, SelectionSet)> {
    (1usize..8)
        .prop_flat_map(|n| {
            let masks: Vec<_> = (0..n)
                .map(|i| prop::collection::vec(prop::bool::weighted(0.3), i))
                .collect();
            (masks, prop::collection::vec(0..n, 0..10))
        })
        .prop_map(|(masks, picks)| {
            let name = |i: usize| format!("t{}", i);
            let catalog = RequirementCatalog::from_requirements(masks.iter().enumerate().map(
                |(i, mask)| {
                    let requirements: Vec<String> = mask
                        .iter()
                        .enumerate()
                        .filter(|(_, on)| **on)
                        .map(|(j, _)| name(j))
                        .collect();
                    (name(i), requirements)
                },
            ));
            let selection = picks
                .iter()
                .enumerate()
                .map(|(k, &t)| SelectedModule::new(InstanceId(k as u64 + 1), name(t)))
                .collect();
            (catalog, selection)
        })
}

pub fn option_items(ids: &[&str]) -> Vec<OptionItem> {
    ids.iter().map(|id| OptionItem::new(*id, id.to_uppercase())).collect()
}

/// Installs a test-writer subscriber filtered by `RUST_LOG`. Safe to call
/// from every test.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ─── Scripted inventory ───

type Reply = oneshot::Sender<Result<Vec<OptionItem>, FetchFailure>>;

struct PendingFetch {
    kind: OptionKind,
    parent: Option<String>,
    reply: Reply,
}

/// An inventory whose calls block until the test releases them.
///
/// Releasing in a different order than the calls were made reproduces
/// out-of-order completion deterministically.
#[derive(Default)]
pub struct ScriptedInventory {
    pending: Mutex<Vec<PendingFetch>>,
    calls: AtomicUsize,
}

impl ScriptedInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total `fetch_options` calls so far, including retries.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether a live call for `(kind, parent)` is waiting.
    pub fn is_waiting(&self, kind: &OptionKind, parent: Option<&str>) -> bool {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.matches(kind, parent) && !p.reply.is_closed())
    }

    /// Waits until a call for `(kind, parent)` has been made.
    pub async fn wait_for(&self, kind: &OptionKind, parent: Option<&str>) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !self.is_waiting(kind, parent) {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no fetch of {} under {:?} was made", kind, parent));
    }

    /// Waits until the caller of `(kind, parent)` has gone away (cancelled).
    pub async fn wait_until_abandoned(&self, kind: &OptionKind, parent: Option<&str>) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.is_waiting(kind, parent) {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("fetch of {} under {:?} was never abandoned", kind, parent));
    }

    /// Answers the oldest live call for `(kind, parent)`. Returns false if
    /// there was none.
    pub fn release(
        &self,
        kind: &OptionKind,
        parent: Option<&str>,
        result: Result<Vec<OptionItem>, FetchFailure>,
    ) -> bool {
        let mut pending = self.pending.lock().unwrap();
        pending.retain(|p| !p.reply.is_closed());
        match pending.iter().position(|p| p.matches(kind, parent)) {
            Some(index) => pending.remove(index).reply.send(result).is_ok(),
            None => false,
        }
    }
}

impl PendingFetch {
    fn matches(&self, kind: &OptionKind, parent: Option<&str>) -> bool {
        &self.kind == kind && self.parent.as_deref() == parent
    }
}

impl InventoryClient for ScriptedInventory {
    async fn fetch_options(
        &self,
        kind: OptionKind,
        parent: Option<String>,
    ) -> Result<Vec<OptionItem>, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (reply, rx) = oneshot::channel();
        self.pending.lock().unwrap().push(PendingFetch {
            kind,
            parent,
            reply,
        });
        rx.await
            .unwrap_or_else(|_| Err(FetchFailure::permanent("scripted reply dropped")))
    }
}
