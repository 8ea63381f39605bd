//! The cascade resolver.
//!
//! `CascadeResolver` is stateless: it holds the read-only rule table and
//! applies transitions to an [`InstanceState`] passed in by the owner. It
//! never performs I/O. Fetches it wants issued come back as [`FetchRequest`]
//! values for the caller to dispatch.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, trace};

use crate::catalog::{OptionKind, RuleTable};
use crate::inventory::FetchFailure;
use crate::types::options::ABSENT;
use crate::types::{
    FetchTag, FieldName, FieldValue, InstanceId, ModuleConfig, ModuleType, OptionItem, OptionSet,
};

/// The trigger value meaning "use the provider default".
pub const DEFAULT_SENTINEL: &str = "default";

/// Configuration and option sets of one placed module instance.
///
/// Mutated only by [`CascadeResolver`]; everyone else reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceState {
    id: InstanceId,
    module_type: ModuleType,
    config: ModuleConfig,
    options: BTreeMap<FieldName, OptionSet>,
    #[serde(skip)]
    next_seq: u64,
}

impl InstanceState {
    pub fn new(id: InstanceId, module_type: ModuleType) -> Self {
        InstanceState {
            id,
            module_type,
            config: ModuleConfig::new(),
            options: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn module_type(&self) -> &ModuleType {
        &self.module_type
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn value(&self, field: &FieldName) -> &FieldValue {
        self.config.get(field)
    }

    /// The option set for `field`; `Absent` if nothing was ever requested.
    pub fn option_set(&self, field: &FieldName) -> &OptionSet {
        self.options.get(field).unwrap_or(&ABSENT)
    }

    /// Option sets that have been touched, in field order.
    pub fn option_sets(&self) -> impl Iterator<Item = (&FieldName, &OptionSet)> {
        self.options.iter()
    }

    fn next_tag(&mut self, trigger_value: Option<String>) -> FetchTag {
        self.next_seq += 1;
        FetchTag {
            trigger_value,
            seq: self.next_seq,
        }
    }

    /// Marks `field` as waiting on a new fetch and builds the request for it.
    fn request(&mut self, field: &FieldName, kind: &OptionKind, parent: Option<String>) -> FetchRequest {
        let tag = self.next_tag(parent);
        self.options
            .entry(field.clone())
            .or_default()
            .await_fetch(tag.clone());
        FetchRequest {
            instance: self.id,
            field: field.clone(),
            kind: kind.clone(),
            tag,
        }
    }
}

/// A fetch the resolver wants issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchRequest {
    pub instance: InstanceId,
    pub field: FieldName,
    pub kind: OptionKind,
    pub tag: FetchTag,
}

impl FetchRequest {
    /// The parent selector passed to the inventory.
    pub fn parent(&self) -> Option<&str> {
        self.tag.trigger_value.as_deref()
    }
}

/// What an `update` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Fields cleared by the cascade, in breadth-first order from the write.
    pub invalidated: Vec<FieldName>,

    /// At most one request per invalidated field.
    pub fetches: Vec<FetchRequest>,
}

/// Why a fetch result was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// The governing trigger no longer holds the value the fetch was made for.
    TriggerChanged,
    /// A newer fetch for the same trigger value has been requested.
    Superseded,
    /// The field has no option source for this module type.
    NotRequested,
}

/// What `on_fetch_result` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The option set is now `Ready`.
    Applied {
        field: FieldName,
        option_count: usize,
        /// Set when a root source auto-selected its single option, which
        /// cascades like any other write.
        follow_up: Option<UpdateOutcome>,
    },

    /// The option set is back to `Absent` with the failure attached.
    Failed {
        field: FieldName,
        failure: FetchFailure,
    },

    /// The result was stale and left no trace.
    Discarded {
        field: FieldName,
        reason: DiscardReason,
    },
}

/// Applies cascade rules to instance state.
#[derive(Debug, Clone)]
pub struct CascadeResolver {
    rules: Arc<RuleTable>,
    default_sentinel: String,
}

impl CascadeResolver {
    pub fn new(rules: Arc<RuleTable>) -> Self {
        CascadeResolver {
            rules,
            default_sentinel: DEFAULT_SENTINEL.to_string(),
        }
    }

    pub fn with_default_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.default_sentinel = sentinel.into();
        self
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// The parent selector for a trigger value, or `None` if the value is
    /// empty or the default sentinel (no fetch).
    fn selector(&self, value: &FieldValue) -> Option<String> {
        value.as_selector().filter(|s| *s != self.default_sentinel)
    }

    /// Writes `value` into `field` and cascades.
    ///
    /// Every field reachable from `field` through the rules is cleared in this
    /// call. Afterwards each cleared field's option set is:
    /// - `Stale` awaiting a new fetch, if its rule refetches and its trigger
    ///   now holds a usable value;
    /// - `Absent`, if its rule refetches but the trigger is empty or the
    ///   default sentinel;
    /// - `Stale` (or still `Absent` if never loaded) for rules that do not
    ///   refetch.
    ///
    /// No cleared field is left `Ready`. Writing the same value again still
    /// cascades.
    pub fn update(
        &self,
        state: &mut InstanceState,
        field: FieldName,
        value: FieldValue,
    ) -> UpdateOutcome {
        state.config.set(field.clone(), value);

        let mut invalidated = Vec::new();
        let mut visited = BTreeSet::from([field.clone()]);
        let mut queue = VecDeque::from([field.clone()]);

        while let Some(trigger) = queue.pop_front() {
            for rule in self.rules.triggered_by(&state.module_type, &trigger) {
                if visited.insert(rule.dependent_field.clone()) {
                    state.config.clear(&rule.dependent_field);
                    invalidated.push(rule.dependent_field.clone());
                    queue.push_back(rule.dependent_field.clone());
                }
            }
        }

        // Triggers are read only after every clear, so a chain A -> B -> C
        // sees B already empty when deciding C.
        let mut fetches = Vec::new();
        for dependent in &invalidated {
            let Some(rule) = self.rules.governing_rule(&state.module_type, dependent) else {
                continue;
            };
            match &rule.refetch {
                Some(kind) => match self.selector(state.config.get(&rule.trigger_field)) {
                    Some(parent) => fetches.push(state.request(dependent, kind, Some(parent))),
                    None => state.options.entry(dependent.clone()).or_default().reset(),
                },
                None => state.options.entry(dependent.clone()).or_default().invalidate(),
            }
        }

        debug!(
            instance = %state.id,
            %field,
            invalidated = invalidated.len(),
            fetches = fetches.len(),
            "field updated"
        );

        UpdateOutcome {
            invalidated,
            fetches,
        }
    }

    /// Requests every root option source of the instance's module type.
    pub fn prime(&self, state: &mut InstanceState) -> Vec<FetchRequest> {
        let roots: Vec<_> = self
            .rules
            .root_sources(&state.module_type)
            .map(|r| (r.field.clone(), r.kind.clone()))
            .collect();
        roots
            .into_iter()
            .map(|(field, kind)| state.request(&field, &kind, None))
            .collect()
    }

    /// Requests `field`'s options again for the current trigger value.
    ///
    /// Supersedes any fetch in flight for the field. Returns `None` if the
    /// field has no option source or its trigger has no usable value.
    pub fn refresh(&self, state: &mut InstanceState, field: &FieldName) -> Option<FetchRequest> {
        if let Some(root) = self.rules.root_source(&state.module_type, field) {
            return Some(state.request(field, &root.kind, None));
        }

        let rule = self.rules.governing_rule(&state.module_type, field)?;
        let kind = rule.refetch.as_ref()?;
        let parent = self.selector(state.config.get(&rule.trigger_field))?;
        Some(state.request(field, kind, Some(parent)))
    }

    /// Moves the request's option set to `Loading`. Returns false if the
    /// request was superseded before dispatch.
    pub fn mark_dispatched(&self, state: &mut InstanceState, request: &FetchRequest) -> bool {
        state
            .options
            .get_mut(&request.field)
            .is_some_and(|set| set.start_loading(&request.tag))
    }

    /// Applies a completed fetch, or discards it if it is stale.
    ///
    /// Only the fetch the option set is currently waiting on may change it:
    /// a result whose tag differs is discarded without touching config or
    /// option sets.
    pub fn on_fetch_result(
        &self,
        state: &mut InstanceState,
        field: &FieldName,
        tag: &FetchTag,
        result: Result<Vec<OptionItem>, FetchFailure>,
    ) -> FetchOutcome {
        let root = self.rules.root_source(&state.module_type, field);
        let current_trigger = match (root, self.rules.governing_rule(&state.module_type, field)) {
            (Some(_), _) => None,
            (None, Some(rule)) if rule.refetch_needed() => {
                self.selector(state.config.get(&rule.trigger_field))
            }
            _ => {
                return self.discard(state, field, tag, DiscardReason::NotRequested);
            }
        };

        let pending = state.option_set(field).pending();
        if pending != Some(tag) {
            let reason = if current_trigger != tag.trigger_value {
                DiscardReason::TriggerChanged
            } else {
                DiscardReason::Superseded
            };
            return self.discard(state, field, tag, reason);
        }

        let auto_select = root.is_some_and(|r| r.auto_select_single);
        let Some(set) = state.options.get_mut(field) else {
            return self.discard(state, field, tag, DiscardReason::NotRequested);
        };

        match result {
            Ok(options) => {
                let option_count = options.len();
                let single = match options.as_slice() {
                    [only] => Some(only.id.clone()),
                    _ => None,
                };
                set.complete(options, Utc::now());

                trace!(instance = %state.id, %field, option_count, "options ready");

                let follow_up = match single {
                    Some(id) if auto_select && state.config.get(field).is_empty() => {
                        Some(self.update(state, field.clone(), FieldValue::Text(id)))
                    }
                    _ => None,
                };

                FetchOutcome::Applied {
                    field: field.clone(),
                    option_count,
                    follow_up,
                }
            }
            Err(failure) => {
                set.fail(failure.clone());
                FetchOutcome::Failed {
                    field: field.clone(),
                    failure,
                }
            }
        }
    }

    fn discard(
        &self,
        state: &InstanceState,
        field: &FieldName,
        tag: &FetchTag,
        reason: DiscardReason,
    ) -> FetchOutcome {
        debug!(
            instance = %state.id,
            %field,
            seq = tag.seq,
            trigger = tag.trigger_value.as_deref().unwrap_or(""),
            ?reason,
            "stale fetch result discarded"
        );
        FetchOutcome::Discarded {
            field: field.clone(),
            reason,
        }
    }
}
