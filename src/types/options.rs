//! Option sets: the selectable choices for one field of one instance.
//!
//! An option set moves through `Absent -> Stale -> Loading -> Ready | Absent`.
//! Transitions are driven exclusively by the cascade resolver; the mutators
//! here are crate-private so no other component can put a set into `Ready`
//! without going through the fetch-tag check.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inventory::FetchFailure;

/// One selectable option returned by the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionItem {
    /// Value written into the field when this option is chosen.
    pub id: String,

    /// Human-readable label.
    pub label: String,

    /// Auxiliary attributes (location, address prefix, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl OptionItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        OptionItem {
            id: id.into(),
            label: label.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an auxiliary attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Lifecycle state of an option set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionSetState {
    /// No options and nothing pending.
    #[default]
    Absent,

    /// Governing trigger changed; a fetch is pending dispatch or will not be issued.
    Stale,

    /// A fetch has been dispatched for the current trigger value.
    Loading,

    /// Options for the current trigger value are available.
    Ready,
}

impl OptionSetState {
    pub fn name(&self) -> &'static str {
        match self {
            OptionSetState::Absent => "absent",
            OptionSetState::Stale => "stale",
            OptionSetState::Loading => "loading",
            OptionSetState::Ready => "ready",
        }
    }
}

/// Identifies one dispatched fetch.
///
/// `trigger_value` is the governing trigger's selector at dispatch time (`None`
/// for root sources). `seq` is unique per instance and increases with every
/// request, so a re-request for an unchanged trigger value still supersedes
/// the earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchTag {
    pub trigger_value: Option<String>,
    pub seq: u64,
}

/// The option set for one field of one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptionSet {
    state: OptionSetState,
    options: Vec<OptionItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending: Option<FetchTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FetchFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    loaded_at: Option<DateTime<Utc>>,
}

pub(crate) static ABSENT: OptionSet = OptionSet {
    state: OptionSetState::Absent,
    options: Vec::new(),
    pending: None,
    failure: None,
    loaded_at: None,
};

impl OptionSet {
    pub fn state(&self) -> OptionSetState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == OptionSetState::Ready
    }

    /// Options currently offered. Empty unless the set is `Ready`.
    pub fn options(&self) -> &[OptionItem] {
        &self.options
    }

    /// The fetch this set is waiting on, if any.
    pub fn pending(&self) -> Option<&FetchTag> {
        self.pending.as_ref()
    }

    /// The failure attached by the last fetch, if it failed.
    pub fn failure(&self) -> Option<&FetchFailure> {
        self.failure.as_ref()
    }

    /// When the current options were loaded.
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Looks up an option by id.
    pub fn find(&self, id: &str) -> Option<&OptionItem> {
        self.options.iter().find(|o| o.id == id)
    }

    /// Drops options and any pending fetch; keeps `Absent` if nothing was loaded.
    pub(crate) fn invalidate(&mut self) {
        let was_absent = self.state == OptionSetState::Absent && self.pending.is_none();
        self.reset();
        if !was_absent {
            self.state = OptionSetState::Stale;
        }
    }

    /// Marks the set stale and waiting for the fetch identified by `tag`.
    pub(crate) fn await_fetch(&mut self, tag: FetchTag) {
        self.reset();
        self.state = OptionSetState::Stale;
        self.pending = Some(tag);
    }

    /// Moves a stale set to `Loading` if `tag` is the fetch it is waiting on.
    pub(crate) fn start_loading(&mut self, tag: &FetchTag) -> bool {
        if self.state == OptionSetState::Stale && self.pending.as_ref() == Some(tag) {
            self.state = OptionSetState::Loading;
            true
        } else {
            false
        }
    }

    pub(crate) fn complete(&mut self, options: Vec<OptionItem>, at: DateTime<Utc>) {
        self.state = OptionSetState::Ready;
        self.options = options;
        self.pending = None;
        self.failure = None;
        self.loaded_at = Some(at);
    }

    pub(crate) fn fail(&mut self, failure: FetchFailure) {
        self.reset();
        self.failure = Some(failure);
    }

    /// Returns to `Absent` with no options, pending fetch, or failure.
    pub(crate) fn reset(&mut self) {
        self.state = OptionSetState::Absent;
        self.options.clear();
        self.pending = None;
        self.failure = None;
        self.loaded_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(value: &str, seq: u64) -> FetchTag {
        FetchTag {
            trigger_value: Some(value.to_string()),
            seq,
        }
    }

    fn ready_set() -> OptionSet {
        let mut set = OptionSet::default();
        set.await_fetch(tag("vnet-a", 1));
        assert!(set.start_loading(&tag("vnet-a", 1)));
        set.complete(vec![OptionItem::new("subnet-1", "subnet-1")], Utc::now());
        set
    }

    #[test]
    fn default_is_absent() {
        let set = OptionSet::default();
        assert_eq!(set.state(), OptionSetState::Absent);
        assert!(set.options().is_empty());
        assert_eq!(&set, &ABSENT);
    }

    #[test]
    fn full_lifecycle_reaches_ready() {
        let set = ready_set();
        assert!(set.is_ready());
        assert_eq!(set.options().len(), 1);
        assert!(set.pending().is_none());
        assert!(set.loaded_at().is_some());
        assert!(set.find("subnet-1").is_some());
    }

    #[test]
    fn start_loading_requires_matching_tag() {
        let mut set = OptionSet::default();
        set.await_fetch(tag("vnet-a", 2));

        assert!(!set.start_loading(&tag("vnet-a", 1)));
        assert_eq!(set.state(), OptionSetState::Stale);

        assert!(set.start_loading(&tag("vnet-a", 2)));
        assert_eq!(set.state(), OptionSetState::Loading);

        // Already loading: a second start is refused.
        assert!(!set.start_loading(&tag("vnet-a", 2)));
    }

    #[test]
    fn invalidate_ready_set_becomes_stale_without_options() {
        let mut set = ready_set();
        set.invalidate();
        assert_eq!(set.state(), OptionSetState::Stale);
        assert!(set.options().is_empty());
        assert!(set.pending().is_none());
    }

    #[test]
    fn invalidate_absent_set_stays_absent() {
        let mut set = OptionSet::default();
        set.invalidate();
        assert_eq!(set.state(), OptionSetState::Absent);
    }

    #[test]
    fn fail_attaches_failure_and_goes_absent() {
        let mut set = OptionSet::default();
        set.await_fetch(tag("vnet-a", 1));
        set.start_loading(&tag("vnet-a", 1));

        set.fail(FetchFailure::permanent("subscription not found"));

        assert_eq!(set.state(), OptionSetState::Absent);
        assert!(set.options().is_empty());
        assert_eq!(
            set.failure().map(|f| f.message.as_str()),
            Some("subscription not found")
        );
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&OptionSetState::Loading).unwrap();
        assert_eq!(json, "\"loading\"");
    }
}
