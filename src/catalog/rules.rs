//! Cascade rules: which field writes invalidate which other fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{CatalogError, OptionKind, Result};
use crate::graph::topology::find_cycle;
use crate::types::{FieldName, ModuleType};

/// Writing `trigger_field` on an instance of `module_type` clears
/// `dependent_field` and invalidates its option set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CascadeRule {
    pub module_type: ModuleType,
    pub trigger_field: FieldName,
    pub dependent_field: FieldName,

    /// Where to refetch the dependent's options from. `None` means the
    /// dependent is cleared but no fetch is issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refetch: Option<OptionKind>,
}

impl CascadeRule {
    /// A rule that clears `dependent` without refetching.
    pub fn new(
        module_type: impl Into<ModuleType>,
        trigger: impl Into<FieldName>,
        dependent: impl Into<FieldName>,
    ) -> Self {
        CascadeRule {
            module_type: module_type.into(),
            trigger_field: trigger.into(),
            dependent_field: dependent.into(),
            refetch: None,
        }
    }

    /// Refetch the dependent's options from `kind`, keyed by the trigger value.
    pub fn with_refetch(mut self, kind: OptionKind) -> Self {
        self.refetch = Some(kind);
        self
    }

    pub fn refetch_needed(&self) -> bool {
        self.refetch.is_some()
    }
}

/// An option set with no governing trigger, fetched as soon as an instance
/// is placed (the account list, for example).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RootOptionSource {
    pub module_type: ModuleType,
    pub field: FieldName,
    pub kind: OptionKind,

    /// When the fetch returns exactly one option and the field is still
    /// empty, write that option into the field.
    #[serde(default)]
    pub auto_select_single: bool,
}

impl RootOptionSource {
    pub fn new(
        module_type: impl Into<ModuleType>,
        field: impl Into<FieldName>,
        kind: OptionKind,
    ) -> Self {
        RootOptionSource {
            module_type: module_type.into(),
            field: field.into(),
            kind,
            auto_select_single: false,
        }
    }

    pub fn auto_select_single(mut self) -> Self {
        self.auto_select_single = true;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RuleTableDef {
    #[serde(default)]
    rules: Vec<CascadeRule>,
    #[serde(default)]
    roots: Vec<RootOptionSource>,
}

type FieldIndex<V> = BTreeMap<ModuleType, BTreeMap<FieldName, V>>;

/// The validated cascade rule table.
///
/// Guarantees, per module type:
/// - every dependent field has at most one governing rule
/// - root option sources are unique and not governed by any rule
/// - the rules form no cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RuleTableDef", into = "RuleTableDef")]
pub struct RuleTable {
    rules: Vec<CascadeRule>,
    roots: Vec<RootOptionSource>,
    by_trigger: FieldIndex<Vec<usize>>,
    by_dependent: FieldIndex<usize>,
    root_index: FieldIndex<usize>,
}

impl RuleTable {
    pub fn new(rules: Vec<CascadeRule>, roots: Vec<RootOptionSource>) -> Result<Self> {
        let mut by_trigger: FieldIndex<Vec<usize>> = BTreeMap::new();
        let mut by_dependent: FieldIndex<usize> = BTreeMap::new();

        for (i, rule) in rules.iter().enumerate() {
            let dependents = by_dependent.entry(rule.module_type.clone()).or_default();
            if let Some(&existing) = dependents.get(&rule.dependent_field) {
                let first = &rules[existing];
                return Err(if first.trigger_field == rule.trigger_field {
                    CatalogError::DuplicateRule {
                        module_type: rule.module_type.clone(),
                        trigger: rule.trigger_field.clone(),
                        dependent: rule.dependent_field.clone(),
                    }
                } else {
                    CatalogError::ConflictingTrigger {
                        module_type: rule.module_type.clone(),
                        field: rule.dependent_field.clone(),
                        first: first.trigger_field.clone(),
                        second: rule.trigger_field.clone(),
                    }
                });
            }
            dependents.insert(rule.dependent_field.clone(), i);

            by_trigger
                .entry(rule.module_type.clone())
                .or_default()
                .entry(rule.trigger_field.clone())
                .or_default()
                .push(i);
        }

        let mut root_index: FieldIndex<usize> = BTreeMap::new();
        for (i, root) in roots.iter().enumerate() {
            if let Some(&rule) = by_dependent
                .get(&root.module_type)
                .and_then(|d| d.get(&root.field))
            {
                return Err(CatalogError::GovernedRootSource {
                    module_type: root.module_type.clone(),
                    field: root.field.clone(),
                    trigger: rules[rule].trigger_field.clone(),
                });
            }
            let fields = root_index.entry(root.module_type.clone()).or_default();
            if fields.insert(root.field.clone(), i).is_some() {
                return Err(CatalogError::DuplicateRootSource {
                    module_type: root.module_type.clone(),
                    field: root.field.clone(),
                });
            }
        }

        for (module_type, triggers) in &by_trigger {
            let successors: BTreeMap<FieldName, Vec<FieldName>> = triggers
                .iter()
                .map(|(field, idx)| {
                    let next = idx.iter().map(|&i| rules[i].dependent_field.clone()).collect();
                    (field.clone(), next)
                })
                .collect();
            let starts: Vec<FieldName> = rules
                .iter()
                .filter(|r| &r.module_type == module_type)
                .map(|r| r.trigger_field.clone())
                .collect();

            if let Some(cycle) = find_cycle(&starts, &successors) {
                return Err(CatalogError::RuleCycle {
                    module_type: module_type.clone(),
                    cycle,
                });
            }
        }

        Ok(RuleTable {
            rules,
            roots,
            by_trigger,
            by_dependent,
            root_index,
        })
    }

    /// Parses and validates a `{"rules": [...], "roots": [...]}` document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let def: RuleTableDef = serde_json::from_str(json)?;
        Self::new(def.rules, def.roots)
    }

    pub fn rules(&self) -> &[CascadeRule] {
        &self.rules
    }

    pub fn roots(&self) -> &[RootOptionSource] {
        &self.roots
    }

    /// Rules whose trigger is `field` on `module_type`, in declaration order.
    pub fn triggered_by<'a>(
        &'a self,
        module_type: &ModuleType,
        field: &FieldName,
    ) -> impl Iterator<Item = &'a CascadeRule> + use<'a> {
        self.by_trigger
            .get(module_type)
            .and_then(|t| t.get(field))
            .into_iter()
            .flatten()
            .map(|&i| &self.rules[i])
    }

    /// The rule that governs `field` on `module_type`, if any.
    pub fn governing_rule(&self, module_type: &ModuleType, field: &FieldName) -> Option<&CascadeRule> {
        self.by_dependent
            .get(module_type)
            .and_then(|d| d.get(field))
            .map(|&i| &self.rules[i])
    }

    pub fn root_source(&self, module_type: &ModuleType, field: &FieldName) -> Option<&RootOptionSource> {
        self.root_index
            .get(module_type)
            .and_then(|r| r.get(field))
            .map(|&i| &self.roots[i])
    }

    /// Root sources for `module_type`, in declaration order.
    pub fn root_sources<'a>(
        &'a self,
        module_type: &'a ModuleType,
    ) -> impl Iterator<Item = &'a RootOptionSource> + 'a {
        self.roots.iter().filter(move |r| &r.module_type == module_type)
    }
}

impl TryFrom<RuleTableDef> for RuleTable {
    type Error = CatalogError;

    fn try_from(def: RuleTableDef) -> Result<Self> {
        Self::new(def.rules, def.roots)
    }
}

impl From<RuleTable> for RuleTableDef {
    fn from(table: RuleTable) -> Self {
        RuleTableDef {
            rules: table.rules,
            roots: table.roots,
        }
    }
}
