//! Requirement validation and provisioning order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::selection::{ProvisioningPlan, SelectedModule, SelectionSet};
use super::topology::{find_cycle, kahn_order};
use crate::catalog::RequirementCatalog;
use crate::types::ModuleType;

/// A reason a selection cannot be provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// The selected type is not in the requirement catalog.
    UnknownModuleType { module_type: ModuleType },

    /// A selected type requires a type that is not selected.
    ///
    /// Reported once per (type, missing type) pair regardless of how many
    /// instances of the type are selected.
    MissingPrerequisite {
        module_type: ModuleType,
        missing: ModuleType,
    },

    /// The requirements among the selected types contain a cycle.
    ///
    /// This is a catalog authoring defect, not something the operator can fix
    /// by reselecting.
    CyclicDependency {
        /// Every type that could not be ordered, in selection order.
        types: Vec<ModuleType>,
        /// One concrete cycle, prerequisite first.
        cycle: Vec<ModuleType>,
    },
}

impl Violation {
    /// True for violations the operator can resolve by changing the selection.
    pub fn is_operator_fixable(&self) -> bool {
        matches!(self, Violation::MissingPrerequisite { .. })
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::UnknownModuleType { module_type } => {
                write!(f, "unknown module type `{}`", module_type)
            }
            Violation::MissingPrerequisite {
                module_type,
                missing,
            } => write!(f, "`{}` requires `{}`, which is not selected", module_type, missing),
            Violation::CyclicDependency { cycle, .. } => {
                write!(f, "cyclic requirement: ")?;
                for module_type in cycle {
                    write!(f, "{} -> ", module_type)?;
                }
                match cycle.first() {
                    Some(first) => write!(f, "{}", first),
                    None => Ok(()),
                }
            }
        }
    }
}

/// A non-empty set of violations. Returned instead of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(try_from = "Vec<Violation>", into = "Vec<Violation>")]
pub struct Violations(Vec<Violation>);

/// An empty violation list, which cannot describe a rejected selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a violation set must contain at least one violation")]
pub struct EmptyViolations;

impl TryFrom<Vec<Violation>> for Violations {
    type Error = EmptyViolations;

    fn try_from(violations: Vec<Violation>) -> Result<Self, Self::Error> {
        if violations.is_empty() {
            return Err(EmptyViolations);
        }
        Ok(Violations(violations))
    }
}

impl From<Violations> for Vec<Violation> {
    fn from(violations: Violations) -> Self {
        violations.0
    }
}

impl Violations {
    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Violation] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Violation> {
        self.0
    }

    /// `(module_type, missing)` pairs, in report order.
    pub fn missing_prerequisites(&self) -> impl Iterator<Item = (&ModuleType, &ModuleType)> {
        self.0.iter().filter_map(|v| match v {
            Violation::MissingPrerequisite {
                module_type,
                missing,
            } => Some((module_type, missing)),
            _ => None,
        })
    }

    pub fn has_cycle(&self) -> bool {
        self.0
            .iter()
            .any(|v| matches!(v, Violation::CyclicDependency { .. }))
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "selection cannot be provisioned: ")?;
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Violations {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Validates `selection` against `catalog` and computes a provisioning order.
///
/// Nodes are the distinct types in the selection, indexed by first
/// appearance. Each selected prerequisite adds an edge prerequisite -> type;
/// an unselected prerequisite is a [`Violation::MissingPrerequisite`]. Kahn's
/// algorithm orders the types, preferring earlier-selected types when several
/// are ready. Types left over form or follow a cycle.
///
/// Returns a plan only if there are no violations. Instances of one type keep
/// their selection order. Pure: the same inputs always give the same output.
pub fn resolve(
    selection: &SelectionSet,
    catalog: &RequirementCatalog,
) -> Result<ProvisioningPlan, Violations> {
    let mut types: Vec<&ModuleType> = Vec::new();
    let mut index: BTreeMap<&ModuleType, usize> = BTreeMap::new();
    // Instances of each type, in selection order.
    let mut members: Vec<Vec<&SelectedModule>> = Vec::new();
    for module in selection.iter() {
        let i = *index.entry(&module.module_type).or_insert_with(|| {
            types.push(&module.module_type);
            members.push(Vec::new());
            types.len() - 1
        });
        members[i].push(module);
    }

    let mut violations = Vec::new();
    let mut edges = Vec::new();

    for (i, &module_type) in types.iter().enumerate() {
        let Some(requirements) = catalog.requirements_of(module_type) else {
            violations.push(Violation::UnknownModuleType {
                module_type: module_type.clone(),
            });
            continue;
        };

        for prerequisite in requirements {
            match index.get(prerequisite) {
                Some(&p) => edges.push((p, i)),
                None => violations.push(Violation::MissingPrerequisite {
                    module_type: module_type.clone(),
                    missing: prerequisite.clone(),
                }),
            }
        }
    }

    let order = kahn_order(types.len(), &edges);

    if !order.is_complete() {
        let blocked: Vec<&ModuleType> = order.blocked.iter().map(|&i| types[i]).collect();

        let mut successors: BTreeMap<usize, Vec<usize>> =
            order.blocked.iter().map(|&i| (i, Vec::new())).collect();
        for &(from, to) in &edges {
            if successors.contains_key(&to)
                && let Some(next) = successors.get_mut(&from)
            {
                next.push(to);
            }
        }
        let cycle = find_cycle(&order.blocked, &successors).unwrap_or_default();

        violations.push(Violation::CyclicDependency {
            types: blocked.into_iter().cloned().collect(),
            cycle: cycle.into_iter().map(|i| types[i].clone()).collect(),
        });
    }

    if !violations.is_empty() {
        debug!(
            selected = selection.len(),
            violations = violations.len(),
            "selection rejected"
        );
        return Err(Violations(violations));
    }

    let steps: Vec<SelectedModule> = order
        .ordered
        .iter()
        .flat_map(|&t| members[t].iter().map(|&m| m.clone()))
        .collect();

    trace!(steps = steps.len(), "provisioning plan computed");
    Ok(ProvisioningPlan { steps })
}
