//! Static catalog data: cascade rules and module requirements.
//!
//! Both tables are read-only for the lifetime of a session and are shared by
//! reference (`Arc`) between the session and every instance worker. They are
//! validated when built, so the resolver and validator can rely on their
//! shape without re-checking.

pub mod builtin;
mod requirements;
mod rules;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{FieldName, ModuleType};

pub use requirements::{ModuleDescriptor, RequirementCatalog};
pub use rules::{CascadeRule, RootOptionSource, RuleTable};

/// A kind of inventory resource an option set can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OptionKind {
    Account,
    Network,
    Subnet,
    Other(String),
}

impl OptionKind {
    pub fn as_str(&self) -> &str {
        match self {
            OptionKind::Account => "account",
            OptionKind::Network => "network",
            OptionKind::Subnet => "subnet",
            OptionKind::Other(s) => s,
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for OptionKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "account" => OptionKind::Account,
            "network" => OptionKind::Network,
            "subnet" => OptionKind::Subnet,
            _ => OptionKind::Other(s),
        }
    }
}

impl From<&str> for OptionKind {
    fn from(s: &str) -> Self {
        OptionKind::from(s.to_string())
    }
}

impl From<OptionKind> for String {
    fn from(kind: OptionKind) -> Self {
        match kind {
            OptionKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

/// Errors building a catalog table.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate cascade rule for `{module_type}`: {trigger} -> {dependent}")]
    DuplicateRule {
        module_type: ModuleType,
        trigger: FieldName,
        dependent: FieldName,
    },

    #[error("field `{field}` of `{module_type}` is governed by both `{first}` and `{second}`")]
    ConflictingTrigger {
        module_type: ModuleType,
        field: FieldName,
        first: FieldName,
        second: FieldName,
    },

    #[error("root option source `{module_type}.{field}` is declared more than once")]
    DuplicateRootSource {
        module_type: ModuleType,
        field: FieldName,
    },

    #[error("root option source `{module_type}.{field}` is also governed by `{trigger}`")]
    GovernedRootSource {
        module_type: ModuleType,
        field: FieldName,
        trigger: FieldName,
    },

    #[error("cascade rules for `{module_type}` form a cycle: {}", render_cycle(.cycle))]
    RuleCycle {
        module_type: ModuleType,
        cycle: Vec<FieldName>,
    },

    #[error("module type `{0}` is declared more than once")]
    DuplicateModule(ModuleType),

    #[error("`{module_type}` requires undeclared module type `{requirement}`")]
    UnknownRequirement {
        module_type: ModuleType,
        requirement: ModuleType,
    },

    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

fn render_cycle(cycle: &[FieldName]) -> String {
    let mut out: Vec<&str> = cycle.iter().map(FieldName::as_str).collect();
    if let Some(first) = cycle.first() {
        out.push(first.as_str());
    }
    out.join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_kind_round_trips_known_and_custom_names() {
        for name in ["account", "network", "subnet", "resource_group"] {
            let kind = OptionKind::from(name);
            assert_eq!(kind.as_str(), name);
            assert_eq!(String::from(kind), name);
        }
        assert_eq!(OptionKind::from("network"), OptionKind::Network);
        assert_eq!(
            OptionKind::from("resource_group"),
            OptionKind::Other("resource_group".to_string())
        );
    }

    #[test]
    fn option_kind_serializes_as_bare_string() {
        let json = serde_json::to_string(&OptionKind::Subnet).unwrap();
        assert_eq!(json, "\"subnet\"");
        let kind: OptionKind = serde_json::from_str("\"account\"").unwrap();
        assert_eq!(kind, OptionKind::Account);
    }

    #[test]
    fn rule_cycle_message_closes_the_loop() {
        let err = CatalogError::RuleCycle {
            module_type: ModuleType::from("vm"),
            cycle: vec![FieldName::from("vnet"), FieldName::from("subnet")],
        };
        assert_eq!(
            err.to_string(),
            "cascade rules for `vm` form a cycle: vnet -> subnet -> vnet"
        );
    }
}
