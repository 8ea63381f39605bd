//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of identifiers (e.g., passing a field
//! name where a module type is expected) and make signatures self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one placed module instance within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for InstanceId {
    fn from(n: u64) -> Self {
        InstanceId(n)
    }
}

/// A canonical module type identifier from the catalog (e.g. `vnet`, `aks`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleType(pub String);

impl ModuleType {
    pub fn new(s: impl Into<String>) -> Self {
        ModuleType(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleType {
    fn from(s: &str) -> Self {
        ModuleType(s.to_string())
    }
}

impl From<String> for ModuleType {
    fn from(s: String) -> Self {
        ModuleType(s)
    }
}

/// The name of a configuration field within one module's config.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldName(pub String);

impl FieldName {
    pub fn new(s: impl Into<String>) -> Self {
        FieldName(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldName {
    fn from(s: &str) -> Self {
        FieldName(s.to_string())
    }
}

impl From<String> for FieldName {
    fn from(s: String) -> Self {
        FieldName(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod instance_id {
        use super::*;

        proptest! {
            #[test]
            fn display_format(n: u64) {
                prop_assert_eq!(format!("{}", InstanceId(n)), format!("#{}", n));
            }

            #[test]
            fn ordering_matches_underlying(a: u64, b: u64) {
                prop_assert_eq!(InstanceId(a).cmp(&InstanceId(b)), a.cmp(&b));
            }
        }
    }

    mod module_type {
        use super::*;

        #[test]
        fn serializes_as_bare_string() {
            let json = serde_json::to_string(&ModuleType::from("vnet")).unwrap();
            assert_eq!(json, "\"vnet\"");
        }

        proptest! {
            #[test]
            fn display_is_identity(s in "[a-z_]{1,20}") {
                prop_assert_eq!(ModuleType::new(&s).to_string(), s);
            }
        }
    }

    mod field_name {
        use super::*;

        #[test]
        fn from_str_and_string_agree() {
            assert_eq!(FieldName::from("subnet"), FieldName::from("subnet".to_string()));
            assert_eq!(FieldName::new("subnet").as_str(), "subnet");
        }
    }
}
