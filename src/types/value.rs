//! Field values and per-instance module configuration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::FieldName;

/// The value held by one configuration field.
///
/// The resolver never inspects field contents beyond emptiness and the
/// "use default" sentinel; validating contents is the caller's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Cleared or never set. Serializes as `null`.
    #[default]
    Empty,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl FieldValue {
    /// Creates a text value.
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    /// Returns true for `Empty` and for the empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Bool(_) | FieldValue::Number(_) => false,
        }
    }

    /// Returns the text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value as a parent selector for an inventory lookup.
    ///
    /// Returns `None` for empty values.
    pub fn as_selector(&self) -> Option<String> {
        match self {
            FieldValue::Empty => None,
            FieldValue::Text(s) if s.is_empty() => None,
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Number(n) => Some(n.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Empty => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n.into())
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        FieldValue::Number(n.into())
    }
}

static EMPTY: FieldValue = FieldValue::Empty;

/// Field name to value mapping for one module instance.
///
/// Missing fields read as [`FieldValue::Empty`]. Clearing a field removes it,
/// so a cleared config and a never-written config compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleConfig {
    fields: BTreeMap<FieldName, FieldValue>,
}

impl ModuleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `field`, or `Empty` if unset.
    pub fn get(&self, field: &FieldName) -> &FieldValue {
        self.fields.get(field).unwrap_or(&EMPTY)
    }

    /// Writes `value` into `field`. Writing an empty value clears the field.
    pub fn set(&mut self, field: FieldName, value: FieldValue) {
        if value == FieldValue::Empty {
            self.fields.remove(&field);
        } else {
            self.fields.insert(field, value);
        }
    }

    /// Clears `field` back to its empty value.
    pub fn clear(&mut self, field: &FieldName) {
        self.fields.remove(field);
    }

    /// Iterates over the fields that hold a value, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &FieldValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::arb_field_value;
    use proptest::prelude::*;

    mod field_value {
        use super::*;

        #[test]
        fn empty_string_is_empty() {
            assert!(FieldValue::text("").is_empty());
            assert!(FieldValue::Empty.is_empty());
            assert!(!FieldValue::Bool(false).is_empty());
            assert!(!FieldValue::from(0i64).is_empty());
        }

        #[test]
        fn selector_renders_scalars() {
            assert_eq!(FieldValue::text("vnet-a").as_selector().as_deref(), Some("vnet-a"));
            assert_eq!(FieldValue::from(3u64).as_selector().as_deref(), Some("3"));
            assert_eq!(FieldValue::Bool(true).as_selector().as_deref(), Some("true"));
            assert_eq!(FieldValue::text("").as_selector(), None);
            assert_eq!(FieldValue::Empty.as_selector(), None);
        }

        #[test]
        fn deserializes_untagged_json() {
            let values: Vec<FieldValue> =
                serde_json::from_str(r#"[null, true, 2, "Standard_B2s"]"#).unwrap();
            assert_eq!(
                values,
                vec![
                    FieldValue::Empty,
                    FieldValue::Bool(true),
                    FieldValue::from(2u64),
                    FieldValue::text("Standard_B2s"),
                ]
            );
        }

        proptest! {
            #[test]
            fn selector_is_none_exactly_when_empty(value in arb_field_value()) {
                prop_assert_eq!(value.as_selector().is_none(), value.is_empty());
            }
        }
    }

    mod module_config {
        use super::*;

        #[test]
        fn unset_field_reads_empty() {
            let config = ModuleConfig::new();
            assert_eq!(config.get(&FieldName::from("vnet")), &FieldValue::Empty);
        }

        #[test]
        fn clear_removes_value() {
            let mut config = ModuleConfig::new();
            config.set(FieldName::from("vnet"), FieldValue::text("vnet-a"));
            assert_eq!(config.len(), 1);

            config.clear(&FieldName::from("vnet"));

            assert!(config.is_empty());
            assert_eq!(config, ModuleConfig::new());
        }

        #[test]
        fn setting_empty_value_clears() {
            let mut config = ModuleConfig::new();
            config.set(FieldName::from("vnet"), FieldValue::text("vnet-a"));
            config.set(FieldName::from("vnet"), FieldValue::Empty);
            assert!(config.is_empty());
        }

        #[test]
        fn empty_text_is_kept_as_written() {
            // Only `Empty` removes the entry; "" is a written value that reads as empty.
            let mut config = ModuleConfig::new();
            config.set(FieldName::from("vnet"), FieldValue::text(""));
            assert_eq!(config.len(), 1);
            assert!(config.get(&FieldName::from("vnet")).is_empty());
        }
    }
}
