//! Core domain types for the provisioning configuration core.
//!
//! This module contains the identifiers, field values, and option-set types
//! shared by the cascade resolver, the dependency graph validator, and the
//! session runtime.

pub mod ids;
pub mod options;
pub mod value;

// Re-export commonly used types at the module level
pub use ids::{FieldName, InstanceId, ModuleType};
pub use options::{FetchTag, OptionItem, OptionSet, OptionSetState};
pub use value::{FieldValue, ModuleConfig};
