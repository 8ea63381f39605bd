//! Module dependency graph validation.
//!
//! Given the operator's selection and the requirement catalog, [`resolve`]
//! either produces a [`ProvisioningPlan`] (prerequisites first) or the
//! [`Violations`] that block provisioning. It is pure and cheap enough to call
//! on every selection change.

mod selection;
pub mod topology;
mod validation;

pub use selection::{ProvisioningPlan, SelectedModule, SelectionSet};
pub use validation::{EmptyViolations, Violation, Violations, resolve};
