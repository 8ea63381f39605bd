//! Provision Core - the configuration core of a cloud provisioning console.
//!
//! Keeps interdependent module fields consistent as the operator edits them
//! (cascading invalidation and tagged refetch of option lists) and turns the
//! operator's module selection into a dependency-ordered provisioning plan.
//!
//! - [`cascade`]: the cascade resolver over per-instance state
//! - [`graph`]: selection validation and plan ordering
//! - [`session`]: the async runtime driving an [`inventory::InventoryClient`]

pub mod cascade;
pub mod catalog;
pub mod graph;
pub mod inventory;
pub mod provision;
pub mod session;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use cascade::{CascadeResolver, FetchRequest, InstanceState, UpdateOutcome};
pub use catalog::{RequirementCatalog, RuleTable};
pub use graph::{ProvisioningPlan, SelectionSet, Violation, Violations, resolve};
pub use provision::{ProvisionError, ProvisioningExecutor, provision_if_valid};
pub use session::{Session, SessionConfig, SessionError, SessionEvent};
