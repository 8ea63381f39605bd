//! The provisioning gate.
//!
//! Provisioning itself is out of scope for this crate; callers implement
//! [`ProvisioningExecutor`] to create the resources. The gate guarantees the
//! executor only ever sees a plan that passed validation.

use std::future::Future;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::catalog::RequirementCatalog;
use crate::graph::{ProvisioningPlan, SelectionSet, Violations, resolve};

/// Creates the resources of a validated plan, in plan order.
///
/// # Example
///
/// ```ignore
/// struct DryRun;
///
/// impl ProvisioningExecutor for DryRun {
///     type Error = std::convert::Infallible;
///
///     async fn execute(&self, plan: &ProvisioningPlan) -> Result<(), Self::Error> {
///         for step in &plan.steps {
///             println!("would create {} ({})", step.instance, step.module_type);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait ProvisioningExecutor {
    /// The error type returned by this executor.
    type Error;

    fn execute(
        &self,
        plan: &ProvisioningPlan,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Why `provision_if_valid` did not complete.
#[derive(Debug, Error)]
pub enum ProvisionError<E> {
    /// The selection failed validation; the executor was not called.
    #[error(transparent)]
    Invalid(#[from] Violations),

    /// The executor was called and failed.
    #[error("provisioning failed: {0}")]
    Executor(#[source] E),
}

/// Resolves `selection` and hands the plan to `executor`.
///
/// Any violation short-circuits before the executor is touched. On success
/// returns the plan that was executed.
#[instrument(skip_all, fields(instances = selection.len()))]
pub async fn provision_if_valid<X>(
    selection: &SelectionSet,
    catalog: &RequirementCatalog,
    executor: &X,
) -> Result<ProvisioningPlan, ProvisionError<X::Error>>
where
    X: ProvisioningExecutor,
{
    let plan = match resolve(selection, catalog) {
        Ok(plan) => plan,
        Err(violations) => {
            warn!(violations = violations.len(), "refusing to provision: {}", violations);
            return Err(violations.into());
        }
    };

    info!(steps = plan.len(), "provisioning validated plan");
    executor
        .execute(&plan)
        .await
        .map_err(ProvisionError::Executor)?;
    Ok(plan)
}
