//! The inventory collaborator: where option lists come from.
//!
//! The transport (cloud provider SDK, REST proxy, fixture file) is not part of
//! this crate. Callers implement [`InventoryClient`] and the session runtime
//! drives it with timeouts, retry, and cancellation.

mod error;
mod retry;

use std::collections::HashMap;
use std::future::Future;

pub use error::{FailureKind, FetchFailure};
pub use retry::{InvalidBackoffMultiplier, RetryConfig, RetryPolicy, RetryResult, retry_with_backoff};

use crate::catalog::OptionKind;
use crate::types::OptionItem;

/// Fetches option lists for a kind of resource under a parent selector.
///
/// `parent` is the governing trigger field's value at dispatch time (a
/// subscription for networks, a network for subnets), or `None` for root
/// sources such as the account list.
///
/// Implementations must tolerate overlapping calls with different parents:
/// a later call may be issued before an earlier one resolves, and results may
/// come back in any order.
///
/// # Example (fixed data)
///
/// ```ignore
/// struct Fixture(Vec<OptionItem>);
///
/// impl InventoryClient for Fixture {
///     async fn fetch_options(
///         &self,
///         _kind: OptionKind,
///         _parent: Option<String>,
///     ) -> Result<Vec<OptionItem>, FetchFailure> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
pub trait InventoryClient: Send + Sync + 'static {
    fn fetch_options(
        &self,
        kind: OptionKind,
        parent: Option<String>,
    ) -> impl Future<Output = Result<Vec<OptionItem>, FetchFailure>> + Send;
}

/// An inventory backed by a fixed in-memory table.
///
/// Lookups for an unknown `(kind, parent)` pair fail permanently with a
/// not-found failure, the way a real provider answers 404 for a missing parent.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    entries: HashMap<(OptionKind, Option<String>), Vec<OptionItem>>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the options returned for `kind` under `parent`.
    pub fn with_options(
        mut self,
        kind: OptionKind,
        parent: Option<&str>,
        options: Vec<OptionItem>,
    ) -> Self {
        self.entries
            .insert((kind, parent.map(str::to_string)), options);
        self
    }
}

impl InventoryClient for StaticInventory {
    async fn fetch_options(
        &self,
        kind: OptionKind,
        parent: Option<String>,
    ) -> Result<Vec<OptionItem>, FetchFailure> {
        let key = (kind, parent);
        match self.entries.get(&key) {
            Some(options) => Ok(options.clone()),
            None => Err(FetchFailure::from_status(
                404,
                format!(
                    "no {} under {}",
                    key.0,
                    key.1.as_deref().unwrap_or("<root>")
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_inventory_returns_registered_options() {
        let inventory = StaticInventory::new().with_options(
            OptionKind::Subnet,
            Some("vnet-a"),
            vec![OptionItem::new("subnet-1", "default")],
        );

        let options = inventory
            .fetch_options(OptionKind::Subnet, Some("vnet-a".to_string()))
            .await
            .unwrap();

        assert_eq!(options, vec![OptionItem::new("subnet-1", "default")]);
    }

    #[tokio::test]
    async fn static_inventory_missing_parent_is_permanent_404() {
        let inventory = StaticInventory::new();

        let failure = inventory
            .fetch_options(OptionKind::Network, Some("sub-1".to_string()))
            .await
            .unwrap_err();

        assert!(!failure.is_transient());
        assert_eq!(failure.status_code, Some(404));
        assert!(failure.message.contains("network under sub-1"));
    }
}
