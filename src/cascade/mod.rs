//! Cascading field resolution for module instances.
//!
//! Keeps interdependent configuration fields consistent: writing a trigger
//! field clears every field downstream of it and schedules refetches of
//! their option sets.
//!
//! # Architecture
//!
//! The resolver follows the effects-as-data pattern:
//! - [`CascadeResolver`] computes transitions on an [`InstanceState`] and
//!   returns [`FetchRequest`] values; it performs no I/O
//! - the session worker dispatches the requests and feeds results back
//!   through [`CascadeResolver::on_fetch_result`]
//!
//! # Key Invariants
//!
//! 1. **Same-step invalidation**: everything reachable from a written field
//!    is cleared before `update` returns.
//!
//! 2. **Tagged results**: every request carries a [`FetchTag`](crate::types::FetchTag).
//!    Only the result whose tag matches the option set's pending tag can make
//!    it `Ready`; anything else is discarded.

pub mod resolver;

pub use resolver::{
    CascadeResolver, DEFAULT_SENTINEL, DiscardReason, FetchOutcome, FetchRequest, InstanceState,
    UpdateOutcome,
};
