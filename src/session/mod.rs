//! Async session runtime.
//!
//! Runs the cascade resolver against a live inventory: every placed instance
//! gets a dedicated worker task that owns its state and dispatches option
//! fetches, so instances never block each other.
//!
//! # Module Structure
//!
//! - [`config`]: Timeouts, retry, and buffer sizes
//! - [`message`]: Worker messages and the [`SessionEvent`] stream
//! - `worker`: The per-instance event loop
//! - `session`: The [`Session`] dispatcher

pub mod config;
pub mod message;
#[allow(clippy::module_inception)]
mod session;
mod worker;

pub use config::SessionConfig;
pub use message::SessionEvent;
pub use session::{Result, Session, SessionError};
