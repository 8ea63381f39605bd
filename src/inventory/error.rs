//! Inventory fetch failure types.
//!
//! A fetch failure never aborts anything: it is stored on the option set as
//! data and rendered by the presentation layer. The transient/permanent split
//! only drives the retry loop inside one dispatched fetch.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of inventory failure, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Safe to retry with backoff.
    ///
    /// Examples:
    /// - HTTP 5xx
    /// - HTTP 429 (throttled)
    /// - Timeouts and connection resets
    Transient,

    /// Retrying the same request will not help.
    ///
    /// Examples:
    /// - Parent resource not found (404)
    /// - Authorization failures (401, 403)
    /// - Malformed responses
    Permanent,
}

impl FailureKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

/// An inventory fetch failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub struct FetchFailure {
    pub kind: FailureKind,

    /// The HTTP status code reported by the transport, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Message attached to the option set for display.
    pub message: String,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "inventory fetch failed (HTTP {}): {}", code, self.message),
            None => write!(f, "inventory fetch failed: {}", self.message),
        }
    }
}

impl FetchFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        FetchFailure {
            kind: FailureKind::Transient,
            status_code: None,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        FetchFailure {
            kind: FailureKind::Permanent,
            status_code: None,
            message: message.into(),
        }
    }

    /// A fetch that did not complete within the configured timeout.
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::transient(format!("no response after {}ms", after.as_millis()))
    }

    /// Categorizes a failed HTTP response by status code.
    ///
    /// 408, 429 and 5xx are transient; every other status is permanent.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let kind = match status_code {
            408 | 429 => FailureKind::Transient,
            code if (500..600).contains(&code) => FailureKind::Transient,
            _ => FailureKind::Permanent,
        };
        FetchFailure {
            kind,
            status_code: Some(status_code),
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_retriable()
    }
}
