//! # Error Types
//!
//! Errors that cross the [`InteractiveQueryService`](crate::service::InteractiveQueryService)
//! boundary. Per-engine failures never show up here directly: they are absorbed
//! by the locator and the resolver, and only two conditions escape:
//!
//! - **Retry exhaustion** ([`QueryError::StoreUnavailable`]): every attempt to
//!   find a ready store failed. The last transient cause is kept as the error
//!   source so "never existed" can be told apart from "not ready yet".
//! - **Configuration** ([`QueryError::Configuration`]): a static misconfiguration
//!   such as a malformed `application.server` value. Never retried.

use crate::engine::StoreNotAvailable;
use thiserror::Error;

/// Error type for invalid query service configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
  /// `application.server` is present but not of the form `<host>:<port>`.
  #[error("malformed application.server value {value:?}: {reason}")]
  MalformedApplicationServer {
    /// The raw configured value.
    value: String,
    /// What is wrong with it.
    reason: String,
  },
  /// State store retry was configured with zero attempts.
  #[error("state store retry max attempts must be >= 1, got {0}")]
  InvalidMaxAttempts(u32),
  /// The configuration document could not be parsed.
  #[error("invalid configuration document: {0}")]
  Parse(String),
}

impl ConfigError {
  pub(crate) fn malformed_server(value: &str, reason: impl Into<String>) -> Self {
    Self::MalformedApplicationServer {
      value: value.to_string(),
      reason: reason.into(),
    }
  }
}

/// Error returned by the interactive query service.
#[derive(Error, Debug)]
pub enum QueryError {
  /// No registered engine produced a usable handle within the retry budget.
  #[error("error when retrieving state store {store}: not available after {attempts} attempt(s)")]
  StoreUnavailable {
    /// Name of the requested store.
    store: String,
    /// Number of full registry scans performed.
    attempts: u32,
    /// Last transient failure observed.
    #[source]
    cause: StoreNotAvailable,
  },
  /// Configuration is present but invalid.
  #[error(transparent)]
  Configuration(#[from] ConfigError),
}

impl QueryError {
  /// Returns the store name for [`QueryError::StoreUnavailable`].
  pub fn store_name(&self) -> Option<&str> {
    match self {
      QueryError::StoreUnavailable { store, .. } => Some(store),
      QueryError::Configuration(_) => None,
    }
  }

  /// Returns true if this is a retry-exhausted store lookup.
  pub fn is_store_unavailable(&self) -> bool {
    matches!(self, QueryError::StoreUnavailable { .. })
  }
}
