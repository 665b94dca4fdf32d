//! Configuration for the interactive query service.
//!
//! Two pieces of external configuration feed the service:
//!
//! - the free-form engine `configuration` map, of which only
//!   [`APPLICATION_SERVER_CONFIG`] is read here, and
//! - [`StateStoreRetry`], which bounds how long a store lookup may wait for a
//!   store that is not yet queryable.
//!
//! ```rust
//! use streamweave_query::config::InteractiveQueryConfig;
//!
//! let config = InteractiveQueryConfig::from_json(
//!   r#"{
//!     "configuration": { "application.server": "10.0.0.5:7070" },
//!     "state-store-retry": { "max-attempts": 5, "backoff-period": 250 }
//!   }"#,
//! )
//! .unwrap();
//! assert_eq!(config.state_store_retry.max_attempts, 5);
//! assert_eq!(config.application_server(), Some("10.0.0.5:7070"));
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration key holding the advertised `<host>:<port>` of this instance.
pub const APPLICATION_SERVER_CONFIG: &str = "application.server";

/// Bounded retry settings for state store lookups.
///
/// `max_attempts` counts full registry scans, so the worst-case wait before a
/// lookup gives up is `backoff_period * (max_attempts - 1)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StateStoreRetry {
  /// Maximum number of attempts (>= 1).
  pub max_attempts: u32,
  /// Fixed pause between attempts, in milliseconds when serialized.
  #[serde(with = "duration_millis")]
  pub backoff_period: Duration,
}

impl Default for StateStoreRetry {
  fn default() -> Self {
    Self {
      max_attempts: 1,
      backoff_period: Duration::from_millis(1000),
    }
  }
}

impl StateStoreRetry {
  /// Creates retry settings with the given attempts and backoff.
  pub fn new(max_attempts: u32, backoff_period: Duration) -> Self {
    Self {
      max_attempts,
      backoff_period,
    }
  }

  /// Validates the settings: at least one attempt.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.max_attempts == 0 {
      return Err(ConfigError::InvalidMaxAttempts(self.max_attempts));
    }
    Ok(())
  }

  /// Upper bound on time spent sleeping between attempts.
  pub fn worst_case_wait(&self) -> Duration {
    self.backoff_period * self.max_attempts.saturating_sub(1)
  }
}

/// Configuration for [`InteractiveQueryService`](crate::service::InteractiveQueryService).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InteractiveQueryConfig {
  /// Engine configuration properties (e.g. `application.server`).
  pub configuration: HashMap<String, String>,
  /// Retry settings for store lookups.
  pub state_store_retry: StateStoreRetry,
}

impl InteractiveQueryConfig {
  /// Parses a JSON configuration document.
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
  }

  /// Sets the advertised `application.server` value.
  pub fn with_application_server(mut self, server: impl Into<String>) -> Self {
    self
      .configuration
      .insert(APPLICATION_SERVER_CONFIG.to_string(), server.into());
    self
  }

  /// Sets the store lookup retry settings.
  pub fn with_state_store_retry(mut self, retry: StateStoreRetry) -> Self {
    self.state_store_retry = retry;
    self
  }

  /// Returns the raw `application.server` value, if configured.
  pub fn application_server(&self) -> Option<&str> {
    self
      .configuration
      .get(APPLICATION_SERVER_CONFIG)
      .map(String::as_str)
  }

  /// Validates the retry settings.
  ///
  /// `application.server` is not checked here; a malformed value surfaces
  /// from `current_host` only.
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.state_store_retry.validate()
  }
}

mod duration_millis {
  use serde::{Deserialize, Deserializer, Serializer};
  use std::time::Duration;

  pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    Ok(Duration::from_millis(u64::deserialize(d)?))
  }
}
