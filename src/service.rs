//! # Interactive Query Service
//!
//! The façade applications use to query the state of the engines running in
//! this process, and to find out which instance to ask when the data lives
//! elsewhere.
//!
//! ```rust
//! use std::sync::Arc;
//! use streamweave_query::config::InteractiveQueryConfig;
//! use streamweave_query::local_engine::LocalEngine;
//! use streamweave_query::partitioning::StringEncoder;
//! use streamweave_query::registry::EngineRegistry;
//! use streamweave_query::service::InteractiveQueryService;
//! use streamweave_query::store::{key_value_store, InMemoryKeyValueStore};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = Arc::new(EngineRegistry::new());
//! let engine = Arc::new(LocalEngine::new());
//! let counts = Arc::new(InMemoryKeyValueStore::<String, u64>::new());
//! counts.put("alice".to_string(), 3);
//! engine.add_store(counts.handle("counts"));
//! engine.start().unwrap();
//! engine.finish_rebalance().unwrap();
//! registry.register(engine.clone());
//!
//! let service = InteractiveQueryService::new(
//!   registry,
//!   InteractiveQueryConfig::default().with_application_server("localhost:7070"),
//! )
//! .unwrap();
//!
//! let store = service
//!   .queryable_store("counts", &key_value_store::<String, u64>())
//!   .await
//!   .unwrap();
//! assert_eq!(store.get(&"alice".to_string()), Some(3));
//! assert_eq!(service.current_host_info().unwrap().unwrap().port(), 7070);
//! assert_eq!(service.host_info("counts", "alice", &StringEncoder), None);
//! # }
//! ```

use crate::config::InteractiveQueryConfig;
use crate::error::{ConfigError, QueryError};
use crate::host::HostInfo;
use crate::locator::LocalStoreLocator;
use crate::partitioning::KeyEncoder;
use crate::registry::EngineRegistry;
use crate::resolver::HostResolver;
use crate::retry::RetryPolicy;
use crate::store::QueryableStoreType;
use std::sync::Arc;
use tracing::debug;

/// Entry point for interactive queries.
///
/// Cheap to clone; all clones share the same registry.
///
/// Routing answers need `application.server` in the service configuration.
/// Without it [`host_info`](Self::host_info) and
/// [`all_hosts_info`](Self::all_hosts_info) answer nothing, whatever the
/// engines advertise. Each engine additionally advertises its own endpoint
/// (see [`LocalEngine::with_application_server`]), which should be the same
/// value for engines of this process.
///
/// [`LocalEngine::with_application_server`]: crate::local_engine::LocalEngine::with_application_server
#[derive(Clone, Debug)]
pub struct InteractiveQueryService {
  locator: LocalStoreLocator,
  resolver: HostResolver,
  retry: RetryPolicy,
  routing_enabled: bool,
}

impl InteractiveQueryService {
  /// Creates the service over `registry`.
  ///
  /// Fails if the retry settings are invalid. A malformed
  /// `application.server` is only reported by [`current_host_info`].
  ///
  /// [`current_host_info`]: InteractiveQueryService::current_host_info
  pub fn new(registry: Arc<EngineRegistry>, config: InteractiveQueryConfig) -> Result<Self, ConfigError> {
    let retry = RetryPolicy::try_from(&config.state_store_retry)?;
    let application_server = config.application_server().map(str::to_string);
    let routing_enabled = application_server.is_some();
    debug!(
      max_attempts = retry.max_attempts(),
      backoff_ms = retry.backoff_period().as_millis() as u64,
      application_server = application_server.as_deref().unwrap_or("<unset>"),
      "interactive query service created"
    );
    Ok(Self {
      locator: LocalStoreLocator::new(registry.clone()),
      resolver: HostResolver::new(registry, application_server),
      retry,
      routing_enabled,
    })
  }

  /// Returns a queryable store named `name` of the given kind.
  ///
  /// Scans the registered engines until one hands out a matching store, up to
  /// the configured attempt budget. When several engines host the store, the
  /// last one in registration order wins.
  pub async fn queryable_store<Q: QueryableStoreType>(&self, name: &str, kind: &Q) -> Result<Q::Store, QueryError> {
    self
      .locator
      .find(name, kind, &self.retry)
      .await
      .map_err(|exhausted| QueryError::StoreUnavailable {
        store: name.to_string(),
        attempts: exhausted.attempts,
        cause: exhausted.last,
      })
  }

  /// Returns this instance's advertised endpoint, or `None` if
  /// `application.server` is not configured.
  pub fn current_host_info(&self) -> Result<Option<HostInfo>, QueryError> {
    Ok(self.resolver.current_host()?)
  }

  /// Returns the instance hosting `key` in `store`, if any engine knows it.
  ///
  /// `None` when `application.server` is not configured.
  pub fn host_info<K, E>(&self, store: &str, key: &K, encoder: &E) -> Option<HostInfo>
  where
    K: ?Sized,
    E: KeyEncoder<K> + ?Sized,
  {
    if !self.routing_enabled {
      return None;
    }
    self.resolver.owner_of(store, key, encoder)
  }

  /// Returns every instance hosting a partition of `store`.
  ///
  /// Empty when `application.server` is not configured.
  pub fn all_hosts_info(&self, store: &str) -> Vec<HostInfo> {
    if !self.routing_enabled {
      return Vec::new();
    }
    self.resolver.all_owners(store)
  }

  /// Returns the registry the service queries.
  pub fn registry(&self) -> &Arc<EngineRegistry> {
    self.locator.registry()
  }

  /// Returns the retry policy used by [`queryable_store`](Self::queryable_store).
  pub fn retry_policy(&self) -> &RetryPolicy {
    &self.retry
  }
}
