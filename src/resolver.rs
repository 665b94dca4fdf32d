//! Host resolution: which instance to ask for a key or a store.

use crate::error::ConfigError;
use crate::host::{HostInfo, StreamsMetadata};
use crate::partitioning::KeyEncoder;
use crate::registry::EngineRegistry;
use std::sync::Arc;
use tracing::trace;

/// Answers routing questions from the metadata the registered engines hold.
#[derive(Clone, Debug)]
pub struct HostResolver {
  registry: Arc<EngineRegistry>,
  application_server: Option<String>,
}

impl HostResolver {
  /// Creates a resolver. `application_server` is this process's raw
  /// `application.server` value, if configured.
  pub fn new(registry: Arc<EngineRegistry>, application_server: Option<String>) -> Self {
    Self {
      registry,
      application_server,
    }
  }

  /// Parses the local `application.server` setting.
  ///
  /// `Ok(None)` when the setting is absent.
  pub fn current_host(&self) -> Result<Option<HostInfo>, ConfigError> {
    self
      .application_server
      .as_deref()
      .map(|server| server.parse::<HostInfo>())
      .transpose()
  }

  /// Returns the instance owning the partition of `store` that holds `key`.
  ///
  /// The key is encoded once with `encoder`; engines are then asked in
  /// registration order and the first one that knows the owner answers.
  pub fn owner_of<K, E>(&self, store: &str, key: &K, encoder: &E) -> Option<HostInfo>
  where
    K: ?Sized,
    E: KeyEncoder<K> + ?Sized,
  {
    let engines = self.registry.all();
    if engines.is_empty() {
      return None;
    }
    let encoded = encoder.encode(store, key);
    engines.iter().find_map(|engine| {
      let owner = engine
        .metadata_for_key(store, &encoded)
        .and_then(StreamsMetadata::into_host_info);
      if owner.is_none() {
        trace!(engine = %engine.id(), store, "owner unknown");
      }
      owner
    })
  }

  /// Returns the hosts of every instance holding a partition of `store`.
  ///
  /// Concatenated across engines in registration order; an instance seen by
  /// several engines appears once per engine.
  pub fn all_owners(&self, store: &str) -> Vec<HostInfo> {
    self
      .registry
      .all()
      .iter()
      .flat_map(|engine| engine.all_metadata_for_store(store))
      .filter_map(StreamsMetadata::into_host_info)
      .collect()
  }
}
