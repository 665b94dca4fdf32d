//! # Engine Registry
//!
//! Process-wide set of the engines currently running. The lifecycle controller
//! that starts and stops engines registers each one once it is started and
//! deregisters it when it stops or fails; queries iterate a snapshot.
//!
//! The registry holds **non-owning** references ([`Weak`]): dropping the last
//! owner of an engine is enough to make it disappear from future snapshots,
//! even if nobody deregistered it.
//!
//! ```rust
//! use std::sync::Arc;
//! use streamweave_query::engine::Engine;
//! use streamweave_query::local_engine::LocalEngine;
//! use streamweave_query::registry::EngineRegistry;
//!
//! let registry = EngineRegistry::new();
//! let engine = Arc::new(LocalEngine::new());
//! registry.register(engine.clone());
//! assert_eq!(registry.len(), 1);
//! registry.deregister(engine.id());
//! assert!(registry.is_empty());
//! ```

use crate::engine::{Engine, EngineId};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::debug;

/// Concurrent set of registered engines, unique by [`EngineId`].
///
/// Snapshots list engines in registration order.
#[derive(Default)]
pub struct EngineRegistry {
  engines: RwLock<Vec<(EngineId, Weak<dyn Engine>)>>,
}

impl EngineRegistry {
  /// Creates an empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds `engine` if no engine with the same id is registered.
  ///
  /// Registering twice is a no-op. Only a weak reference is kept; the
  /// passed `Arc` is dropped before returning.
  pub fn register(&self, engine: Arc<dyn Engine>) {
    let id = engine.id();
    let mut engines = self.engines.write().unwrap_or_else(PoisonError::into_inner);
    engines.retain(|(_, weak)| weak.strong_count() > 0);
    if engines.iter().any(|(existing, _)| *existing == id) {
      return;
    }
    engines.push((id, Arc::downgrade(&engine)));
    debug!(engine = %id, registered = engines.len(), "engine registered");
  }

  /// Removes the engine with `id`, if present.
  ///
  /// Deregistering an absent engine is a no-op.
  pub fn deregister(&self, id: EngineId) {
    let mut engines = self.engines.write().unwrap_or_else(PoisonError::into_inner);
    let before = engines.len();
    engines.retain(|(existing, weak)| *existing != id && weak.strong_count() > 0);
    if engines.len() != before {
      debug!(engine = %id, registered = engines.len(), "engine deregistered");
    }
  }

  /// Returns the engines registered at call time that are still alive.
  ///
  /// The returned vector is independent of the registry: later
  /// registrations and deregistrations do not affect it.
  pub fn all(&self) -> Vec<Arc<dyn Engine>> {
    self
      .engines
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .filter_map(|(_, weak)| weak.upgrade())
      .collect()
  }

  /// Returns true if an engine with `id` is registered and alive.
  pub fn contains(&self, id: EngineId) -> bool {
    self
      .engines
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .any(|(existing, weak)| *existing == id && weak.strong_count() > 0)
  }

  /// Number of registered engines that are still alive.
  pub fn len(&self) -> usize {
    self
      .engines
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .filter(|(_, weak)| weak.strong_count() > 0)
      .count()
  }

  /// True if no live engine is registered.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl std::fmt::Debug for EngineRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let ids: Vec<EngineId> = self
      .engines
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .map(|(id, _)| *id)
      .collect();
    f.debug_struct("EngineRegistry").field("engines", &ids).finish()
  }
}
