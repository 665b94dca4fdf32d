//! # Engine Capability
//!
//! An engine is one running instance of the stream-processing runtime. It owns
//! a subset of partitions and the local state stores materialized from them.
//! The query layer never starts, stops, or owns engines; it only talks to them
//! through the [`Engine`] trait:
//!
//! - [`Engine::store`]: look up a local store by name and kind, answering with
//!   a [`StoreLookup`] (`Found`, `NotAvailable`, or `Absent`) instead of failing.
//! - [`Engine::metadata_for_key`]: who owns the partition holding an (encoded) key.
//! - [`Engine::all_metadata_for_store`]: every instance hosting part of a store.

use crate::host::StreamsMetadata;
use crate::store::{StoreDescriptor, StoreHandle};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-local identity of an engine instance.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EngineId(u64);

impl EngineId {
  /// Creates an id from a raw value.
  pub const fn new(id: u64) -> Self {
    Self(id)
  }

  /// Allocates a fresh, process-unique id.
  pub fn next() -> Self {
    Self(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed))
  }

  /// Returns the raw value.
  pub const fn as_u64(self) -> u64 {
    self.0
  }
}

impl fmt::Display for EngineId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "engine-{}", self.0)
  }
}

/// Lifecycle state of an engine.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EngineState {
  /// Built but not started.
  Created,
  /// Started; partitions are being (re)assigned.
  Rebalancing,
  /// Processing with a stable assignment.
  Running,
  /// Shut down.
  Stopped,
  /// Terminated after an unrecoverable error.
  Failed,
}

impl EngineState {
  /// True while the engine is started and not yet shut down.
  pub fn is_alive(self) -> bool {
    matches!(self, EngineState::Rebalancing | EngineState::Running)
  }
}

impl fmt::Display for EngineState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      EngineState::Created => "created",
      EngineState::Rebalancing => "rebalancing",
      EngineState::Running => "running",
      EngineState::Stopped => "stopped",
      EngineState::Failed => "failed",
    };
    f.write_str(name)
  }
}

/// Why a store could not be handed out.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UnavailableReason {
  /// No engine was registered at lookup time.
  NoEngines,
  /// No registered engine hosts a store with this name.
  NotHosted,
  /// The engine is not in a queryable state.
  EngineNotRunning(EngineState),
  /// The store exists but is still being restored or migrated.
  Restoring,
  /// The store exists with a different shape or types than requested.
  WrongStoreType {
    /// Requested kind.
    expected: StoreDescriptor,
    /// Kind the engine actually hosts.
    actual: StoreDescriptor,
  },
}

impl fmt::Display for UnavailableReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      UnavailableReason::NoEngines => write!(f, "no engines are registered"),
      UnavailableReason::NotHosted => write!(f, "no registered engine hosts the store"),
      UnavailableReason::EngineNotRunning(state) => write!(f, "engine is {}", state),
      UnavailableReason::Restoring => write!(f, "store is restoring"),
      UnavailableReason::WrongStoreType { expected, actual } => {
        write!(f, "requested {} but store is {}", expected, actual)
      }
    }
  }
}

/// Transient signal that a store exists logically but cannot be queried yet.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
#[error("state store {store} is not available{}: {reason}", engine_suffix(.engine))]
pub struct StoreNotAvailable {
  /// Store name.
  pub store: String,
  /// Engine that reported the condition, if any.
  pub engine: Option<EngineId>,
  /// Underlying condition.
  pub reason: UnavailableReason,
}

fn engine_suffix(engine: &Option<EngineId>) -> String {
  engine.map(|id| format!(" on {}", id)).unwrap_or_default()
}

impl StoreNotAvailable {
  /// Creates a new signal.
  pub fn new(store: impl Into<String>, engine: Option<EngineId>, reason: UnavailableReason) -> Self {
    Self {
      store: store.into(),
      engine,
      reason,
    }
  }
}

/// Result of asking one engine for a store.
#[derive(Clone, Debug)]
pub enum StoreLookup {
  /// The engine hosts the store and it is queryable.
  Found(StoreHandle),
  /// The engine hosts (or may host) the store but cannot serve it right now.
  NotAvailable(StoreNotAvailable),
  /// The engine does not host a store with this name.
  Absent,
}

/// A running stream-processing engine instance, as seen by the query layer.
///
/// Implementations must answer quickly and without blocking on the network:
/// all three lookups are served from locally known assignment metadata.
pub trait Engine: Send + Sync {
  /// Identity, unique within the process.
  fn id(&self) -> EngineId;

  /// Current lifecycle state.
  fn state(&self) -> EngineState;

  /// Looks up the local store `name` of the given kind.
  fn store(&self, name: &str, kind: &StoreDescriptor) -> StoreLookup;

  /// Returns the owner of the partition holding `key` (already encoded) in `store`.
  ///
  /// `None` if the engine does not know the store.
  fn metadata_for_key(&self, store: &str, key: &[u8]) -> Option<StreamsMetadata>;

  /// Returns one record per instance hosting a partition of `store`.
  fn all_metadata_for_store(&self, store: &str) -> Vec<StreamsMetadata>;
}
