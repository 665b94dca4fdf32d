//! In-process [`Engine`] implementation.
//!
//! [`LocalEngine`] keeps everything an engine needs to answer interactive
//! queries in memory: its lifecycle state, the stores it has materialized
//! locally, and the cluster-wide partition assignment for each store (which
//! instance owns which partition, including instances in other processes).
//!
//! The runtime driving the engine moves it through its lifecycle:
//!
//! ```text
//! Created --start--> Rebalancing --finish_rebalance--> Running
//!                        ^                               |
//!                        +----------rebalance------------+
//! any live state --stop--> Stopped      any live state --fail--> Failed
//! ```
//!
//! Stores are only handed out while `Running`; routing metadata is only
//! answered while `Running` and when the engine advertises an endpoint.

use crate::engine::{
  Engine, EngineId, EngineState, StoreLookup, StoreNotAvailable, UnavailableReason,
};
use crate::host::{HostInfo, StreamsMetadata};
use crate::partitioning::partition_for_key;
use crate::store::{StoreDescriptor, StoreHandle};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::debug;

/// Error for an illegal lifecycle transition.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid engine transition from {from} to {to}")]
pub struct InvalidTransition {
  /// State before the attempted transition.
  pub from: EngineState,
  /// Requested state.
  pub to: EngineState,
}

#[derive(Debug)]
struct HostedStore {
  handle: StoreHandle,
  restoring: bool,
}

#[derive(Debug)]
struct Inner {
  state: EngineState,
  stores: HashMap<String, HostedStore>,
  // store name -> owner of each partition, indexed by partition
  assignments: HashMap<String, Vec<HostInfo>>,
}

/// An engine instance living in this process.
#[derive(Debug)]
pub struct LocalEngine {
  id: EngineId,
  application_server: Option<HostInfo>,
  inner: RwLock<Inner>,
}

impl Default for LocalEngine {
  fn default() -> Self {
    Self::new()
  }
}

impl LocalEngine {
  /// Creates an engine in the `Created` state with no advertised endpoint.
  pub fn new() -> Self {
    Self {
      id: EngineId::next(),
      application_server: None,
      inner: RwLock::new(Inner {
        state: EngineState::Created,
        stores: HashMap::new(),
        assignments: HashMap::new(),
      }),
    }
  }

  /// Sets the endpoint this engine advertises (its `application.server`).
  pub fn with_application_server(mut self, host: HostInfo) -> Self {
    self.application_server = Some(host);
    self
  }

  /// Returns the advertised endpoint.
  pub fn application_server(&self) -> Option<&HostInfo> {
    self.application_server.as_ref()
  }

  fn read(&self) -> RwLockReadGuard<'_, Inner> {
    self.inner.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, Inner> {
    self.inner.write().unwrap_or_else(PoisonError::into_inner)
  }

  fn transition(&self, allowed: &[EngineState], to: EngineState) -> Result<(), InvalidTransition> {
    let mut inner = self.write();
    let from = inner.state;
    if !allowed.contains(&from) {
      return Err(InvalidTransition { from, to });
    }
    inner.state = to;
    debug!(engine = %self.id, %from, %to, "engine state changed");
    Ok(())
  }

  /// `Created -> Rebalancing`.
  pub fn start(&self) -> Result<(), InvalidTransition> {
    self.transition(&[EngineState::Created], EngineState::Rebalancing)
  }

  /// `Rebalancing -> Running`.
  pub fn finish_rebalance(&self) -> Result<(), InvalidTransition> {
    self.transition(&[EngineState::Rebalancing], EngineState::Running)
  }

  /// `Running -> Rebalancing`.
  pub fn rebalance(&self) -> Result<(), InvalidTransition> {
    self.transition(&[EngineState::Running], EngineState::Rebalancing)
  }

  /// Any state except `Failed` -> `Stopped`.
  pub fn stop(&self) -> Result<(), InvalidTransition> {
    self.transition(
      &[
        EngineState::Created,
        EngineState::Rebalancing,
        EngineState::Running,
        EngineState::Stopped,
      ],
      EngineState::Stopped,
    )
  }

  /// Any live state -> `Failed`.
  pub fn fail(&self) -> Result<(), InvalidTransition> {
    self.transition(
      &[EngineState::Created, EngineState::Rebalancing, EngineState::Running],
      EngineState::Failed,
    )
  }

  /// Hosts a queryable store under the handle's name.
  pub fn add_store(&self, handle: StoreHandle) {
    self.put_store(handle, false);
  }

  /// Hosts a store that is still restoring and cannot be queried yet.
  pub fn add_restoring_store(&self, handle: StoreHandle) {
    self.put_store(handle, true);
  }

  fn put_store(&self, handle: StoreHandle, restoring: bool) {
    self
      .write()
      .stores
      .insert(handle.name().to_string(), HostedStore { handle, restoring });
  }

  /// Marks a restoring store as queryable. Returns false if not hosted.
  pub fn mark_restored(&self, name: &str) -> bool {
    match self.write().stores.get_mut(name) {
      Some(hosted) => {
        hosted.restoring = false;
        true
      }
      None => false,
    }
  }

  /// Stops hosting `name` (e.g. after its partitions moved away).
  pub fn remove_store(&self, name: &str) -> Option<StoreHandle> {
    self.write().stores.remove(name).map(|hosted| hosted.handle)
  }

  /// Records the owner of every partition of `store`, indexed by partition.
  pub fn assign(&self, store: &str, owners: Vec<HostInfo>) {
    self.write().assignments.insert(store.to_string(), owners);
  }

  /// Builds the metadata record for `owner` from the current assignment.
  fn metadata_for(assignments: &HashMap<String, Vec<HostInfo>>, store: &str, owner: &HostInfo) -> StreamsMetadata {
    let partitions = assignments
      .get(store)
      .map(|owners| {
        owners
          .iter()
          .enumerate()
          .filter(|(_, o)| *o == owner)
          .map(|(p, _)| p as u32)
          .collect()
      })
      .unwrap_or_default();
    let mut store_names: Vec<String> = assignments
      .iter()
      .filter(|(_, owners)| owners.contains(owner))
      .map(|(name, _)| name.clone())
      .collect();
    store_names.sort();
    StreamsMetadata::Available {
      host_info: owner.clone(),
      store_names,
      partitions,
    }
  }

  fn routing_available(&self, inner: &Inner) -> bool {
    inner.state == EngineState::Running && self.application_server.is_some()
  }
}

impl Engine for LocalEngine {
  fn id(&self) -> EngineId {
    self.id
  }

  fn state(&self) -> EngineState {
    self.read().state
  }

  fn store(&self, name: &str, kind: &StoreDescriptor) -> StoreLookup {
    let inner = self.read();
    let Some(hosted) = inner.stores.get(name) else {
      return StoreLookup::Absent;
    };
    let unavailable = |reason| StoreLookup::NotAvailable(StoreNotAvailable::new(name, Some(self.id), reason));
    if inner.state != EngineState::Running {
      return unavailable(UnavailableReason::EngineNotRunning(inner.state));
    }
    if hosted.restoring {
      return unavailable(UnavailableReason::Restoring);
    }
    let actual = hosted.handle.descriptor();
    if actual != *kind {
      return unavailable(UnavailableReason::WrongStoreType {
        expected: *kind,
        actual,
      });
    }
    StoreLookup::Found(hosted.handle.clone())
  }

  fn metadata_for_key(&self, store: &str, key: &[u8]) -> Option<StreamsMetadata> {
    let inner = self.read();
    let owners = inner.assignments.get(store)?;
    if owners.is_empty() {
      return None;
    }
    if !self.routing_available(&inner) {
      return Some(StreamsMetadata::NotAvailable);
    }
    let partition = partition_for_key(key, owners.len() as u32) as usize;
    let owner = &owners[partition];
    Some(Self::metadata_for(&inner.assignments, store, owner))
  }

  fn all_metadata_for_store(&self, store: &str) -> Vec<StreamsMetadata> {
    let inner = self.read();
    if !self.routing_available(&inner) {
      return Vec::new();
    }
    let Some(owners) = inner.assignments.get(store) else {
      return Vec::new();
    };
    let mut distinct: Vec<&HostInfo> = Vec::new();
    for owner in owners {
      if !distinct.contains(&owner) {
        distinct.push(owner);
      }
    }
    distinct
      .into_iter()
      .map(|owner| Self::metadata_for(&inner.assignments, store, owner))
      .collect()
  }
}
