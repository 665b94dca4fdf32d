//! # Store Locator
//!
//! Finds a queryable store by name and kind across every registered engine.
//!
//! One scan walks a snapshot of the registry in registration order and asks
//! each engine for the store. Engines that are not ready answer with a
//! [`StoreNotAvailable`] signal; those are recorded and the scan moves on.
//! When several engines hand out a matching store, the one asked **last**
//! wins. When none does, the most recent signal is the scan's error.
//!
//! [`LocalStoreLocator::find`] repeats the scan under a [`RetryPolicy`] so a
//! caller racing engine startup or a rebalance gets the store once it is ready.

use crate::engine::{StoreLookup, StoreNotAvailable, UnavailableReason};
use crate::registry::EngineRegistry;
use crate::retry::{RetryExhausted, RetryPolicy};
use crate::store::QueryableStoreType;
use std::future::ready;
use std::sync::Arc;
use tracing::{debug, trace};

/// Locates state stores hosted by the engines of an [`EngineRegistry`].
#[derive(Clone, Debug)]
pub struct LocalStoreLocator {
  registry: Arc<EngineRegistry>,
}

impl LocalStoreLocator {
  /// Creates a locator over `registry`.
  pub fn new(registry: Arc<EngineRegistry>) -> Self {
    Self { registry }
  }

  /// Returns the registry being searched.
  pub fn registry(&self) -> &Arc<EngineRegistry> {
    &self.registry
  }

  /// Scans every registered engine once.
  ///
  /// Every engine in the snapshot is asked, even after a hit.
  pub fn scan<Q: QueryableStoreType>(&self, name: &str, kind: &Q) -> Result<Q::Store, StoreNotAvailable> {
    let engines = self.registry.all();
    if engines.is_empty() {
      return Err(StoreNotAvailable::new(name, None, UnavailableReason::NoEngines));
    }

    let descriptor = kind.descriptor();
    let mut found = None;
    let mut last_miss = None;
    for engine in &engines {
      match engine.store(name, &descriptor) {
        StoreLookup::Found(handle) => match kind.accept(&handle) {
          Some(store) => found = Some(store),
          None => {
            let miss = StoreNotAvailable::new(
              name,
              Some(engine.id()),
              UnavailableReason::WrongStoreType {
                expected: descriptor,
                actual: handle.descriptor(),
              },
            );
            trace!(engine = %engine.id(), %miss, "store rejected");
            last_miss = Some(miss);
          }
        },
        StoreLookup::NotAvailable(miss) => {
          trace!(engine = %engine.id(), %miss, "store not available");
          last_miss = Some(miss);
        }
        StoreLookup::Absent => {}
      }
    }

    match found {
      Some(store) => Ok(store),
      None => Err(
        last_miss.unwrap_or_else(|| StoreNotAvailable::new(name, None, UnavailableReason::NotHosted)),
      ),
    }
  }

  /// Scans until the store is found or `policy` gives up.
  pub async fn find<Q: QueryableStoreType>(
    &self,
    name: &str,
    kind: &Q,
    policy: &RetryPolicy,
  ) -> Result<Q::Store, RetryExhausted<StoreNotAvailable>> {
    let result = policy.execute(|_| ready(self.scan(name, kind))).await;
    if let Err(exhausted) = &result {
      debug!(store = name, attempts = exhausted.attempts, cause = %exhausted.last, "store lookup exhausted");
    }
    result
  }
}
