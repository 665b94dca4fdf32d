//! # Queryable State Stores
//!
//! Engines materialize named, typed state stores from the data they process.
//! This module defines how such a store is handed out for read-only queries:
//!
//! - [`StoreHandle`]: a type-erased, cheaply cloneable handle an engine returns
//!   from a lookup. The engine that hosts the store owns its lifecycle; the
//!   query layer only passes handles through.
//! - [`QueryableStoreType`]: the kind a caller asks for. It recovers the typed
//!   store (`Arc<dyn ReadOnlyKeyValueStore<K, V>>`, ...) from a handle, or
//!   rejects the handle if the store has a different shape.
//! - In-memory stores implementing the read-only traits, used by
//!   [`LocalEngine`](crate::local_engine::LocalEngine).
//!
//! ```rust
//! use std::sync::Arc;
//! use streamweave_query::store::{key_value_store, InMemoryKeyValueStore, QueryableStoreType};
//!
//! let counts = Arc::new(InMemoryKeyValueStore::<String, u64>::new());
//! counts.put("alice".to_string(), 3);
//! let handle = counts.handle("counts");
//!
//! let store = key_value_store::<String, u64>().accept(&handle).unwrap();
//! assert_eq!(store.get(&"alice".to_string()), Some(3));
//! ```

use serde::{Deserialize, Serialize};
use std::any::{Any, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

/// Shape of a state store.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreType {
  /// Point lookups by key.
  KeyValue,
  /// Values per key bucketed into fixed time windows.
  Window,
  /// Values per key bucketed into activity sessions.
  Session,
}

impl fmt::Display for StoreType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      StoreType::KeyValue => "key-value",
      StoreType::Window => "window",
      StoreType::Session => "session",
    };
    f.write_str(name)
  }
}

/// Store shape plus key and value types, used to match requests to stores.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StoreDescriptor {
  /// Store shape.
  pub store_type: StoreType,
  /// Rust type name of the keys.
  pub key_type: &'static str,
  /// Rust type name of the values.
  pub value_type: &'static str,
}

impl StoreDescriptor {
  /// Describes a store of the given shape over `K` and `V`.
  pub fn of<K: ?Sized, V: ?Sized>(store_type: StoreType) -> Self {
    Self {
      store_type,
      key_type: type_name::<K>(),
      value_type: type_name::<V>(),
    }
  }
}

impl fmt::Display for StoreDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}<{}, {}>", self.store_type, self.key_type, self.value_type)
  }
}

/// Read-only view of a key-value store.
pub trait ReadOnlyKeyValueStore<K, V>: Send + Sync {
  /// Returns the value for `key`.
  fn get(&self, key: &K) -> Option<V>;
  /// Returns all entries.
  fn all(&self) -> Vec<(K, V)>;
  /// Returns the (approximate) number of entries.
  fn approximate_num_entries(&self) -> u64;
}

/// Read-only view of a windowed store. Timestamps are epoch milliseconds.
pub trait ReadOnlyWindowStore<K, V>: Send + Sync {
  /// Returns `(window_start, value)` for windows of `key` starting in `[from, to]`.
  fn fetch(&self, key: &K, from: i64, to: i64) -> Vec<(i64, V)>;
}

/// Bounds of one session, in epoch milliseconds (inclusive).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SessionWindow {
  /// First activity in the session.
  pub start: i64,
  /// Last activity in the session.
  pub end: i64,
}

/// Read-only view of a session store.
pub trait ReadOnlySessionStore<K, V>: Send + Sync {
  /// Returns every session recorded for `key`, ordered by start.
  fn fetch(&self, key: &K) -> Vec<(SessionWindow, V)>;
}

macro_rules! opaque_debug {
  ($($view:ident),*) => {
    $(
      impl<K, V> fmt::Debug for dyn $view<K, V> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
          write!(f, "{}<{}, {}>", stringify!($view), type_name::<K>(), type_name::<V>())
        }
      }
    )*
  };
}

opaque_debug!(ReadOnlyKeyValueStore, ReadOnlyWindowStore, ReadOnlySessionStore);

/// Type-erased handle to a named store hosted by an engine.
#[derive(Clone)]
pub struct StoreHandle {
  name: Arc<str>,
  descriptor: StoreDescriptor,
  inner: Arc<dyn Any + Send + Sync>,
}

impl StoreHandle {
  /// Wraps a key-value store.
  pub fn key_value<K: 'static, V: 'static>(
    name: &str,
    store: Arc<dyn ReadOnlyKeyValueStore<K, V>>,
  ) -> Self {
    Self::erase(name, StoreDescriptor::of::<K, V>(StoreType::KeyValue), store)
  }

  /// Wraps a window store.
  pub fn window<K: 'static, V: 'static>(name: &str, store: Arc<dyn ReadOnlyWindowStore<K, V>>) -> Self {
    Self::erase(name, StoreDescriptor::of::<K, V>(StoreType::Window), store)
  }

  /// Wraps a session store.
  pub fn session<K: 'static, V: 'static>(
    name: &str,
    store: Arc<dyn ReadOnlySessionStore<K, V>>,
  ) -> Self {
    Self::erase(name, StoreDescriptor::of::<K, V>(StoreType::Session), store)
  }

  fn erase<T: Send + Sync + 'static>(name: &str, descriptor: StoreDescriptor, store: T) -> Self {
    Self {
      name: Arc::from(name),
      descriptor,
      inner: Arc::new(store),
    }
  }

  /// Returns the store name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns the store shape and types.
  pub fn descriptor(&self) -> StoreDescriptor {
    self.descriptor
  }

  /// Returns true if both handles are clones of one another.
  pub fn same_handle(&self, other: &StoreHandle) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  fn downcast<T: Clone + 'static>(&self) -> Option<T> {
    self.inner.downcast_ref::<T>().cloned()
  }
}

impl fmt::Debug for StoreHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StoreHandle")
      .field("name", &self.name)
      .field("descriptor", &self.descriptor)
      .finish_non_exhaustive()
  }
}

/// Kind of store a caller wants to query.
pub trait QueryableStoreType: Send + Sync {
  /// Typed store returned on success.
  type Store: Clone + Send + Sync + 'static;

  /// Shape and types this kind accepts.
  fn descriptor(&self) -> StoreDescriptor;

  /// Recovers the typed store, or `None` if the handle has another shape.
  fn accept(&self, handle: &StoreHandle) -> Option<Self::Store> {
    if handle.descriptor() != self.descriptor() {
      return None;
    }
    handle.downcast::<Self::Store>()
  }
}

macro_rules! store_kind {
  ($(#[$meta:meta])* $kind:ident, $ctor:ident, $store_type:expr, $view:ident) => {
    $(#[$meta])*
    pub struct $kind<K, V>(PhantomData<fn() -> (K, V)>);

    impl<K, V> Clone for $kind<K, V> {
      fn clone(&self) -> Self {
        Self(PhantomData)
      }
    }

    impl<K, V> fmt::Debug for $kind<K, V> {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", StoreDescriptor::of::<K, V>($store_type))
      }
    }

    impl<K: 'static, V: 'static> QueryableStoreType for $kind<K, V> {
      type Store = Arc<dyn $view<K, V>>;

      fn descriptor(&self) -> StoreDescriptor {
        StoreDescriptor::of::<K, V>($store_type)
      }
    }

    $(#[$meta])*
    pub fn $ctor<K: 'static, V: 'static>() -> $kind<K, V> {
      $kind(PhantomData)
    }
  };
}

store_kind!(
  /// Key-value store kind.
  KeyValueStoreType,
  key_value_store,
  StoreType::KeyValue,
  ReadOnlyKeyValueStore
);
store_kind!(
  /// Window store kind.
  WindowStoreType,
  window_store,
  StoreType::Window,
  ReadOnlyWindowStore
);
store_kind!(
  /// Session store kind.
  SessionStoreType,
  session_store,
  StoreType::Session,
  ReadOnlySessionStore
);

/// In-memory key-value store.
#[derive(Debug)]
pub struct InMemoryKeyValueStore<K, V> {
  entries: RwLock<BTreeMap<K, V>>,
}

impl<K: Ord + Clone, V: Clone> InMemoryKeyValueStore<K, V> {
  /// Creates an empty store.
  pub fn new() -> Self {
    Self {
      entries: RwLock::new(BTreeMap::new()),
    }
  }

  /// Inserts or replaces the value for `key`.
  pub fn put(&self, key: K, value: V) -> Option<V> {
    self
      .entries
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key, value)
  }

  /// Removes `key`.
  pub fn delete(&self, key: &K) -> Option<V> {
    self
      .entries
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(key)
  }
}

impl<K: Ord + Clone, V: Clone> Default for InMemoryKeyValueStore<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V> InMemoryKeyValueStore<K, V>
where
  K: Ord + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  /// Returns a handle exposing this store under `name`.
  pub fn handle(self: &Arc<Self>, name: &str) -> StoreHandle {
    let view: Arc<dyn ReadOnlyKeyValueStore<K, V>> = self.clone();
    StoreHandle::key_value(name, view)
  }
}

impl<K, V> ReadOnlyKeyValueStore<K, V> for InMemoryKeyValueStore<K, V>
where
  K: Ord + Clone + Send + Sync,
  V: Clone + Send + Sync,
{
  fn get(&self, key: &K) -> Option<V> {
    self
      .entries
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .cloned()
  }

  fn all(&self) -> Vec<(K, V)> {
    self
      .entries
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect()
  }

  fn approximate_num_entries(&self) -> u64 {
    self.entries.read().unwrap_or_else(PoisonError::into_inner).len() as u64
  }
}

/// In-memory window store keyed by `(key, window_start)`.
#[derive(Debug)]
pub struct InMemoryWindowStore<K, V> {
  windows: RwLock<BTreeMap<(K, i64), V>>,
}

impl<K: Ord + Clone, V: Clone> InMemoryWindowStore<K, V> {
  /// Creates an empty store.
  pub fn new() -> Self {
    Self {
      windows: RwLock::new(BTreeMap::new()),
    }
  }

  /// Records `value` for the window of `key` starting at `window_start`.
  pub fn put(&self, key: K, window_start: i64, value: V) {
    self
      .windows
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert((key, window_start), value);
  }
}

impl<K: Ord + Clone, V: Clone> Default for InMemoryWindowStore<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V> InMemoryWindowStore<K, V>
where
  K: Ord + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  /// Returns a handle exposing this store under `name`.
  pub fn handle(self: &Arc<Self>, name: &str) -> StoreHandle {
    let view: Arc<dyn ReadOnlyWindowStore<K, V>> = self.clone();
    StoreHandle::window(name, view)
  }
}

impl<K, V> ReadOnlyWindowStore<K, V> for InMemoryWindowStore<K, V>
where
  K: Ord + Clone + Send + Sync,
  V: Clone + Send + Sync,
{
  fn fetch(&self, key: &K, from: i64, to: i64) -> Vec<(i64, V)> {
    if from > to {
      return Vec::new();
    }
    self
      .windows
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .range((key.clone(), from)..=(key.clone(), to))
      .map(|((_, start), v)| (*start, v.clone()))
      .collect()
  }
}

/// In-memory session store.
#[derive(Debug)]
pub struct InMemorySessionStore<K, V> {
  sessions: RwLock<BTreeMap<K, BTreeMap<SessionWindow, V>>>,
}

impl<K: Ord + Clone, V: Clone> InMemorySessionStore<K, V> {
  /// Creates an empty store.
  pub fn new() -> Self {
    Self {
      sessions: RwLock::new(BTreeMap::new()),
    }
  }

  /// Records `value` for the session `window` of `key`, replacing an equal window.
  pub fn put(&self, key: K, window: SessionWindow, value: V) {
    self
      .sessions
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .entry(key)
      .or_default()
      .insert(window, value);
  }
}

impl<K: Ord + Clone, V: Clone> Default for InMemorySessionStore<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V> InMemorySessionStore<K, V>
where
  K: Ord + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  /// Returns a handle exposing this store under `name`.
  pub fn handle(self: &Arc<Self>, name: &str) -> StoreHandle {
    let view: Arc<dyn ReadOnlySessionStore<K, V>> = self.clone();
    StoreHandle::session(name, view)
  }
}

impl<K, V> ReadOnlySessionStore<K, V> for InMemorySessionStore<K, V>
where
  K: Ord + Clone + Send + Sync,
  V: Clone + Send + Sync,
{
  fn fetch(&self, key: &K) -> Vec<(SessionWindow, V)> {
    self
      .sessions
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .map(|s| s.iter().map(|(w, v)| (*w, v.clone())).collect())
      .unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_key_value_kind_accepts_matching_handle() {
    let kv = Arc::new(InMemoryKeyValueStore::<String, u64>::new());
    kv.put("a".to_string(), 1);
    kv.put("b".to_string(), 2);
    let handle = kv.handle("counts");
    assert_eq!(handle.name(), "counts");
    assert_eq!(handle.descriptor().store_type, StoreType::KeyValue);

    let store = key_value_store::<String, u64>().accept(&handle).unwrap();
    assert_eq!(store.get(&"a".to_string()), Some(1));
    assert_eq!(store.approximate_num_entries(), 2);
    assert_eq!(
      store.all(),
      vec![("a".to_string(), 1), ("b".to_string(), 2)]
    );
  }

  #[test]
  fn test_kind_rejects_other_shapes_and_types() {
    let kv = Arc::new(InMemoryKeyValueStore::<String, u64>::new());
    let handle = kv.handle("counts");
    assert!(window_store::<String, u64>().accept(&handle).is_none());
    assert!(key_value_store::<String, i64>().accept(&handle).is_none());
    assert!(key_value_store::<u64, u64>().accept(&handle).is_none());
  }

  #[test]
  fn test_window_store_fetches_range() {
    let ws = Arc::new(InMemoryWindowStore::<String, u32>::new());
    ws.put("k".to_string(), 0, 1);
    ws.put("k".to_string(), 1000, 2);
    ws.put("k".to_string(), 2000, 3);
    ws.put("other".to_string(), 1000, 9);
    let store = window_store::<String, u32>().accept(&ws.handle("w")).unwrap();
    assert_eq!(store.fetch(&"k".to_string(), 500, 2000), vec![(1000, 2), (2000, 3)]);
    assert!(store.fetch(&"k".to_string(), 10, 0).is_empty());
  }

  #[test]
  fn test_session_store_fetches_sessions_in_order() {
    let ss = Arc::new(InMemorySessionStore::<String, u32>::new());
    let late = SessionWindow { start: 100, end: 150 };
    let early = SessionWindow { start: 0, end: 40 };
    ss.put("k".to_string(), late, 2);
    ss.put("k".to_string(), early, 1);
    let store = session_store::<String, u32>().accept(&ss.handle("s")).unwrap();
    assert_eq!(store.fetch(&"k".to_string()), vec![(early, 1), (late, 2)]);
    assert!(store.fetch(&"missing".to_string()).is_empty());
  }

  #[test]
  fn test_same_handle_compares_identity() {
    let kv = Arc::new(InMemoryKeyValueStore::<String, u64>::new());
    let a = kv.handle("counts");
    let b = a.clone();
    let c = kv.handle("counts");
    assert!(a.same_handle(&b));
    assert!(!a.same_handle(&c));
  }

  #[test]
  fn test_typed_stores_debug_by_view_name() {
    let kv = Arc::new(InMemoryKeyValueStore::<String, u64>::new());
    let store = key_value_store::<String, u64>().accept(&kv.handle("counts")).unwrap();
    assert!(format!("{:?}", store).starts_with("ReadOnlyKeyValueStore<"));

    let ws = Arc::new(InMemoryWindowStore::<String, u32>::new());
    let store = window_store::<String, u32>().accept(&ws.handle("w")).unwrap();
    assert!(format!("{:?}", store).starts_with("ReadOnlyWindowStore<"));

    let ss = Arc::new(InMemorySessionStore::<String, u32>::new());
    let store = session_store::<String, u32>().accept(&ss.handle("s")).unwrap();
    assert!(format!("{:?}", store).starts_with("ReadOnlySessionStore<"));

    // Lookups that fail can be unwrapped for their error.
    let missing: Result<Arc<dyn ReadOnlyKeyValueStore<String, u64>>, &str> = Err("absent");
    assert_eq!(missing.unwrap_err(), "absent");
  }

  #[test]
  fn test_descriptor_display() {
    let d = StoreDescriptor::of::<u64, u64>(StoreType::Window);
    assert_eq!(d.to_string(), "window<u64, u64>");
  }
}
