//! # StreamWeave Query
//!
//! Interactive queries over the partitioned state of running stream-processing
//! engines.
//!
//! Every engine instance in a process owns a subset of partitions and the local
//! state stores materialized from them. This crate lets an application:
//!
//! - fetch a read-only handle to a named store from whichever local engine
//!   currently hosts it, waiting (bounded) for stores that are still restoring
//!   or engines that are still rebalancing;
//! - find the advertised `host:port` of the instance owning the partition of a
//!   key, so the query can be forwarded there;
//! - list every instance hosting part of a store.
//!
//! ## Key Features
//!
//! - **Non-owning registry**: engines register when started and deregister when
//!   stopped; the registry never keeps an engine alive.
//! - **Bounded retry**: fixed-backoff, bounded-attempt store lookups.
//! - **Kafka-compatible partitioning**: murmur2 over the encoded key.
//! - **Typed stores**: key-value, window and session stores recovered from
//!   type-erased handles with their key and value types checked.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use streamweave_query::config::InteractiveQueryConfig;
//! use streamweave_query::registry::EngineRegistry;
//! use streamweave_query::service::InteractiveQueryService;
//! use streamweave_query::store::key_value_store;
//!
//! # async fn run() -> Result<(), streamweave_query::error::QueryError> {
//! let registry = Arc::new(EngineRegistry::new());
//! let service = InteractiveQueryService::new(registry, InteractiveQueryConfig::default())?;
//! let counts = service
//!   .queryable_store("counts", &key_value_store::<String, u64>())
//!   .await?;
//! println!("{:?}", counts.get(&"alice".to_string()));
//! # Ok(())
//! # }
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Service configuration: `application.server` and store lookup retry.
pub mod config;
/// The engine capability seen by the query layer.
pub mod engine;
/// Errors returned by the query service.
pub mod error;
/// Advertised endpoints and partition metadata.
pub mod host;
/// In-process engine implementation.
pub mod local_engine;
/// Store lookup across registered engines.
pub mod locator;
/// Key encoding and the default key partitioner.
pub mod partitioning;
/// Process-wide set of running engines.
pub mod registry;
/// Routing: key and store to owning hosts.
pub mod resolver;
/// Bounded fixed-backoff retry.
pub mod retry;
/// The interactive query façade.
pub mod service;
/// Queryable state store kinds, handles and in-memory stores.
pub mod store;

#[cfg(test)]
mod service_test;
