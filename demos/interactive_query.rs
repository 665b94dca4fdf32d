//! # Interactive Query Example
//!
//! Two engines run in this process, each hosting part of a word-count store.
//! One engine is still rebalancing when the query arrives; the service keeps
//! retrying until it finishes, then answers. Keys owned by a peer instance are
//! routed by asking for the owning host.

use std::sync::Arc;
use std::time::Duration;
use streamweave_query::config::{InteractiveQueryConfig, StateStoreRetry};
use streamweave_query::host::HostInfo;
use streamweave_query::local_engine::LocalEngine;
use streamweave_query::partitioning::StringEncoder;
use streamweave_query::registry::EngineRegistry;
use streamweave_query::service::InteractiveQueryService;
use streamweave_query::store::{InMemoryKeyValueStore, key_value_store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .init();

  let local = HostInfo::new("localhost", 7070);
  let peer = HostInfo::new("peer", 7070);
  let owners = vec![local.clone(), peer.clone(), local.clone(), peer.clone()];

  let registry = Arc::new(EngineRegistry::new());
  let engine = Arc::new(LocalEngine::new().with_application_server(local.clone()));
  let counts = Arc::new(InMemoryKeyValueStore::<String, u64>::new());
  for (word, count) in [("alice", 3), ("bob", 5), ("carol", 1)] {
    counts.put(word.to_string(), count);
  }
  engine.add_store(counts.handle("word-counts"));
  engine.assign("word-counts", owners);
  engine.start()?;
  registry.register(engine.clone());

  let config = InteractiveQueryConfig::default()
    .with_application_server(local.to_string())
    .with_state_store_retry(StateStoreRetry::new(10, Duration::from_millis(100)));
  let service = InteractiveQueryService::new(registry, config)?;

  let rebalancing = engine.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(250)).await;
    if let Err(e) = rebalancing.finish_rebalance() {
      eprintln!("rebalance: {}", e);
    }
  });

  let store = service
    .queryable_store("word-counts", &key_value_store::<String, u64>())
    .await?;
  println!("this instance: {:?}", service.current_host_info()?);

  for word in ["alice", "bob", "carol"] {
    match service.host_info("word-counts", word, &StringEncoder) {
      Some(owner) if owner == local => {
        println!("{} -> {:?} (local)", word, store.get(&word.to_string()));
      }
      Some(owner) => println!("{} -> ask {}", word, owner),
      None => println!("{} -> owner unknown", word),
    }
  }
  println!("hosts of word-counts: {:?}", service.all_hosts_info("word-counts"));
  Ok(())
}
