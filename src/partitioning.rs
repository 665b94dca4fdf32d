//! # Key Partitioning
//!
//! Maps a record key to the partition that holds it. State stores are
//! partitioned the same way as the input they are materialized from, so the
//! partition of a key determines which engine instance owns the state for it.
//!
//! Keys are first turned into bytes with a [`KeyEncoder`] (the same encoding
//! used when the key was written), then hashed with [`murmur2`]:
//!
//! ```rust
//! use streamweave_query::partitioning::{KeyEncoder, StringEncoder, partition_for_key};
//!
//! let bytes = StringEncoder.encode("counts", "alice");
//! let partition = partition_for_key(&bytes, 4);
//! assert!(partition < 4);
//! ```

/// Turns a key into the bytes that were used to partition it.
///
/// `store` is passed so encoders can vary per store, as topic-aware
/// serializers do.
pub trait KeyEncoder<K: ?Sized>: Send + Sync {
  /// Encodes `key` for the given store.
  fn encode(&self, store: &str, key: &K) -> Vec<u8>;
}

impl<K, F> KeyEncoder<K> for F
where
  K: ?Sized,
  F: Fn(&K) -> Vec<u8> + Send + Sync,
{
  fn encode(&self, _store: &str, key: &K) -> Vec<u8> {
    self(key)
  }
}

/// UTF-8 encoder for string keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringEncoder;

impl KeyEncoder<str> for StringEncoder {
  fn encode(&self, _store: &str, key: &str) -> Vec<u8> {
    key.as_bytes().to_vec()
  }
}

impl KeyEncoder<String> for StringEncoder {
  fn encode(&self, _store: &str, key: &String) -> Vec<u8> {
    key.as_bytes().to_vec()
  }
}

/// Pass-through encoder for keys that are already bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesEncoder;

impl KeyEncoder<[u8]> for BytesEncoder {
  fn encode(&self, _store: &str, key: &[u8]) -> Vec<u8> {
    key.to_vec()
  }
}

impl KeyEncoder<Vec<u8>> for BytesEncoder {
  fn encode(&self, _store: &str, key: &Vec<u8>) -> Vec<u8> {
    key.clone()
  }
}

/// Big-endian encoder for `u64` keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct U64Encoder;

impl KeyEncoder<u64> for U64Encoder {
  fn encode(&self, _store: &str, key: &u64) -> Vec<u8> {
    key.to_be_bytes().to_vec()
  }
}

/// 32-bit murmur2 hash with the seed used by Kafka's default partitioner.
///
/// Returned as `i32` so values match the JVM implementation bit for bit.
pub fn murmur2(data: &[u8]) -> i32 {
  const SEED: u32 = 0x9747_b28c;
  const M: u32 = 0x5bd1_e995;
  const R: u32 = 24;

  let length = data.len();
  let mut h: u32 = SEED ^ (length as u32);

  let mut chunks = data.chunks_exact(4);
  for chunk in &mut chunks {
    let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    k = k.wrapping_mul(M);
    k ^= k >> R;
    k = k.wrapping_mul(M);
    h = h.wrapping_mul(M);
    h ^= k;
  }

  let tail = chunks.remainder();
  if tail.len() >= 3 {
    h ^= u32::from(tail[2]) << 16;
  }
  if tail.len() >= 2 {
    h ^= u32::from(tail[1]) << 8;
  }
  if !tail.is_empty() {
    h ^= u32::from(tail[0]);
    h = h.wrapping_mul(M);
  }

  h ^= h >> 13;
  h = h.wrapping_mul(M);
  h ^= h >> 15;
  h as i32
}

/// Returns the partition (`0..partitions`) for an encoded key.
///
/// Returns 0 when `partitions` is 0.
pub fn partition_for_key(key: &[u8], partitions: u32) -> u32 {
  if partitions == 0 {
    return 0;
  }
  ((murmur2(key) & 0x7fff_ffff) as u32) % partitions
}
