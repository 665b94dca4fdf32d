//! Advertised endpoints of engine instances.
//!
//! Every engine instance may advertise where it can be reached for interactive
//! queries through the `application.server` setting (`<host>:<port>`). The
//! partition metadata an engine reports about itself and its peers is expressed
//! in terms of these endpoints.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network location of one engine instance.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
  host: String,
  port: u16,
}

impl HostInfo {
  /// Creates a host info from its parts.
  pub fn new(host: impl Into<String>, port: u16) -> Self {
    Self {
      host: host.into(),
      port,
    }
  }

  /// Returns the advertised host name or address.
  pub fn host(&self) -> &str {
    &self.host
  }

  /// Returns the advertised port.
  pub fn port(&self) -> u16 {
    self.port
  }
}

impl fmt::Display for HostInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.host, self.port)
  }
}

/// Parses `<host>:<port>`.
///
/// The port is everything after the last `:`, so bracketed IPv6 literals such
/// as `[::1]:8080` are accepted with the brackets kept in the host.
impl FromStr for HostInfo {
  type Err = ConfigError;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    let (host, port) = value
      .trim()
      .rsplit_once(':')
      .ok_or_else(|| ConfigError::malformed_server(value, "missing ':' separator"))?;
    if host.is_empty() {
      return Err(ConfigError::malformed_server(value, "empty host"));
    }
    let port = port
      .parse::<u16>()
      .map_err(|e| ConfigError::malformed_server(value, format!("invalid port {:?}: {}", port, e)))?;
    Ok(Self::new(host, port))
  }
}

/// Partition metadata for one engine instance as seen by some engine.
///
/// An engine answers "who owns this partition" from its runtime's assignment
/// metadata. While that metadata is being rebuilt (rebalance) or when the
/// owning instance advertises no endpoint, the answer is [`NotAvailable`].
///
/// [`NotAvailable`]: StreamsMetadata::NotAvailable
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StreamsMetadata {
  /// Ownership is known.
  Available {
    /// Advertised endpoint of the owning instance.
    host_info: HostInfo,
    /// Stores hosted by the owning instance.
    store_names: Vec<String>,
    /// Partitions of the queried store owned by the instance.
    partitions: Vec<u32>,
  },
  /// Ownership cannot be determined right now.
  NotAvailable,
}

impl StreamsMetadata {
  /// Returns the owner's endpoint, or `None` for [`StreamsMetadata::NotAvailable`].
  pub fn host_info(&self) -> Option<&HostInfo> {
    match self {
      StreamsMetadata::Available { host_info, .. } => Some(host_info),
      StreamsMetadata::NotAvailable => None,
    }
  }

  /// Consumes the record and returns the owner's endpoint, if known.
  pub fn into_host_info(self) -> Option<HostInfo> {
    match self {
      StreamsMetadata::Available { host_info, .. } => Some(host_info),
      StreamsMetadata::NotAvailable => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parses_host_and_port() {
    let h: HostInfo = "host:1234".parse().unwrap();
    assert_eq!(h.host(), "host");
    assert_eq!(h.port(), 1234);
    assert_eq!(h.to_string(), "host:1234");
  }

  #[test]
  fn test_parses_bracketed_ipv6() {
    let h: HostInfo = "[::1]:8080".parse().unwrap();
    assert_eq!(h.host(), "[::1]");
    assert_eq!(h.port(), 8080);
  }

  #[test]
  fn test_rejects_malformed_values() {
    for bad in ["bad", "host:notanumber", ":80", "host:", "host:70000"] {
      let err = bad.parse::<HostInfo>().unwrap_err();
      assert!(
        matches!(err, ConfigError::MalformedApplicationServer { ref value, .. } if value == bad),
        "{bad}: {err}"
      );
    }
  }

  #[test]
  fn test_not_available_metadata_has_no_host() {
    assert_eq!(StreamsMetadata::NotAvailable.host_info(), None);
    let md = StreamsMetadata::Available {
      host_info: HostInfo::new("a", 1),
      store_names: vec!["s".to_string()],
      partitions: vec![0, 2],
    };
    assert_eq!(md.into_host_info(), Some(HostInfo::new("a", 1)));
  }
}
