//! Coordinator configuration

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use travel_common::ShardKind;

/// Runtime configuration of the coordinator process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Client-facing listener
    pub listen: SocketAddr,
    /// `host:port` of every shard
    pub shards: BTreeMap<ShardKind, String>,
    /// Size of the worker pool
    pub workers: usize,
    /// Capacity of the transaction queue; `Commit`/`Abort` wait when it is full
    pub queue_capacity: usize,
    pub connect_timeout: Duration,
    /// Bound on waiting for a shard reply before the connection is recycled
    pub read_timeout: Duration,
}

impl CoordinatorConfig {
    /// Endpoint for `kind`
    pub fn endpoint(&self, kind: ShardKind) -> Option<&str> {
        self.shards.get(&kind).map(String::as_str)
    }

    pub fn with_endpoint(mut self, kind: ShardKind, addr: impl Into<String>) -> Self {
        self.shards.insert(kind, addr.into());
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 3035)),
            shards: ShardKind::ALL
                .into_iter()
                .map(|kind| (kind, format!("localhost:{}", kind.default_port())))
                .collect(),
            workers: 4,
            queue_capacity: 1024,
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(3),
        }
    }
}
