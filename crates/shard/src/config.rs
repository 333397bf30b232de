//! Shard process configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use travel_common::ShardKind;

use crate::engine::ShardStore;
use crate::error::Result;

/// Settings for one shard process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardConfig {
    /// Which class of record this shard owns.
    pub kind: ShardKind,
    /// Address the request listener binds to.
    pub listen: SocketAddr,
    /// Optional JSON snapshot loaded before accepting connections.
    pub seed: Option<PathBuf>,
}

impl ShardConfig {
    /// Listen on all interfaces at the kind's default port
    pub fn new(kind: ShardKind) -> Self {
        Self {
            kind,
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), kind.default_port()),
            seed: None,
        }
    }

    /// Build the store, restoring the seed snapshot if one is configured
    pub fn open_store(&self) -> Result<ShardStore> {
        let store = ShardStore::new(self.kind);
        if let Some(path) = &self.seed {
            let data = std::fs::read(path)?;
            store.restore_from_snapshot(&data)?;
        }
        Ok(store)
    }
}
