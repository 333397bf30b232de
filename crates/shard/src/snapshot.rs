//! Snapshot and restore of committed state
//!
//! Snapshots are JSON so they double as human-editable seed files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use travel_common::ShardKind;

use crate::engine::ShardStore;
use crate::error::{Result, ShardError};
use crate::storage::Record;

/// Serialized committed state of one shard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSnapshot {
    pub kind: ShardKind,
    pub records: BTreeMap<String, Record>,
    #[serde(default)]
    pub last_customer_id: u64,
}

impl ShardStore {
    /// Generate a snapshot of committed state.
    ///
    /// Only allowed when no transaction is live on the shard.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let table = self.transactions.lock();
        if !table.contexts.is_empty() {
            return Err(ShardError::Busy(table.contexts.len()));
        }

        let snapshot = ShardSnapshot {
            kind: self.kind(),
            records: self.committed.read().clone(),
            last_customer_id: table.last_customer_id,
        };
        Ok(serde_json::to_vec_pretty(&snapshot)?)
    }

    /// Replace committed state with a snapshot.
    ///
    /// Only allowed when no transaction is live on the shard. The customer id
    /// counter never moves backwards.
    pub fn restore_from_snapshot(&self, data: &[u8]) -> Result<()> {
        let snapshot: ShardSnapshot = serde_json::from_slice(data)?;
        if snapshot.kind != self.kind() {
            return Err(ShardError::InvalidArgument(format!(
                "snapshot is for {}, not {}",
                snapshot.kind,
                self.kind()
            )));
        }
        if let Some(foreign) = snapshot
            .records
            .keys()
            .find(|key| ShardKind::owning(key) != Some(self.kind()))
        {
            return Err(ShardError::WrongShard(foreign.clone()));
        }

        let mut table = self.transactions.lock();
        if !table.contexts.is_empty() {
            return Err(ShardError::Busy(table.contexts.len()));
        }

        let count = snapshot.records.len();
        *self.committed.write() = snapshot.records;
        table.last_customer_id = table.last_customer_id.max(snapshot.last_customer_id);
        info!(shard = %self.kind(), records = count, "Restored snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::TransactionParticipant;
    use travel_common::{ItemKind, TxnId};

    #[test]
    fn test_snapshot_roundtrip() {
        let source = ShardStore::new(ShardKind::Flight);
        source
            .add_item(TxnId::new(1), ItemKind::Flight, "200", 1, 150)
            .unwrap();
        source.commit(TxnId::new(1)).unwrap();

        let data = source.snapshot().unwrap();
        let target = ShardStore::new(ShardKind::Flight);
        target.restore_from_snapshot(&data).unwrap();
        assert_eq!(
            target.committed_item(ItemKind::Flight, "200"),
            source.committed_item(ItemKind::Flight, "200")
        );
    }

    #[test]
    fn test_snapshot_requires_quiescence() {
        let store = ShardStore::new(ShardKind::Room);
        store
            .add_item(TxnId::new(1), ItemKind::Room, "YYZ", 1, 90)
            .unwrap();
        assert!(matches!(store.snapshot(), Err(ShardError::Busy(1))));
    }

    #[test]
    fn test_restore_rejects_other_kinds() {
        let cars = ShardStore::new(ShardKind::Car);
        let data = cars.snapshot().unwrap();
        let rooms = ShardStore::new(ShardKind::Room);
        assert!(matches!(
            rooms.restore_from_snapshot(&data),
            Err(ShardError::InvalidArgument(_))
        ));
        assert!(matches!(
            rooms.restore_from_snapshot(b"not json"),
            Err(ShardError::Snapshot(_))
        ));
    }
}
