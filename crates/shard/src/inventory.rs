//! Flight, car and room operations

use tracing::debug;
use travel_common::{CustomerId, ItemKind, TxnId};
use travel_protocol::ItemVerb;

use crate::engine::{ShardStore, TxnScope};
use crate::error::{Result, ShardError};
use crate::storage::{LockMode, Record, ReservableItem};

impl ShardStore {
    /// Create the item or add `count` units; a positive `price` replaces the old one
    pub fn add_item(
        &self,
        tid: TxnId,
        kind: ItemKind,
        id: &str,
        count: i64,
        price: i64,
    ) -> Result<()> {
        self.check_item_kind(kind, ItemVerb::Add)?;
        let key = kind.key(id);

        self.with_txn(tid, |txn| {
            txn.lock(&key, LockMode::Exclusive)?;
            let item = match txn.read_item(&key) {
                Some(mut item) => {
                    item.count = item
                        .count
                        .checked_add(count)
                        .ok_or_else(|| ShardError::overflow(&key))?;
                    if price > 0 {
                        item.price = price;
                    }
                    item
                }
                None => ReservableItem::new(&key, count, price.max(0)),
            };
            txn.write(&key, Some(Record::Item(item)));
            Ok(())
        })
    }

    /// Stage deletion of an item nobody holds a reservation on
    pub fn delete_item(&self, tid: TxnId, kind: ItemKind, id: &str) -> Result<()> {
        self.check_item_kind(kind, ItemVerb::Delete)?;
        let key = kind.key(id);

        self.with_txn(tid, |txn| {
            txn.lock(&key, LockMode::Exclusive)?;
            let item = txn
                .read_item(&key)
                .ok_or_else(|| ShardError::NotFound(key.clone()))?;
            if item.reserved > 0 {
                return Err(ShardError::HasReservations(key.clone()));
            }
            txn.write(&key, None);
            Ok(())
        })
    }

    /// Available units, 0 when the item does not exist
    pub fn query_count(&self, tid: TxnId, kind: ItemKind, id: &str) -> Result<i64> {
        self.check_item_kind(kind, ItemVerb::QueryCount)?;
        self.read_item_field(tid, &kind.key(id), |item| item.count)
    }

    /// Unit price, 0 when the item does not exist
    pub fn query_price(&self, tid: TxnId, kind: ItemKind, id: &str) -> Result<i64> {
        self.check_item_kind(kind, ItemVerb::QueryPrice)?;
        self.read_item_field(tid, &kind.key(id), |item| item.price)
    }

    pub fn item_exists(&self, tid: TxnId, kind: ItemKind, id: &str) -> Result<bool> {
        self.check_item_kind(kind, ItemVerb::Exists)?;
        let key = kind.key(id);

        self.with_txn(tid, |txn| {
            txn.lock(&key, LockMode::Shared)?;
            Ok(txn.read_item(&key).is_some())
        })
    }

    /// Move one unit from available to reserved.
    ///
    /// The customer side of the reservation is recorded by the customer shard.
    pub fn reserve_item(
        &self,
        tid: TxnId,
        kind: ItemKind,
        customer: CustomerId,
        id: &str,
    ) -> Result<()> {
        self.check_item_kind(kind, ItemVerb::Reserve)?;
        let key = kind.key(id);

        self.with_txn(tid, |txn| {
            txn.lock(&key, LockMode::Exclusive)?;
            let mut item = txn
                .read_item(&key)
                .ok_or_else(|| ShardError::NotFound(key.clone()))?;
            if item.count <= 0 {
                return Err(ShardError::NoInventory(key.clone()));
            }
            item.count -= 1;
            item.reserved = item
                .reserved
                .checked_add(1)
                .ok_or_else(|| ShardError::overflow(&key))?;
            txn.write(&key, Some(Record::Item(item)));
            debug!(%tid, %customer, key, "Reserved one unit");
            Ok(())
        })
    }

    /// Reserved units of an item; accepts a full key or a bare suffix
    pub fn query_reserved(&self, tid: TxnId, raw_key: &str) -> Result<i64> {
        let key = self.own_item_key("QueryReserved", raw_key)?;
        self.read_item_field(tid, &key, |item| item.reserved)
    }

    /// Return `count` reserved units to the available pool
    pub(crate) fn rollback_item(&self, tid: TxnId, raw_key: &str, count: i64) -> Result<()> {
        let key = self.own_item_key("rollbackReserve", raw_key)?;

        self.with_txn(tid, |txn| {
            txn.lock(&key, LockMode::Exclusive)?;
            let mut item = txn
                .read_item(&key)
                .ok_or_else(|| ShardError::NotFound(key.clone()))?;
            if item.reserved < count {
                return Err(ShardError::RollbackFailed {
                    key: key.clone(),
                    count,
                });
            }
            item.count = item
                .count
                .checked_add(count)
                .ok_or_else(|| ShardError::overflow(&key))?;
            item.reserved -= count;
            txn.write(&key, Some(Record::Item(item)));
            Ok(())
        })
    }

    fn own_item_key(&self, command: &str, raw_key: &str) -> Result<String> {
        let kind = self
            .kind()
            .item_kind()
            .ok_or_else(|| self.unsupported(command))?;
        kind.resolve_key(raw_key)
            .ok_or_else(|| ShardError::WrongShard(raw_key.to_string()))
    }

    fn read_item_field(
        &self,
        tid: TxnId,
        key: &str,
        field: impl FnOnce(&ReservableItem) -> i64,
    ) -> Result<i64> {
        self.with_txn(tid, |txn: &mut TxnScope<'_>| {
            txn.lock(key, LockMode::Shared)?;
            Ok(txn.read_item(key).as_ref().map(field).unwrap_or(0))
        })
    }
}
