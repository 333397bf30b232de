//! Customer shard operations

use tracing::debug;
use travel_common::{CustomerId, ShardKind, TxnId, normalize_key};

use crate::engine::{ShardStore, TxnScope};
use crate::error::{Result, ShardError};
use crate::storage::{Customer, LockMode, Record};

impl ShardStore {
    /// Create a customer with a fresh id.
    ///
    /// Ids come from a counter that never goes backwards and skips any id
    /// already committed, staged by a live transaction, or locked.
    pub fn new_customer(&self, tid: TxnId) -> Result<CustomerId> {
        self.check_customer_shard("AddCustomer")?;

        self.with_txn(tid, |txn| {
            let (id, key) = loop {
                txn.table.last_customer_id += 1;
                let candidate = CustomerId::new(txn.table.last_customer_id);
                let key = candidate.key();
                if txn.is_known(&key) {
                    continue;
                }
                if txn.acquire(&key, LockMode::Exclusive).is_granted() {
                    break (candidate, key);
                }
            };
            txn.write(&key, Some(Record::Customer(Customer::new(id))));
            debug!(%tid, %id, "Allocated customer id");
            Ok(id)
        })
    }

    /// Create a customer with a caller-chosen id
    pub fn new_customer_id(&self, tid: TxnId, id: CustomerId) -> Result<()> {
        self.check_customer_shard("AddCustomerID")?;
        let key = id.key();

        self.with_txn(tid, |txn| {
            txn.lock(&key, LockMode::Exclusive)?;
            if txn.read(&key).is_some() {
                return Err(ShardError::AlreadyExists(key.clone()));
            }
            txn.write(&key, Some(Record::Customer(Customer::new(id))));
            Ok(())
        })
    }

    /// Stage deletion of the customer record.
    ///
    /// Inventory held by the customer is returned by the coordinator
    /// beforehand; this shard never contacts other shards.
    pub fn delete_customer(&self, tid: TxnId, id: CustomerId) -> Result<()> {
        self.check_customer_shard("DeleteCustomer")?;
        let key = id.key();

        self.with_txn(tid, |txn| {
            txn.lock(&key, LockMode::Exclusive)?;
            if txn.read(&key).is_none() {
                return Err(ShardError::NotFound(key.clone()));
            }
            txn.write(&key, None);
            Ok(())
        })
    }

    pub fn customer_exists(&self, tid: TxnId, id: CustomerId) -> Result<bool> {
        self.check_customer_shard("CustomerExists")?;
        let key = id.key();

        self.with_txn(tid, |txn| {
            txn.lock(&key, LockMode::Shared)?;
            Ok(read_customer(txn, &key).is_some())
        })
    }

    /// Bill of the customer, empty when the customer does not exist
    pub fn query_customer_info(&self, tid: TxnId, id: CustomerId) -> Result<String> {
        self.check_customer_shard("QueryCustomer")?;
        let key = id.key();

        self.with_txn(tid, |txn| {
            txn.lock(&key, LockMode::Shared)?;
            Ok(read_customer(txn, &key)
                .map(|c| c.bill())
                .unwrap_or_default())
        })
    }

    /// Record `count` units of an inventory key against the customer
    pub fn customer_reserve(
        &self,
        tid: TxnId,
        id: CustomerId,
        reservation_key: &str,
        count: i64,
        price: i64,
    ) -> Result<()> {
        self.check_customer_shard("CustomerReserve")?;
        if count <= 0 {
            return Err(ShardError::InvalidArgument(format!(
                "reservation count must be positive, got {count}"
            )));
        }
        let reservation_key = inventory_key(reservation_key)?;
        let key = id.key();

        self.with_txn(tid, |txn| {
            txn.lock(&key, LockMode::Exclusive)?;
            let mut customer =
                read_customer(txn, &key).ok_or_else(|| ShardError::NotFound(key.clone()))?;
            if !customer.reserve(&reservation_key, count, price) {
                return Err(ShardError::overflow(&reservation_key));
            }
            txn.write(&key, Some(Record::Customer(customer)));
            Ok(())
        })
    }

    /// Reservation list of a customer record: `<key>:<count>[;<key>:<count>]*`
    pub fn get_item(&self, tid: TxnId, raw_key: &str) -> Result<String> {
        self.check_customer_shard("getItem")?;
        let key = normalize_key(raw_key);
        if CustomerId::from_key(&key).is_err() {
            return Err(match ShardKind::owning(&key) {
                Some(_) => ShardError::WrongShard(raw_key.to_string()),
                None => ShardError::InvalidArgument(format!("not a customer key: {raw_key}")),
            });
        }

        self.with_txn(tid, |txn| {
            txn.lock(&key, LockMode::Shared)?;
            read_customer(txn, &key)
                .map(|c| c.reservation_list())
                .ok_or_else(|| ShardError::NotFound(key.clone()))
        })
    }

    /// Undo `count` reserved units of `key`.
    ///
    /// On an inventory shard this returns units to the pool; on the customer
    /// shard it removes them from the customer's reservations.
    pub fn rollback_reserve(
        &self,
        tid: TxnId,
        customer: CustomerId,
        key: &str,
        count: i64,
    ) -> Result<()> {
        if count <= 0 {
            return Err(ShardError::InvalidArgument(format!(
                "rollback count must be positive, got {count}"
            )));
        }
        if self.kind() != ShardKind::Customer {
            return self.rollback_item(tid, key, count);
        }

        let reservation_key = inventory_key(key)?;
        let customer_key = customer.key();
        self.with_txn(tid, |txn| {
            txn.lock(&customer_key, LockMode::Exclusive)?;
            let mut record = read_customer(txn, &customer_key)
                .ok_or_else(|| ShardError::NotFound(customer_key.clone()))?;
            if !record.release(&reservation_key, count) {
                return Err(ShardError::RollbackFailed {
                    key: reservation_key.clone(),
                    count,
                });
            }
            txn.write(&customer_key, Some(Record::Customer(record)));
            Ok(())
        })
    }

    fn check_customer_shard(&self, command: &str) -> Result<()> {
        if self.kind() == ShardKind::Customer {
            Ok(())
        } else {
            Err(self.unsupported(command))
        }
    }
}

fn read_customer(txn: &TxnScope<'_>, key: &str) -> Option<Customer> {
    txn.read(key).and_then(Record::into_customer)
}

/// Reservation keys must name a flight, car or room
fn inventory_key(raw: &str) -> Result<String> {
    let key = normalize_key(raw);
    match ShardKind::owning(&key).and_then(|kind| kind.item_kind()) {
        Some(_) => Ok(key),
        None => Err(ShardError::InvalidArgument(format!(
            "not an inventory key: {raw}"
        ))),
    }
}
