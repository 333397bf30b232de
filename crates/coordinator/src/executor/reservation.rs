//! Multi-shard sequences run under a single tid
//!
//! Every step stages work on a shard and enlists it as a participant, so a
//! failure part way through is undone by the abort that follows. Lock
//! denials and transport errors from a check are passed through unchanged.

use tracing::{debug, warn};
use travel_common::{CustomerId, ItemKind, ShardKind, TxnId};
use travel_protocol::{Operation, Reply};

use super::Executor;

impl Executor {
    /// Reserve one unit of an item for a customer and record it on the customer
    pub(super) async fn reserve(
        &self,
        tid: TxnId,
        kind: ItemKind,
        customer: CustomerId,
        id: &str,
    ) -> Reply {
        let label = kind.label();
        let shard = kind.shard();

        let exists = self
            .send(tid, ShardKind::Customer, Operation::CustomerExists { customer })
            .await;
        if exists.is_failure() {
            return exists;
        }
        if exists.value_bool() != Some(true) {
            return Reply::fail("CustomerDoesNotExist");
        }

        let found = self
            .send(
                tid,
                shard,
                Operation::ItemExists {
                    kind,
                    id: id.to_string(),
                },
            )
            .await;
        if found.is_failure() {
            return found;
        }
        if found.value_bool() != Some(true) {
            return Reply::fail(format!("{label}NotFound"));
        }

        let price = self
            .send(
                tid,
                shard,
                Operation::QueryPrice {
                    kind,
                    id: id.to_string(),
                },
            )
            .await;
        if price.is_failure() {
            return price;
        }
        let Some(price) = price.value_i64() else {
            return Reply::fail(format!("{label}NotFound"));
        };

        let reserved = self
            .send(
                tid,
                shard,
                Operation::Reserve {
                    kind,
                    customer,
                    id: id.to_string(),
                },
            )
            .await;
        if !reserved.is_ok() {
            return Reply::fail(format!("{label}NotReserved"));
        }

        let key = kind.key(id);
        let recorded = self
            .send(
                tid,
                ShardKind::Customer,
                Operation::CustomerReserve {
                    customer,
                    key: key.clone(),
                    count: 1,
                    price,
                },
            )
            .await;
        if !recorded.is_ok() {
            let undo = self
                .send(
                    tid,
                    shard,
                    Operation::RollbackReserve {
                        customer,
                        key: key.clone(),
                        count: 1,
                    },
                )
                .await;
            if undo.is_failure() {
                warn!(%tid, %key, reply = %undo, "Could not return reserved unit");
            }
            return Reply::fail("CouldNotUpdateCustomer");
        }

        debug!(%tid, %customer, %key, price, "Reserved");
        Reply::ok_with(format!("{label}Reserved"))
    }

    /// Reserve every flight, then a car and a room at `location` when asked.
    ///
    /// Stops at the first failing leg; the staged legs are discarded by the abort.
    pub(super) async fn bundle(
        &self,
        tid: TxnId,
        customer: CustomerId,
        flights: &[String],
        location: &str,
        car: bool,
        room: bool,
    ) -> Reply {
        let mut legs: Vec<(ItemKind, &str)> = flights
            .iter()
            .map(|flight| (ItemKind::Flight, flight.as_str()))
            .collect();
        if car {
            legs.push((ItemKind::Car, location));
        }
        if room {
            legs.push((ItemKind::Room, location));
        }

        for (kind, id) in legs {
            let reply = self.reserve(tid, kind, customer, id).await;
            if reply.is_failure() {
                let leg = Operation::Reserve {
                    kind,
                    customer,
                    id: id.to_string(),
                };
                debug!(%tid, %leg, %reply, "Bundle leg failed");
                return Reply::fail(format!("BundleFailed -> {leg}"));
            }
        }
        Reply::ok_with("BundleSuccess")
    }

    /// Delete an item only if it exists and nobody holds a reservation on it
    pub(super) async fn delete_item(&self, tid: TxnId, kind: ItemKind, id: &str) -> Reply {
        let label = kind.label();
        let shard = kind.shard();

        let exists = self
            .send(
                tid,
                shard,
                Operation::ItemExists {
                    kind,
                    id: id.to_string(),
                },
            )
            .await;
        if exists.is_failure() {
            return exists;
        }
        if exists.value_bool() != Some(true) {
            return Reply::fail(format!("{label}NotFound"));
        }

        let reserved = self
            .send(tid, shard, Operation::QueryReserved { key: kind.key(id) })
            .await;
        if reserved.is_failure() {
            return reserved;
        }
        match reserved.value_i64() {
            None => return Reply::fail("QueryReservedError"),
            Some(n) if n > 0 => return Reply::fail(format!("{label}HasReservations")),
            Some(_) => {}
        }

        self.send(
            tid,
            shard,
            Operation::DeleteItem {
                kind,
                id: id.to_string(),
            },
        )
        .await
    }

    /// Return every reserved unit of a customer to its shard, then delete the customer
    pub(super) async fn delete_customer(&self, tid: TxnId, customer: CustomerId) -> Reply {
        let listing = self
            .send(
                tid,
                ShardKind::Customer,
                Operation::GetItem {
                    key: customer.key(),
                },
            )
            .await;
        if !listing.is_ok() {
            return Reply::fail("NoSuchCustomer");
        }

        let mut rolled_back = true;
        for (key, count) in parse_reservations(listing.value().unwrap_or_default()) {
            let Some(shard) = ShardKind::owning(&key).filter(|kind| kind.item_kind().is_some())
            else {
                warn!(%tid, %customer, %key, "Skipping reservation with unknown key");
                continue;
            };

            let reply = self
                .send(
                    tid,
                    shard,
                    Operation::RollbackReserve {
                        customer,
                        key: key.clone(),
                        count,
                    },
                )
                .await;
            if reply.is_failure() {
                warn!(%tid, %customer, %key, %reply, "Rollback of reservation failed");
                rolled_back = false;
            }
        }
        if !rolled_back {
            return Reply::fail("RollbackFailed");
        }

        let deleted = self
            .send(
                tid,
                ShardKind::Customer,
                Operation::DeleteCustomer { customer },
            )
            .await;
        if deleted.is_ok() {
            Reply::ok_with("CustomerDeleted")
        } else {
            Reply::fail("DeleteCustomerFailed")
        }
    }
}

/// Parse `<key>:<count>[;<key>:<count>]*`, skipping empty and non-positive entries
fn parse_reservations(listing: &str) -> Vec<(String, i64)> {
    listing
        .split(';')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            let (key, count) = match entry.split_once(':') {
                Some((key, count)) => (key.trim(), count.trim().parse().ok()?),
                None => (entry, 1),
            };
            (count > 0).then(|| (key.to_string(), count))
        })
        .collect()
}
