//! Records held by a shard

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use travel_common::CustomerId;

/// A flight, car location or room location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservableItem {
    pub key: String,
    /// Units still available
    pub count: i64,
    pub price: i64,
    /// Units handed out to customers
    pub reserved: i64,
}

impl ReservableItem {
    pub fn new(key: impl Into<String>, count: i64, price: i64) -> Self {
        Self {
            key: key.into(),
            count,
            price,
            reserved: 0,
        }
    }

    /// Both counters are non-negative
    pub fn is_consistent(&self) -> bool {
        self.count >= 0 && self.reserved >= 0
    }
}

/// One line of a customer's reservations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedItem {
    pub key: String,
    pub count: i64,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    /// Reservation key -> reserved units, ordered for stable output
    pub reservations: BTreeMap<String, ReservedItem>,
}

impl Customer {
    pub fn new(id: CustomerId) -> Self {
        Self {
            id,
            reservations: BTreeMap::new(),
        }
    }

    /// Add `count` units of `key`; the latest price wins.
    ///
    /// Returns false (and changes nothing) when the total would overflow.
    pub fn reserve(&mut self, key: &str, count: i64, price: i64) -> bool {
        match self.reservations.get_mut(key) {
            Some(item) => match item.count.checked_add(count) {
                Some(total) => {
                    item.count = total;
                    item.price = price;
                }
                None => return false,
            },
            None => {
                self.reservations.insert(
                    key.to_string(),
                    ReservedItem {
                        key: key.to_string(),
                        count,
                        price,
                    },
                );
            }
        }
        true
    }

    /// Drop `count` units of `key`, removing the line when it reaches zero.
    ///
    /// Returns false (and changes nothing) when fewer units are held.
    pub fn release(&mut self, key: &str, count: i64) -> bool {
        let Some(item) = self.reservations.get_mut(key) else {
            return false;
        };
        if item.count < count {
            return false;
        }
        item.count -= count;
        if item.count == 0 {
            self.reservations.remove(key);
        }
        true
    }

    /// `Bill for customer <id>: <count> <key> $<price> | ...`
    pub fn bill(&self) -> String {
        let lines: Vec<String> = self
            .reservations
            .values()
            .map(|item| format!("{} {} ${}", item.count, item.key, item.price))
            .collect();
        format!("Bill for customer {}: {}", self.id, lines.join(" | "))
            .trim_end()
            .to_string()
    }

    /// `<key>:<count>[;<key>:<count>]*`
    pub fn reservation_list(&self) -> String {
        self.reservations
            .values()
            .map(|item| format!("{}:{}", item.key, item.count))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Any value stored under a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    Item(ReservableItem),
    Customer(Customer),
}

impl Record {
    pub fn into_item(self) -> Option<ReservableItem> {
        match self {
            Record::Item(item) => Some(item),
            Record::Customer(_) => None,
        }
    }

    pub fn into_customer(self) -> Option<Customer> {
        match self {
            Record::Customer(customer) => Some(customer),
            Record::Item(_) => None,
        }
    }
}
