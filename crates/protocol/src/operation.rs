//! Data operations carried in client batches and shard requests
//!
//! The same grammar is used on both hops: the client sends `AddFlight,111,2,100`
//! to the coordinator, and the coordinator forwards it as `<tid>,AddFlight,111,2,100`
//! to the flight shard. Orchestrated operations (`Bundle`, the coordinator-side
//! `ReserveFlight` etc.) reuse the same parsed form.

use crate::error::{ProtocolError, Result};
use std::fmt;
use travel_common::{CustomerId, ItemKind, ShardKind, normalize_key};

/// Inventory verbs; each has a per-kind wire spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemVerb {
    Add,
    Delete,
    QueryCount,
    QueryPrice,
    Reserve,
    Exists,
}

impl ItemVerb {
    pub const ALL: [ItemVerb; 6] = [
        ItemVerb::Add,
        ItemVerb::Delete,
        ItemVerb::QueryCount,
        ItemVerb::QueryPrice,
        ItemVerb::Reserve,
        ItemVerb::Exists,
    ];

    /// Command token for this verb on the given item kind
    pub fn wire_name(&self, kind: ItemKind) -> &'static str {
        match (self, kind) {
            (ItemVerb::Add, ItemKind::Flight) => "AddFlight",
            (ItemVerb::Add, ItemKind::Car) => "AddCars",
            (ItemVerb::Add, ItemKind::Room) => "AddRooms",
            (ItemVerb::Delete, ItemKind::Flight) => "DeleteFlight",
            (ItemVerb::Delete, ItemKind::Car) => "DeleteCars",
            (ItemVerb::Delete, ItemKind::Room) => "DeleteRooms",
            (ItemVerb::QueryCount, ItemKind::Flight) => "QueryFlight",
            (ItemVerb::QueryCount, ItemKind::Car) => "QueryCars",
            (ItemVerb::QueryCount, ItemKind::Room) => "QueryRooms",
            (ItemVerb::QueryPrice, ItemKind::Flight) => "QueryFlightPrice",
            (ItemVerb::QueryPrice, ItemKind::Car) => "QueryCarsPrice",
            (ItemVerb::QueryPrice, ItemKind::Room) => "QueryRoomsPrice",
            (ItemVerb::Reserve, ItemKind::Flight) => "ReserveFlight",
            (ItemVerb::Reserve, ItemKind::Car) => "ReserveCar",
            (ItemVerb::Reserve, ItemKind::Room) => "ReserveRoom",
            (ItemVerb::Exists, ItemKind::Flight) => "FlightExists",
            (ItemVerb::Exists, ItemKind::Car) => "CarExists",
            (ItemVerb::Exists, ItemKind::Room) => "RoomExists",
        }
    }

    fn lookup(command: &str) -> Option<(ItemVerb, ItemKind)> {
        ItemVerb::ALL
            .into_iter()
            .flat_map(|verb| ItemKind::ALL.into_iter().map(move |kind| (verb, kind)))
            .find(|(verb, kind)| verb.wire_name(*kind) == command)
    }
}

/// A single data operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create the item, or add `count` to it; a positive `price` overwrites the price
    AddItem {
        kind: ItemKind,
        id: String,
        count: i64,
        price: i64,
    },

    /// Remove an item that has no reservations
    DeleteItem { kind: ItemKind, id: String },

    /// Available count, 0 when absent
    QueryCount { kind: ItemKind, id: String },

    /// Unit price, 0 when absent
    QueryPrice { kind: ItemKind, id: String },

    ItemExists { kind: ItemKind, id: String },

    /// Take one unit of inventory for a customer
    Reserve {
        kind: ItemKind,
        customer: CustomerId,
        id: String,
    },

    /// Reserved count of an item; `key` is a full key or a bare suffix
    QueryReserved { key: String },

    /// Give back `count` reserved units (inventory shard) or drop them from
    /// the customer's reservations (customer shard)
    RollbackReserve {
        customer: CustomerId,
        key: String,
        count: i64,
    },

    /// Create a customer with a shard-allocated id
    AddCustomer,

    AddCustomerId { customer: CustomerId },

    DeleteCustomer { customer: CustomerId },

    /// Customer bill
    QueryCustomer { customer: CustomerId },

    CustomerExists { customer: CustomerId },

    /// Record `count` units of `key` at `price` against a customer
    CustomerReserve {
        customer: CustomerId,
        key: String,
        count: i64,
        price: i64,
    },

    /// Reservation list of a customer record, addressed by its full key
    GetItem { key: String },

    /// Reserve every listed flight, then optionally a car and a room at `location`
    Bundle {
        customer: CustomerId,
        flights: Vec<String>,
        location: String,
        car: bool,
        room: bool,
    },
}

impl Operation {
    /// Parse an operation line (without the leading tid)
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let command = fields[0];
        if command.is_empty() {
            return Err(ProtocolError::Empty);
        }
        let args = &fields[1..];

        if let Some((verb, kind)) = ItemVerb::lookup(command) {
            return Self::parse_item(command, verb, kind, args);
        }

        match command {
            "QueryReserved" => {
                expect_args(command, args, 1)?;
                Ok(Operation::QueryReserved {
                    key: non_empty(command, args[0])?,
                })
            }
            "rollbackReserve" | "RollbackReserve" => {
                expect_args(command, args, 3)?;
                Ok(Operation::RollbackReserve {
                    customer: customer(command, args[0])?,
                    key: non_empty(command, args[1])?,
                    count: int(command, args[2])?,
                })
            }
            "AddCustomer" => {
                expect_args(command, args, 0)?;
                Ok(Operation::AddCustomer)
            }
            "AddCustomerID" => {
                expect_args(command, args, 1)?;
                Ok(Operation::AddCustomerId {
                    customer: customer(command, args[0])?,
                })
            }
            "DeleteCustomer" => {
                expect_args(command, args, 1)?;
                Ok(Operation::DeleteCustomer {
                    customer: customer(command, args[0])?,
                })
            }
            "QueryCustomer" => {
                expect_args(command, args, 1)?;
                Ok(Operation::QueryCustomer {
                    customer: customer(command, args[0])?,
                })
            }
            "CustomerExists" => {
                expect_args(command, args, 1)?;
                Ok(Operation::CustomerExists {
                    customer: customer(command, args[0])?,
                })
            }
            "CustomerReserve" => {
                expect_args(command, args, 4)?;
                Ok(Operation::CustomerReserve {
                    customer: customer(command, args[0])?,
                    key: non_empty(command, args[1])?,
                    count: int(command, args[2])?,
                    price: int(command, args[3])?,
                })
            }
            "getItem" => {
                expect_args(command, args, 1)?;
                Ok(Operation::GetItem {
                    key: non_empty(command, args[0])?,
                })
            }
            "Bundle" => Self::parse_bundle(command, args),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    fn parse_item(command: &str, verb: ItemVerb, kind: ItemKind, args: &[&str]) -> Result<Self> {
        match verb {
            ItemVerb::Add => {
                expect_args(command, args, 3)?;
                Ok(Operation::AddItem {
                    kind,
                    id: non_empty(command, args[0])?,
                    count: int(command, args[1])?,
                    price: int(command, args[2])?,
                })
            }
            ItemVerb::Reserve => {
                expect_args(command, args, 2)?;
                Ok(Operation::Reserve {
                    kind,
                    customer: customer(command, args[0])?,
                    id: non_empty(command, args[1])?,
                })
            }
            ItemVerb::Delete | ItemVerb::QueryCount | ItemVerb::QueryPrice | ItemVerb::Exists => {
                expect_args(command, args, 1)?;
                let id = non_empty(command, args[0])?;
                Ok(match verb {
                    ItemVerb::Delete => Operation::DeleteItem { kind, id },
                    ItemVerb::QueryCount => Operation::QueryCount { kind, id },
                    ItemVerb::QueryPrice => Operation::QueryPrice { kind, id },
                    _ => Operation::ItemExists { kind, id },
                })
            }
        }
    }

    // Bundle,<cid>,<flight>*,<location>,<car>,<room>
    fn parse_bundle(command: &str, args: &[&str]) -> Result<Self> {
        if args.len() < 4 {
            return Err(ProtocolError::bad_args(
                command,
                format!("expected at least 4 fields, got {}", args.len()),
            ));
        }
        let n = args.len();
        let flights = args[1..n - 3]
            .iter()
            .map(|f| non_empty(command, f))
            .collect::<Result<Vec<_>>>()?;

        Ok(Operation::Bundle {
            customer: customer(command, args[0])?,
            flights,
            location: non_empty(command, args[n - 3])?,
            car: boolean(command, args[n - 2])?,
            room: boolean(command, args[n - 1])?,
        })
    }

    /// Command token as it appears on the wire
    pub fn command_name(&self) -> &'static str {
        match self {
            Operation::AddItem { kind, .. } => ItemVerb::Add.wire_name(*kind),
            Operation::DeleteItem { kind, .. } => ItemVerb::Delete.wire_name(*kind),
            Operation::QueryCount { kind, .. } => ItemVerb::QueryCount.wire_name(*kind),
            Operation::QueryPrice { kind, .. } => ItemVerb::QueryPrice.wire_name(*kind),
            Operation::ItemExists { kind, .. } => ItemVerb::Exists.wire_name(*kind),
            Operation::Reserve { kind, .. } => ItemVerb::Reserve.wire_name(*kind),
            Operation::QueryReserved { .. } => "QueryReserved",
            Operation::RollbackReserve { .. } => "rollbackReserve",
            Operation::AddCustomer => "AddCustomer",
            Operation::AddCustomerId { .. } => "AddCustomerID",
            Operation::DeleteCustomer { .. } => "DeleteCustomer",
            Operation::QueryCustomer { .. } => "QueryCustomer",
            Operation::CustomerExists { .. } => "CustomerExists",
            Operation::CustomerReserve { .. } => "CustomerReserve",
            Operation::GetItem { .. } => "getItem",
            Operation::Bundle { .. } => "Bundle",
        }
    }

    /// Shard that executes this operation when it is forwarded as-is.
    ///
    /// Key-addressed operations are routed by key prefix; `None` means the
    /// key carries no recognisable prefix, or the operation is a `Bundle`.
    pub fn home_shard(&self) -> Option<ShardKind> {
        match self {
            Operation::AddItem { kind, .. }
            | Operation::DeleteItem { kind, .. }
            | Operation::QueryCount { kind, .. }
            | Operation::QueryPrice { kind, .. }
            | Operation::ItemExists { kind, .. }
            | Operation::Reserve { kind, .. } => Some(kind.shard()),
            Operation::QueryReserved { key }
            | Operation::RollbackReserve { key, .. }
            | Operation::GetItem { key } => ShardKind::owning(&normalize_key(key)),
            Operation::AddCustomer
            | Operation::AddCustomerId { .. }
            | Operation::DeleteCustomer { .. }
            | Operation::QueryCustomer { .. }
            | Operation::CustomerExists { .. }
            | Operation::CustomerReserve { .. } => Some(ShardKind::Customer),
            Operation::Bundle { .. } => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.command_name();
        match self {
            Operation::AddItem {
                id, count, price, ..
            } => write!(f, "{name},{id},{count},{price}"),
            Operation::DeleteItem { id, .. }
            | Operation::QueryCount { id, .. }
            | Operation::QueryPrice { id, .. }
            | Operation::ItemExists { id, .. } => write!(f, "{name},{id}"),
            Operation::Reserve { customer, id, .. } => write!(f, "{name},{customer},{id}"),
            Operation::QueryReserved { key } | Operation::GetItem { key } => {
                write!(f, "{name},{key}")
            }
            Operation::RollbackReserve {
                customer,
                key,
                count,
            } => write!(f, "{name},{customer},{key},{count}"),
            Operation::AddCustomer => f.write_str(name),
            Operation::AddCustomerId { customer }
            | Operation::DeleteCustomer { customer }
            | Operation::QueryCustomer { customer }
            | Operation::CustomerExists { customer } => write!(f, "{name},{customer}"),
            Operation::CustomerReserve {
                customer,
                key,
                count,
                price,
            } => write!(f, "{name},{customer},{key},{count},{price}"),
            Operation::Bundle {
                customer,
                flights,
                location,
                car,
                room,
            } => {
                write!(f, "{name},{customer}")?;
                for flight in flights {
                    write!(f, ",{flight}")?;
                }
                write!(f, ",{location},{car},{room}")
            }
        }
    }
}

fn expect_args(command: &str, args: &[&str], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(ProtocolError::bad_args(
            command,
            format!("expected {expected} fields, got {}", args.len()),
        ));
    }
    Ok(())
}

fn non_empty(command: &str, value: &str) -> Result<String> {
    if value.is_empty() {
        return Err(ProtocolError::bad_args(command, "empty field"));
    }
    Ok(value.to_string())
}

fn int(command: &str, value: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|_| ProtocolError::bad_args(command, format!("not an integer: {value:?}")))
}

fn customer(command: &str, value: &str) -> Result<CustomerId> {
    CustomerId::parse(value).map_err(|e| ProtocolError::bad_args(command, e.to_string()))
}

fn boolean(command: &str, value: &str) -> Result<bool> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ProtocolError::bad_args(
            command,
            format!("not a boolean: {value:?}"),
        ))
    }
}
