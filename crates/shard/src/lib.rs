//! Transactional resource shard
//!
//! A shard owns one class of record (flights, cars, rooms or customers) and
//! runs every operation under strict two-phase locking. Writes are staged per
//! transaction and installed atomically when the coordinator commits.

pub mod config;
mod customer;
pub mod engine;
pub mod error;
mod inventory;
pub mod participant;
pub mod server;
pub mod snapshot;
pub mod storage;

pub use config::ShardConfig;
pub use engine::ShardStore;
pub use error::{Result, ShardError};
pub use participant::TransactionParticipant;
pub use server::ShardServer;
pub use snapshot::ShardSnapshot;
pub use storage::{
    Customer, LockManager, LockMode, LockOutcome, Record, ReservableItem, ReservedItem, TxnPhase,
};
