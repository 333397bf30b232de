//! Transaction coordinator for the travel reservation shards
//!
//! Clients batch operations between `Start` and `Commit`/`Abort`. The
//! batch is queued for a fixed pool of workers; a worker routes each
//! operation to its shard, stops at the first failure, and then runs
//! two-phase commit over every shard the batch touched.

pub mod config;
pub mod error;
pub mod executor;
pub mod request;
pub mod server;
pub mod session;
pub mod transaction;
pub mod worker;

pub use config::CoordinatorConfig;
pub use error::{CoordinatorError, Result};
pub use executor::{Executor, ShardSet};
pub use request::{ResultSender, TxnRequest};
pub use server::CoordinatorServer;
pub use session::{Session, SessionAction};
pub use transaction::{TransactionManager, TransactionStatus};
pub use worker::spawn_workers;
