//! Common types for the travel reservation service
//!
//! This crate defines:
//! - Transaction ids allocated by the coordinator
//! - Customer ids and their record keys
//! - Shard and item kind discriminators
//! - Key normalisation shared by the coordinator and every shard

mod customer_id;
mod error;
mod key;
mod shard_kind;
mod transaction_id;

pub use customer_id::CustomerId;
pub use error::{IdError, Result};
pub use key::{normalize_key, split_key};
pub use shard_kind::{ItemKind, ShardKind};
pub use transaction_id::TxnId;
