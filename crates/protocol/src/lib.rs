//! Protocol definitions for client, coordinator and shard communication
//!
//! Everything on the wire is an ASCII line with comma-separated fields. This
//! crate gives those lines types:
//! - [`Operation`]: the data operations clients batch and shards execute
//! - [`ShardRequest`]: `<tid>,<OP>[,<arg>]*` lines sent to a shard
//! - [`Reply`]: `OK` / `OK,<value>` / `FAIL,<reason>` / `ERROR,<reason>`
//! - [`ClientLine`] and [`TxnResult`]: the client session and its result block

pub mod error;
pub mod messages;
pub mod operation;
pub mod responses;
pub mod session;

pub use error::{ProtocolError, Result};
pub use messages::{ShardCommand, ShardRequest, TransactionPhase};
pub use operation::{ItemVerb, Operation};
pub use responses::{MALFORMED_REPLY, Reply};
pub use session::{
    ClientLine, NO_ACTIVE_TRANSACTION, OpEcho, TXN_RESULT_BEGIN, TXN_RESULT_END, TxnOutcome,
    TxnResult,
};
