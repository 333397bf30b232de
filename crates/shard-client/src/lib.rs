//! Coordinator-side connections to resource shards

pub mod connection;
pub mod error;
pub mod transport;

pub use connection::ShardConnection;
pub use error::{ConnectionError, Result};
pub use transport::ShardTransport;
