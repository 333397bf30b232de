pub mod lock;
pub mod record;
pub mod workspace;

pub use lock::{LockManager, LockMode, LockOutcome};
pub use record::{Customer, Record, ReservableItem, ReservedItem};
pub use workspace::{TransactionContext, TxnPhase};
