mod id;
mod market;
mod transaction;

pub use id::RecordId;
pub use market::Market;
pub use transaction::{NewTransaction, RawTransaction, TransactionKind, TransactionRecord};
