//! Persistence: client state and the append-only message log.

pub mod libsql_backend;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::{ClientStore, DailyStats, StoreStats};
