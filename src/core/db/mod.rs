/// Database Module
///
/// ## Architecture
///
/// - **Driver contract** (`driver.rs`): the traits a database client implements
/// - **Query building** (`builder.rs`): pure SQL fragment and statement construction
/// - **Connection management** (`connection.rs`): session lifecycle and the
///   reconnect-and-retry policy
/// - **SQLite driver** (`sqlite.rs`): an in-process driver built on rusqlite
///
/// ## Error Handling
///
/// Fallible operations return the crate-wide `SqlwrapError`; driver failures
/// keep their transient/other classification.
pub mod builder;
pub mod connection;
pub mod driver;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{ConnectionManager, ConnectionState};
pub use driver::{ConnectParams, Driver, DriverError, DriverErrorKind, Session};
pub use sqlite::SqliteDriver;
