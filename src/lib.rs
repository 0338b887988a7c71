//! sqlwrap keeps a database session alive behind a small set of data
//! operations.
//!
//! A [`ConnectionManager`] owns one driver session (or opens one per call),
//! reconnects when the driver reports a lost connection, and retries the
//! failed statement once. The [`builder`](core::db::builder) module turns
//! tables, filters, projections and limits into parameterized SQL.
//!
//! ```no_run
//! use sqlwrap::{filter, value_set, ConnectionConfig, ConnectionManager, Projection, SqliteDriver};
//!
//! let config = ConnectionConfig::new("root", "", "app.db");
//! let db = ConnectionManager::new(config, SqliteDriver::new())?;
//! db.insert("users", &value_set([("name", "alice")]))?;
//! let found = db.select("users", &filter([("name", "alice")]), &Projection::All, 1)?;
//! println!("{} row(s)", found.row_count);
//! # Ok::<(), sqlwrap::SqlwrapError>(())
//! ```

// Core infrastructure modules
pub mod core;

pub mod config;

pub use crate::config::{load_config, ConnectionConfig};
pub use crate::core::db::{
    ConnectionManager, ConnectionState, Driver, DriverError, DriverErrorKind, Session, SqliteDriver,
};
pub use crate::core::{
    filter, value_set, Filter, FilterValue, Projection, QueryResult, Result, Row, SqlwrapError, Value,
    ValueSet,
};
