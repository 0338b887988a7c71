/// Core Module for sqlwrap
///
/// Shared infrastructure: error handling, the value model exchanged with
/// drivers, and the database layer itself.

pub mod db;
pub mod error;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{Result, SqlwrapError};
pub use value::{filter, value_set, Filter, FilterValue, Projection, QueryResult, Row, Value, ValueSet};
