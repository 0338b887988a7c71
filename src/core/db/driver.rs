/// Driver Module
///
/// The contract between the connection manager and a concrete database
/// client. Only the operations listed here are reachable through the manager;
/// anything else a client offers must be added to these traits explicitly.
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::core::value::{FilterValue, Row};

/// How the manager should react to a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// The connection was lost or is unusable; reconnect and retry once.
    Transient,
    /// Anything else (syntax, constraint violation, ...); never retried.
    Other,
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverErrorKind::Transient => f.write_str("transient"),
            DriverErrorKind::Other => f.write_str("driver"),
        }
    }
}

/// An error reported by a [`Driver`] or [`Session`].
#[derive(Error, Debug)]
#[error("{kind} error: {message}")]
pub struct DriverError {
    kind: DriverErrorKind,
    code: Option<i32>,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        DriverError {
            kind,
            code: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Transient, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Other, message)
    }

    /// Attaches the native error code of the client.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> DriverErrorKind {
        self.kind
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_transient(&self) -> bool {
        self.kind == DriverErrorKind::Transient
    }
}

/// Everything a driver needs to open a session.
#[derive(Clone, PartialEq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub db: String,
    pub user: String,
    pub passwd: String,
    pub charset: String,
    pub autocommit: bool,
    /// Bounds the connection attempt only, never statement execution.
    pub connect_timeout: Duration,
    /// How long a statement may wait on a busy or locked database.
    pub statement_timeout: Duration,
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("user", &self.user)
            .field("passwd", &"<redacted>")
            .field("charset", &self.charset)
            .field("autocommit", &self.autocommit)
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

/// Opens sessions. Implementations must be shareable across threads.
pub trait Driver: Send + Sync {
    /// Opens a new session, applying `charset` and `autocommit` before
    /// returning it.
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>, DriverError>;
}

/// One live database session.
///
/// Statement text uses `%s` placeholders, one per entry of `params`; `%%`
/// stands for a literal `%`.
pub trait Session: Send {
    /// Identifier assigned by the server or driver, used for diagnostics.
    fn session_id(&self) -> String;

    /// Executes a statement and returns the affected (or matched) row count.
    /// Rows produced by the statement are buffered until [`fetch_all`].
    ///
    /// [`fetch_all`]: Session::fetch_all
    fn execute(&mut self, sql: &str, params: &[FilterValue]) -> Result<u64, DriverError>;

    /// Drains the rows buffered by the last `execute`.
    fn fetch_all(&mut self) -> Result<Vec<Row>, DriverError>;

    fn commit(&mut self) -> Result<(), DriverError>;

    /// Releases the session. Closing twice is an error.
    fn close(&mut self) -> Result<(), DriverError>;

    /// Identifier generated by the last successful insert.
    fn last_insert_id(&self) -> u64;
}
