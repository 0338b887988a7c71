/// SQLite Driver Module
///
/// An in-process [`Driver`] backed by rusqlite. The `db` option names the
/// database file (empty means an in-memory database); host, port and
/// credentials are ignored.
///
/// `%s` placeholders are rewritten to `?`, a set parameter expands to
/// `(?, ?, ...)`, and a `UNIX_TIMESTAMP(x)` scalar function is registered so
/// date-column projections work unchanged. The bundled SQLite has no
/// `UPDATE`/`DELETE ... LIMIT`, so a trailing limit on those statements is
/// rewritten into a `rowid` subquery; tables without a rowid cannot take it.
///
/// Locked databases are waited on for `statement_timeout` only.
use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::core::db::builder::TIMESTAMP_FORMAT;
use crate::core::db::driver::{ConnectParams, Driver, DriverError, Session};
use crate::core::value::{FilterValue, Row, Value};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const SUPPORTED_CHARSETS: &[&str] = &["utf8", "utf8mb4", "utf-8"];

/// A backtick-quoted, optionally schema-qualified table.
const QUOTED_TABLE: &str = r"`(?:[^`]|``)*`(?:\.`(?:[^`]|``)*`)?";

static LIMITED_DELETE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?s)^DELETE FROM ({QUOTED_TABLE})(?: (WHERE .*?))? LIMIT (\d+)$"))
        .expect("delete pattern is valid")
});

static LIMITED_UPDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?s)^UPDATE ({QUOTED_TABLE}) SET (.*?)(?: (WHERE .*?))? LIMIT (\d+)$"
    ))
    .expect("update pattern is valid")
});

/// Opens SQLite sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        SqliteDriver
    }
}

impl From<rusqlite::Error> for DriverError {
    fn from(e: rusqlite::Error) -> Self {
        let (kind_transient, code) = match &e {
            rusqlite::Error::SqliteFailure(failure, _) => (
                matches!(
                    failure.code,
                    ErrorCode::DatabaseBusy
                        | ErrorCode::DatabaseLocked
                        | ErrorCode::CannotOpen
                        | ErrorCode::SystemIoFailure
                ),
                Some(failure.extended_code),
            ),
            _ => (false, None),
        };
        let err = if kind_transient {
            DriverError::transient(e.to_string())
        } else {
            DriverError::other(e.to_string())
        };
        let err = match code {
            Some(code) => err.with_code(code),
            None => err,
        };
        err.with_source(e)
    }
}

impl Driver for SqliteDriver {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>, DriverError> {
        if !SUPPORTED_CHARSETS.contains(&params.charset.to_lowercase().as_str()) {
            return Err(DriverError::other(format!(
                "unsupported character set '{}'",
                params.charset
            )));
        }

        let path = if params.db.is_empty() { ":memory:" } else { params.db.as_str() };
        let conn = Connection::open(path)?;
        conn.busy_timeout(params.statement_timeout)?;
        register_functions(&conn)?;

        let id = Uuid::new_v4().to_string();
        debug!(path, session_id = %id, "sqlite session opened");
        Ok(Box::new(SqliteSession {
            conn: Some(conn),
            id,
            autocommit: params.autocommit,
            pending: Vec::new(),
        }))
    }
}

/// One open SQLite connection.
pub struct SqliteSession {
    conn: Option<Connection>,
    id: String,
    autocommit: bool,
    pending: Vec<Row>,
}

impl SqliteSession {
    fn conn(&self) -> Result<&Connection, DriverError> {
        self.conn
            .as_ref()
            .ok_or_else(|| DriverError::transient("session is closed"))
    }
}

impl Session for SqliteSession {
    fn session_id(&self) -> String {
        self.id.clone()
    }

    fn execute(&mut self, sql: &str, params: &[FilterValue]) -> Result<u64, DriverError> {
        self.pending.clear();
        let sql = rewrite_limited_write(sql);
        let (sql, values) = expand_placeholders(&sql, params)?;
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| DriverError::transient("session is closed"))?;

        if !self.autocommit && conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }

        let mut stmt = conn.prepare(&sql)?;
        if stmt.column_count() == 0 {
            let affected = stmt.execute(params_from_iter(values.iter()))?;
            return Ok(affected as u64);
        }

        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
            .into();
        let column_count = columns.len();

        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                (0..column_count)
                    .map(|i| row.get_ref(i).map(from_sqlite))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        self.pending = rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect();
        Ok(self.pending.len() as u64)
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>, DriverError> {
        self.conn()?;
        Ok(std::mem::take(&mut self.pending))
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.conn()?.execute_batch("COMMIT")?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.pending.clear();
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, e)| e.into()),
            None => Err(DriverError::other("session already closed")),
        }
    }

    fn last_insert_id(&self) -> u64 {
        self.conn
            .as_ref()
            .map_or(0, |c| u64::try_from(c.last_insert_rowid()).unwrap_or(0))
    }
}

fn to_sqlite(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Int(i) => SqlValue::Integer(*i),
        Value::UInt(u) => match i64::try_from(*u) {
            Ok(i) => SqlValue::Integer(i),
            Err(_) => SqlValue::Text(u.to_string()),
        },
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

/// Moves a trailing `LIMIT n` on an UPDATE or DELETE into
/// `WHERE rowid IN (SELECT rowid FROM t [WHERE ...] LIMIT n)`. Placeholder
/// order is unchanged.
fn rewrite_limited_write(sql: &str) -> Cow<'_, str> {
    if let Some(caps) = LIMITED_DELETE.captures(sql) {
        let table = &caps[1];
        let filter = caps.get(2).map_or(String::new(), |m| format!(" {}", m.as_str()));
        return Cow::Owned(format!(
            "DELETE FROM {table} WHERE rowid IN (SELECT rowid FROM {table}{filter} LIMIT {})",
            &caps[3]
        ));
    }
    if let Some(caps) = LIMITED_UPDATE.captures(sql) {
        let table = &caps[1];
        let filter = caps.get(3).map_or(String::new(), |m| format!(" {}", m.as_str()));
        return Cow::Owned(format!(
            "UPDATE {table} SET {} WHERE rowid IN (SELECT rowid FROM {table}{filter} LIMIT {})",
            &caps[2], &caps[4]
        ));
    }
    Cow::Borrowed(sql)
}

/// Rewrites `%s` placeholders to `?` and flattens the parameters.
fn expand_placeholders(
    sql: &str,
    params: &[FilterValue],
) -> Result<(String, Vec<SqlValue>), DriverError> {
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::with_capacity(params.len());
    let mut params = params.iter();
    let mut chars = sql.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => {
                let param = params
                    .next()
                    .ok_or_else(|| DriverError::other("not enough parameters for SQL text"))?;
                match param {
                    FilterValue::Scalar(v) => {
                        out.push('?');
                        values.push(to_sqlite(v));
                    }
                    // an empty set matches nothing
                    FilterValue::Set(set) if set.is_empty() => out.push_str("(NULL)"),
                    FilterValue::Set(set) => {
                        out.push('(');
                        for (i, v) in set.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            out.push('?');
                            values.push(to_sqlite(v));
                        }
                        out.push(')');
                    }
                }
            }
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }

    if params.next().is_some() {
        return Err(DriverError::other("too many parameters for SQL text"));
    }
    Ok((out, values))
}

fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "UNIX_TIMESTAMP",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| match ctx.get_raw(0) {
            ValueRef::Null => Ok(None),
            ValueRef::Integer(i) => Ok(Some(i)),
            ValueRef::Real(f) => Ok(Some(f as i64)),
            ValueRef::Text(t) => std::str::from_utf8(t)
                .map_err(BoxError::from)
                .and_then(unix_timestamp)
                .map(Some)
                .map_err(rusqlite::Error::UserFunctionError),
            ValueRef::Blob(_) => Err(rusqlite::Error::UserFunctionError(
                "UNIX_TIMESTAMP expects a date".into(),
            )),
        },
    )
}

/// Seconds since the epoch for a local `YYYY-MM-DD[ HH:MM:SS]` timestamp.
fn unix_timestamp(text: &str) -> Result<i64, BoxError> {
    let naive = match NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT) {
        Ok(naive) => naive,
        Err(_) => NaiveDate::parse_from_str(text, "%Y-%m-%d")?
            .and_hms_opt(0, 0, 0)
            .ok_or("invalid date")?,
    };
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or("local time does not exist")?;
    Ok(local.timestamp())
}
