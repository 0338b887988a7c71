/// Connection Management Module
///
/// Owns the live driver session, reconnects on demand, and runs the data
/// operations with a single reconnect-and-retry on transient failures.
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::config::ConnectionConfig;
use crate::core::db::builder::{self, InsertVerb, Statement};
use crate::core::db::driver::{Driver, DriverError, Session};
use crate::core::value::{Filter, FilterValue, Projection, QueryResult, Row, ValueSet};
use crate::core::{Result, SqlwrapError};

/// Where the shared session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session; the next operation connects first
    #[default]
    Disconnected,
    /// A session is open
    Connected,
    /// A transient failure was seen; reconnecting before the single retry
    Recovering,
}

/// Mutable connection state, guarded as a whole by the manager's mutex.
struct SharedHandle {
    session: Option<Box<dyn Session>>,
    state: ConnectionState,
    session_id: Option<String>,
    connect_duration: Option<Duration>,
    recoveries: u64,
}

/// Connection manager for database operations.
///
/// The connect/execute/retry sequence runs under one lock, so a manager can
/// be shared between threads; calls on a shared session are serialized. With
/// `separate_connect` every call opens, uses and closes its own session and
/// takes no lock.
pub struct ConnectionManager {
    config: ConnectionConfig,
    driver: Box<dyn Driver>,
    name: OnceCell<String>,
    shared: Mutex<SharedHandle>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("separate_connect", &self.config.separate_connect)
            .finish()
    }
}

impl ConnectionManager {
    /// Creates a manager and performs the initial connect.
    ///
    /// A failed initial connect is fatal only when `dummy` is off; otherwise
    /// the manager starts [`ConnectionState::Disconnected`].
    pub fn new<D: Driver + 'static>(config: ConnectionConfig, driver: D) -> Result<Self> {
        let manager = ConnectionManager {
            config,
            driver: Box::new(driver),
            name: OnceCell::new(),
            shared: Mutex::new(SharedHandle {
                session: None,
                state: ConnectionState::Disconnected,
                session_id: None,
                connect_duration: None,
                recoveries: 0,
            }),
        };
        manager.connect()?;
        Ok(manager)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Logical connection name, `host.db` unless configured.
    pub fn name(&self) -> &str {
        self.name.get_or_init(|| self.config.derived_name())
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Identifier of the most recently opened session.
    pub fn session_id(&self) -> Option<String> {
        self.lock().session_id.clone()
    }

    /// How long the most recent successful connect took.
    pub fn connect_duration(&self) -> Option<Duration> {
        self.lock().connect_duration
    }

    /// Number of reconnects triggered by transient failures.
    pub fn recovery_count(&self) -> u64 {
        self.lock().recoveries
    }

    fn lock(&self) -> MutexGuard<'_, SharedHandle> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a fresh session and records its metadata.
    fn open_session(&self, shared: &mut SharedHandle) -> std::result::Result<Box<dyn Session>, DriverError> {
        let start = Instant::now();
        match self.driver.connect(&self.config.connect_params()) {
            Ok(session) => {
                let elapsed = start.elapsed();
                let session_id = session.session_id();
                info!(
                    connection = %self.name(),
                    session_id = %session_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "connected"
                );
                shared.session_id = Some(session_id);
                shared.connect_duration = Some(elapsed);
                Ok(session)
            }
            Err(e) => {
                warn!(connection = %self.name(), error = %e, "connect failed");
                Err(e)
            }
        }
    }

    /// Replaces the shared session with a new one. The previous session is
    /// discarded even when the new connect fails.
    fn reconnect_locked(&self, shared: &mut SharedHandle) -> std::result::Result<(), DriverError> {
        if let Some(mut old) = shared.session.take() {
            if let Err(e) = old.close() {
                debug!(connection = %self.name(), error = %e, "previous session did not close cleanly");
            }
        }
        match self.open_session(shared) {
            Ok(session) => {
                shared.session = Some(session);
                shared.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                shared.session_id = None;
                shared.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Establishes a new session, replacing any current one.
    ///
    /// Returns `Ok(false)` instead of an error when the connect fails and
    /// `dummy` is on. With `separate_connect` this only checks that a session
    /// can be opened.
    pub fn connect(&self) -> Result<bool> {
        let mut shared = self.lock();
        let outcome = if self.config.separate_connect {
            self.open_session(&mut shared).map(|mut session| {
                if let Err(e) = session.close() {
                    debug!(connection = %self.name(), error = %e, "probe session did not close cleanly");
                }
            })
        } else {
            self.reconnect_locked(&mut shared)
        };

        match outcome {
            Ok(()) => Ok(true),
            Err(e) if self.config.dummy => {
                error!(connection = %self.name(), error = %e, "no connection, continuing disconnected");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Releases the shared session.
    ///
    /// Returns `false`, after logging, when there is no session or the driver
    /// fails to close it; never returns an error.
    pub fn close(&self) -> bool {
        let mut shared = self.lock();
        shared.state = ConnectionState::Disconnected;
        match shared.session.take() {
            Some(mut session) => match session.close() {
                Ok(()) => {
                    info!(connection = %self.name(), "connection closed");
                    true
                }
                Err(e) => {
                    error!(connection = %self.name(), error = %e, "connection close failed");
                    false
                }
            },
            None => {
                error!(connection = %self.name(), "close: no open connection");
                false
            }
        }
    }

    /// Commits the shared session's open transaction.
    ///
    /// Returns `false`, after logging, when the driver rejects the commit or
    /// there is no session. Dedicated sessions commit on their own.
    pub fn commit(&self) -> bool {
        if self.config.separate_connect {
            debug!(connection = %self.name(), "commit: separate sessions commit per operation");
            return true;
        }
        let mut shared = self.lock();
        match shared.session.as_deref_mut() {
            Some(session) => match session.commit() {
                Ok(()) => {
                    debug!(connection = %self.name(), "commit");
                    true
                }
                Err(e) => {
                    warn!(connection = %self.name(), error = %e, "commit failed");
                    false
                }
            },
            None => {
                warn!(connection = %self.name(), "commit: no open connection");
                false
            }
        }
    }

    /// Current local time as `YYYY-MM-DD HH:MM:SS`, for time-stamped values.
    pub fn now(&self) -> String {
        builder::now()
    }

    fn no_connection(&self, cause: impl fmt::Display) -> SqlwrapError {
        SqlwrapError::NoConnection(format!("{}: {cause}", self.name()))
    }

    /// Runs `op` against a session, applying the reconnect policy.
    fn run<T, F>(&self, sql: &str, mut op: F) -> Result<T>
    where
        F: FnMut(&mut dyn Session) -> std::result::Result<T, DriverError>,
    {
        if self.config.separate_connect {
            return self.run_dedicated(sql, op);
        }

        let mut guard = self.lock();
        let shared = &mut *guard;

        if shared.session.is_none() {
            debug!(connection = %self.name(), "not connected, connecting before execute");
            if let Err(e) = self.reconnect_locked(shared) {
                return Err(self.no_connection(e));
            }
        }

        let first = match shared.session.as_deref_mut() {
            Some(session) => op(session),
            None => return Err(self.no_connection("session missing after connect")),
        };

        match first {
            Ok(value) => Ok(value),
            Err(e) if e.is_transient() => {
                warn!(connection = %self.name(), error = %e, sql, "transient failure, reconnecting");
                shared.state = ConnectionState::Recovering;
                shared.recoveries += 1;
                if let Err(connect_err) = self.reconnect_locked(shared) {
                    error!(connection = %self.name(), error = %connect_err, "reconnect failed");
                    return Err(self.no_connection(format!("{e}; reconnect failed: {connect_err}")));
                }
                let retried = match shared.session.as_deref_mut() {
                    Some(session) => op(session),
                    None => return Err(self.no_connection("session missing after reconnect")),
                };
                retried.map_err(|retry_err| {
                    error!(connection = %self.name(), error = %retry_err, sql, "retry failed");
                    SqlwrapError::Driver(retry_err)
                })
            }
            Err(e) => {
                error!(connection = %self.name(), error = %e, sql, "execute failed");
                Err(e.into())
            }
        }
    }

    /// Runs `op` on a session opened for this call only.
    fn run_dedicated<T, F>(&self, sql: &str, mut op: F) -> Result<T>
    where
        F: FnMut(&mut dyn Session) -> std::result::Result<T, DriverError>,
    {
        let mut session = {
            let mut shared = self.lock();
            self.open_session(&mut shared).map_err(|e| self.no_connection(e))?
        };

        let mut result = op(session.as_mut());
        if result.is_ok() && !self.config.autocommit {
            if let Err(e) = session.commit() {
                result = Err(e);
            }
        }
        if let Err(e) = session.close() {
            debug!(connection = %self.name(), error = %e, "dedicated session did not close cleanly");
        }

        result.map_err(|e| {
            error!(connection = %self.name(), error = %e, sql, "execute failed");
            SqlwrapError::Driver(e)
        })
    }

    fn trace_statement(&self, sql: &str, params: &[FilterValue]) {
        if self.config.debug {
            trace!(connection = %self.name(), sql, params = ?params, "statement parameters");
        }
    }

    /// Executes arbitrary parameterized SQL and fetches every resulting row.
    ///
    /// No matching rows is `(0, [])`, not an error.
    pub fn query(&self, sql: &str, params: &[FilterValue]) -> Result<QueryResult> {
        self.trace_statement(sql, params);
        let start = Instant::now();

        let (found, rows) = self.run(sql, |session| {
            let found = session.execute(sql, params)?;
            let rows = session.fetch_all()?;
            Ok((found, rows))
        })?;

        debug!(
            connection = %self.name(),
            sql,
            params = params.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            found,
            "query"
        );

        let rows = if self.config.dict_cursor {
            rows
        } else {
            rows.into_iter().map(Row::into_positional).collect()
        };
        Ok(QueryResult::new(found, rows))
    }

    /// Like [`query`](Self::query) but keeps only the first row.
    pub fn query_one(&self, sql: &str, params: &[FilterValue]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.rows.into_iter().next())
    }

    /// Executes a statement that produces no rows and returns the affected
    /// row count.
    pub fn execute(&self, sql: &str, params: &[FilterValue]) -> Result<u64> {
        self.trace_statement(sql, params);
        let start = Instant::now();

        let affected = self.run(sql, |session| session.execute(sql, params))?;

        debug!(
            connection = %self.name(),
            sql,
            params = params.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            affected,
            "execute"
        );
        Ok(affected)
    }

    /// Unwraps a built statement, turning validation failures into a logged
    /// `None`.
    fn validated(&self, operation: &str, statement: Result<Statement>) -> Result<Option<Statement>> {
        match statement {
            Ok(statement) => Ok(Some(statement)),
            Err(SqlwrapError::Validation(msg)) => {
                warn!(connection = %self.name(), operation, "{msg}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn write(&self, operation: &str, statement: Result<Statement>) -> Result<u64> {
        match self.validated(operation, statement)? {
            Some(stmt) => self.execute(&stmt.sql, &stmt.params),
            None => Ok(0),
        }
    }

    /// `SELECT` matching rows. A missing table yields `(0, [])`.
    pub fn select(
        &self,
        table: &str,
        filter: &Filter,
        projection: &Projection,
        limit: u64,
    ) -> Result<QueryResult> {
        match self.validated("select", builder::select_statement(table, filter, projection, limit))? {
            Some(stmt) => self.query(&stmt.sql, &stmt.params),
            None => Ok(QueryResult::empty()),
        }
    }

    /// Inserts one row and returns the affected row count (0 on invalid input).
    pub fn insert(&self, table: &str, values: &ValueSet) -> Result<u64> {
        self.write("insert", builder::insert_statement(InsertVerb::Insert, table, values))
    }

    /// `REPLACE`s one row and returns the affected row count.
    pub fn replace(&self, table: &str, values: &ValueSet) -> Result<u64> {
        self.write("replace", builder::insert_statement(InsertVerb::Replace, table, values))
    }

    /// Inserts one row and returns the generated identifier (0 on invalid
    /// input).
    pub fn insert_id(&self, table: &str, values: &ValueSet) -> Result<u64> {
        let Some(stmt) = self.validated(
            "insert_id",
            builder::insert_statement(InsertVerb::Insert, table, values),
        )?
        else {
            return Ok(0);
        };
        self.trace_statement(&stmt.sql, &stmt.params);
        let start = Instant::now();

        let (affected, id) = self.run(&stmt.sql, |session| {
            let affected = session.execute(&stmt.sql, &stmt.params)?;
            Ok((affected, session.last_insert_id()))
        })?;

        debug!(
            connection = %self.name(),
            sql = %stmt.sql,
            params = stmt.params.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            affected,
            id,
            "insert_id"
        );
        Ok(id)
    }

    /// Updates matching rows. An empty `filter` updates every row.
    pub fn update(&self, table: &str, values: &ValueSet, filter: &Filter, limit: u64) -> Result<u64> {
        self.write("update", builder::update_statement(table, values, filter, limit))
    }

    /// Deletes matching rows. An empty `filter` deletes every row.
    pub fn delete(&self, table: &str, filter: &Filter, limit: u64) -> Result<u64> {
        self.write("delete", builder::delete_statement(table, filter, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::testing::ScriptedDriver;
    use crate::core::value::{filter, value_set, Value};
    use std::sync::Arc;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("root", "", "test")
    }

    fn connected(driver: &ScriptedDriver) -> ConnectionManager {
        ConnectionManager::new(config(), driver.clone()).unwrap()
    }

    fn rows(n: i64) -> Vec<Row> {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
        (1..=n)
            .map(|i| Row::new(columns.clone(), vec![Value::Int(i), Value::from(format!("n{i}"))]))
            .collect()
    }

    #[test]
    fn test_initial_connect() {
        let driver = ScriptedDriver::new();
        let manager = connected(&driver);

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.is_connected());
        assert_eq!(manager.name(), "localhost.test");
        assert_eq!(manager.session_id().as_deref(), Some("1"));
        assert!(manager.connect_duration().is_some());

        let script = driver.script();
        let params = script.last_params.as_ref().unwrap();
        assert_eq!(params.port, 3306);
        assert_eq!(params.charset, "utf8");
        assert!(params.autocommit);
    }

    #[test]
    fn test_dummy_tolerates_failed_initial_connect() {
        let driver = ScriptedDriver::new();
        driver.script().refuse_connects = usize::MAX;

        let manager = ConnectionManager::new(config(), driver.clone()).unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.session_id(), None);
        assert!(!manager.connect().unwrap());
    }

    #[test]
    fn test_failed_initial_connect_is_fatal_without_dummy() {
        let driver = ScriptedDriver::new();
        driver.script().refuse_connects = 1;

        let err = ConnectionManager::new(config().with_dummy(false), driver.clone()).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_insert_returns_driver_count() {
        let driver = ScriptedDriver::new();
        let manager = connected(&driver);

        assert_eq!(manager.insert("t", &value_set([("a", 1)])).unwrap(), 1);

        let script = driver.script();
        let (sql, params) = &script.statements[0];
        assert_eq!(sql, "INSERT INTO `t` (`a`) VALUES (%s)");
        assert_eq!(params, &vec![FilterValue::from(1)]);
    }

    #[test]
    fn test_select_without_matches_returns_empty_rows() {
        let driver = ScriptedDriver::new();
        let manager = connected(&driver);

        let result = manager
            .select("t", &filter([("id", 1)]), &Projection::All, 0)
            .unwrap();
        assert_eq!(result, QueryResult::empty());
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_select_returns_rows() {
        let driver = ScriptedDriver::new();
        driver.script().rows = rows(2);
        let manager = connected(&driver);

        let result = manager.select("t", &Filter::new(), &Projection::All, 0).unwrap();
        assert_eq!(result.row_count, 2);
        assert_eq!(result.rows[1].get("name"), Some(&Value::from("n2")));
        assert_eq!(driver.script().fetches, 1);
    }

    #[test]
    fn test_positional_rows_without_dict_cursor() {
        let driver = ScriptedDriver::new();
        driver.script().rows = rows(1);
        let manager = ConnectionManager::new(config().with_dict_cursor(false), driver.clone()).unwrap();

        let result = manager.query("SELECT * FROM t", &[]).unwrap();
        assert_eq!(result.rows[0].columns(), None);
        assert_eq!(result.rows[0].get_index(0), Some(&Value::Int(1)));
    }

    #[test]
    fn test_validation_failures_skip_the_driver() {
        let driver = ScriptedDriver::new();
        let manager = connected(&driver);

        assert_eq!(manager.update("t", &ValueSet::new(), &filter([("id", 1)]), 0).unwrap(), 0);
        assert_eq!(manager.insert("", &value_set([("a", 1)])).unwrap(), 0);
        assert_eq!(manager.insert("t", &ValueSet::new()).unwrap(), 0);
        assert_eq!(manager.replace("t", &ValueSet::new()).unwrap(), 0);
        assert_eq!(manager.insert_id("t", &ValueSet::new()).unwrap(), 0);
        assert_eq!(manager.delete("", &Filter::new(), 0).unwrap(), 0);
        assert_eq!(
            manager.select("", &Filter::new(), &Projection::All, 0).unwrap(),
            QueryResult::empty()
        );

        assert_eq!(driver.script().executes, 0);
    }

    #[test]
    fn test_disconnected_operation_connects_once() {
        let driver = ScriptedDriver::new();
        driver.script().refuse_connects = usize::MAX;
        let manager = ConnectionManager::new(config(), driver.clone()).unwrap();
        assert_eq!(driver.script().connects, 1);

        let err = manager.insert("t", &value_set([("a", 1)])).unwrap_err();
        assert!(matches!(err, SqlwrapError::NoConnection(_)));

        let script = driver.script();
        assert_eq!(script.connects, 2);
        assert_eq!(script.executes, 0);
    }

    #[test]
    fn test_disconnected_operation_recovers_when_connect_succeeds() {
        let driver = ScriptedDriver::new();
        driver.script().refuse_connects = 1;
        let manager = ConnectionManager::new(config(), driver.clone()).unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        assert_eq!(manager.delete("t", &filter([("id", 1)]), 1).unwrap(), 1);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.recovery_count(), 0);
    }

    #[test]
    fn test_transient_failure_reconnects_and_retries_once() {
        let driver = ScriptedDriver::new();
        let manager = connected(&driver);
        {
            let mut script = driver.script();
            script.execute_results.push_back(Err(DriverError::transient("gone away")));
            script.execute_results.push_back(Ok(3));
        }

        let affected = manager
            .update("t", &value_set([("a", 1)]), &Filter::new(), 0)
            .unwrap();
        assert_eq!(affected, 3);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.recovery_count(), 1);
        assert_eq!(manager.session_id().as_deref(), Some("2"));

        let script = driver.script();
        assert_eq!(script.connects, 2);
        assert_eq!(script.executes, 2);
        // the broken session is released before the new one is used
        assert_eq!(script.closes, 1);
    }

    #[test]
    fn test_failed_retry_propagates() {
        let driver = ScriptedDriver::new();
        let manager = connected(&driver);
        {
            let mut script = driver.script();
            script.execute_results.push_back(Err(DriverError::transient("gone away")));
            script.execute_results.push_back(Err(DriverError::transient("still gone")));
        }

        let err = manager.query("SELECT 1", &[]).unwrap_err();
        assert!(err.to_string().contains("still gone"));

        let script = driver.script();
        assert_eq!(script.connects, 2);
        assert_eq!(script.executes, 2);
    }

    #[test]
    fn test_failed_reconnect_during_recovery() {
        let driver = ScriptedDriver::new();
        let manager = connected(&driver);
        {
            let mut script = driver.script();
            script.execute_results.push_back(Err(DriverError::transient("gone away")));
            script.refuse_connects = 1;
        }

        let err = manager.execute("DELETE FROM t", &[]).unwrap_err();
        assert!(matches!(err, SqlwrapError::NoConnection(_)));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(driver.script().executes, 1);
    }

    #[test]
    fn test_non_transient_errors_are_not_retried() {
        let driver = ScriptedDriver::new();
        let manager = connected(&driver);
        driver
            .script()
            .execute_results
            .push_back(Err(DriverError::other("Duplicate entry '1'").with_code(1062)));

        let err = manager.insert("t", &value_set([("id", 1)])).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Duplicate entry"));

        let script = driver.script();
        assert_eq!(script.connects, 1);
        assert_eq!(script.executes, 1);
        assert_eq!(manager.recovery_count(), 0);
    }

    #[test]
    fn test_close_twice_reports_without_failing() {
        let driver = ScriptedDriver::new();
        let manager = connected(&driver);

        assert!(manager.close());
        assert!(!manager.close());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(driver.script().closes, 1);
    }

    #[test]
    fn test_operation_after_close_reconnects() {
        let driver = ScriptedDriver::new();
        let manager = connected(&driver);
        manager.close();

        assert_eq!(manager.execute("DELETE FROM t", &[]).unwrap(), 1);
        assert_eq!(driver.script().connects, 2);
        assert!(manager.is_connected());
    }

    #[test]
    fn test_commit_reports_driver_rejection() {
        let driver = ScriptedDriver::new();
        let manager = connected(&driver);

        assert!(manager.commit());
        driver.script().commit_error = Some(DriverError::other("no transaction is active"));
        assert!(!manager.commit());

        manager.close();
        assert!(!manager.commit());
    }

    #[test]
    fn test_insert_id() {
        let driver = ScriptedDriver::new();
        driver.script().insert_id = 42;
        let manager = connected(&driver);

        assert_eq!(manager.insert_id("t", &value_set([("a", "x")])).unwrap(), 42);
    }

    #[test]
    fn test_separate_connect_opens_a_session_per_operation() {
        let driver = ScriptedDriver::new();
        let manager =
            ConnectionManager::new(config().with_separate_connect(true), driver.clone()).unwrap();
        // the construction probe opens and closes one session
        assert_eq!(driver.script().connects, 1);
        assert_eq!(driver.script().closes, 1);

        manager.insert("t", &value_set([("a", 1)])).unwrap();
        manager.query("SELECT 1", &[]).unwrap();

        let script = driver.script();
        assert_eq!(script.connects, 3);
        assert_eq!(script.closes, 3);
        drop(script);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.commit());
    }

    #[test]
    fn test_separate_connect_does_not_retry() {
        let driver = ScriptedDriver::new();
        let manager =
            ConnectionManager::new(config().with_separate_connect(true), driver.clone()).unwrap();
        driver
            .script()
            .execute_results
            .push_back(Err(DriverError::transient("gone away")));

        assert!(manager.execute("DELETE FROM t", &[]).is_err());
        let script = driver.script();
        assert_eq!(script.executes, 1);
        assert_eq!(script.closes, 2);
    }

    #[test]
    fn test_query_one() {
        let driver = ScriptedDriver::new();
        driver.script().rows = rows(3);
        let manager = connected(&driver);

        let row = manager.query_one("SELECT * FROM t", &[]).unwrap().unwrap();
        assert_eq!(row.get("id"), Some(&Value::Int(1)));

        driver.script().rows.clear();
        assert_eq!(manager.query_one("SELECT * FROM t", &[]).unwrap(), None);
    }

    #[test]
    fn test_manager_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConnectionManager>();
    }
}
