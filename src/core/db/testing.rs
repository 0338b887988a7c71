//! A scripted in-memory driver for exercising the connection manager
//! without a database server.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::db::driver::{ConnectParams, Driver, DriverError, Session};
use crate::core::value::{FilterValue, Row};

#[derive(Debug, Default)]
pub(crate) struct Script {
    /// Number of upcoming connects to refuse; `usize::MAX` refuses forever.
    pub refuse_connects: usize,
    /// Results handed out by successive `execute` calls. When empty, SELECTs
    /// report `rows.len()` and everything else reports 1.
    pub execute_results: VecDeque<Result<u64, DriverError>>,
    pub rows: Vec<Row>,
    pub commit_error: Option<DriverError>,
    pub insert_id: u64,

    pub connects: usize,
    pub executes: usize,
    pub fetches: usize,
    pub closes: usize,
    pub statements: Vec<(String, Vec<FilterValue>)>,
    pub last_params: Option<ConnectParams>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedDriver {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }
}

impl Driver for ScriptedDriver {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>, DriverError> {
        let mut script = self.script();
        script.connects += 1;
        script.last_params = Some(params.clone());
        if script.refuse_connects > 0 {
            if script.refuse_connects != usize::MAX {
                script.refuse_connects -= 1;
            }
            return Err(DriverError::transient("Can't connect to server").with_code(2003));
        }
        Ok(Box::new(ScriptedSession {
            id: script.connects,
            script: Arc::clone(&self.script),
            closed: false,
            pending: Vec::new(),
        }))
    }
}

struct ScriptedSession {
    id: usize,
    script: Arc<Mutex<Script>>,
    closed: bool,
    pending: Vec<Row>,
}

impl Session for ScriptedSession {
    fn session_id(&self) -> String {
        self.id.to_string()
    }

    fn execute(&mut self, sql: &str, params: &[FilterValue]) -> Result<u64, DriverError> {
        let mut script = self.script.lock().unwrap();
        script.executes += 1;
        script.statements.push((sql.to_string(), params.to_vec()));
        let is_select = sql.starts_with("SELECT");
        let result = match script.execute_results.pop_front() {
            Some(result) => result,
            None if is_select => Ok(script.rows.len() as u64),
            None => Ok(1),
        };
        self.pending = if is_select && result.is_ok() {
            script.rows.clone()
        } else {
            Vec::new()
        };
        result
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>, DriverError> {
        self.script.lock().unwrap().fetches += 1;
        Ok(std::mem::take(&mut self.pending))
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        match self.script.lock().unwrap().commit_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::other("session already closed"));
        }
        self.closed = true;
        self.script.lock().unwrap().closes += 1;
        Ok(())
    }

    fn last_insert_id(&self) -> u64 {
        self.script.lock().unwrap().insert_id
    }
}
