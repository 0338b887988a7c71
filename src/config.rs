use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core::db::driver::ConnectParams;
use crate::core::{Result, SqlwrapError};

/// Connection options with their documented defaults.
///
/// Every field may be omitted from a TOML table; missing fields take the
/// values of [`ConnectionConfig::default`].
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub db: String,
    pub user: String,
    pub passwd: String,
    pub charset: String,
    /// Seconds in TOML.
    #[serde(deserialize_with = "duration_from_secs")]
    pub connect_timeout: Duration,
    /// How long a statement waits on a locked database, in seconds in TOML.
    /// Zero fails immediately.
    #[serde(deserialize_with = "duration_from_secs")]
    pub statement_timeout: Duration,
    pub autocommit: bool,
    /// Tolerate a failed connect: record it and stay disconnected.
    pub dummy: bool,
    /// Return rows as name to value mappings instead of positional tuples.
    pub dict_cursor: bool,
    /// Open and close a dedicated session for every operation.
    pub separate_connect: bool,
    /// Logical connection name; `host.db` when unset.
    pub name: Option<String>,
    /// Verbose tracing of statement parameters.
    pub debug: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            host: "localhost".to_string(),
            port: 3306,
            db: String::new(),
            user: "root".to_string(),
            passwd: String::new(),
            charset: "utf8".to_string(),
            connect_timeout: Duration::from_secs(5),
            statement_timeout: Duration::ZERO,
            autocommit: true,
            dummy: true,
            dict_cursor: true,
            separate_connect: false,
            name: None,
            debug: false,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("user", &self.user)
            .field("passwd", &"<redacted>")
            .field("charset", &self.charset)
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .field("autocommit", &self.autocommit)
            .field("dummy", &self.dummy)
            .field("dict_cursor", &self.dict_cursor)
            .field("separate_connect", &self.separate_connect)
            .field("name", &self.name)
            .field("debug", &self.debug)
            .finish()
    }
}

impl ConnectionConfig {
    /// Creates a configuration for the given credentials and database,
    /// everything else defaulted.
    pub fn new(user: impl Into<String>, passwd: impl Into<String>, db: impl Into<String>) -> Self {
        ConnectionConfig {
            user: user.into(),
            passwd: passwd.into(),
            db: db.into(),
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    pub fn with_dummy(mut self, dummy: bool) -> Self {
        self.dummy = dummy;
        self
    }

    pub fn with_dict_cursor(mut self, dict_cursor: bool) -> Self {
        self.dict_cursor = dict_cursor;
        self
    }

    pub fn with_separate_connect(mut self, separate: bool) -> Self {
        self.separate_connect = separate;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The configured name, or `host.db`.
    pub fn derived_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}.{}", self.host, self.db))
    }

    /// Driver-facing subset of the configuration.
    pub fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            host: self.host.clone(),
            port: self.port,
            db: self.db.clone(),
            user: self.user.clone(),
            passwd: self.passwd.clone(),
            charset: self.charset.clone(),
            autocommit: self.autocommit,
            connect_timeout: self.connect_timeout,
            statement_timeout: self.statement_timeout,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(SqlwrapError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(SqlwrapError::Config("port must be non-zero".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(SqlwrapError::Config("connect_timeout must be positive".to_string()));
        }
        Ok(())
    }
}

fn duration_from_secs<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

/// Top-level configuration file layout.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    connection: ConnectionConfig,
}

/// Parses a `[connection]` table from TOML text.
pub fn parse_config(content: &str) -> Result<ConnectionConfig> {
    let file: ConfigFile = toml::from_str(content)?;
    file.connection.validate()?;
    Ok(file.connection)
}

/// Loads the `[connection]` table of a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = sqlwrap::config::load_config("sqlwrap.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ConnectionConfig> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}
