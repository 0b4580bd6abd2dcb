//! Connection settings for both backends.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default Cloudflare REST API base.
pub const DEFAULT_D1_ENDPOINT: &str = "https://api.cloudflare.com/client/v4";

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub backend: BackendConfig,
    pub pool: PoolConfig,
}

impl DbConfig {
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendConfig::Sqlite { path: path.into() },
            pool: PoolConfig::default(),
        }
    }
}

#[derive(Clone)]
pub enum BackendConfig {
    /// Embedded database file, created if missing.
    Sqlite { path: PathBuf },
    /// Remote D1 database reached over its HTTP query endpoint.
    D1 {
        account_id: String,
        api_token: String,
        database_id: String,
        endpoint: String,
    },
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite { path } => f.debug_struct("Sqlite").field("path", path).finish(),
            Self::D1 {
                account_id,
                database_id,
                endpoint,
                ..
            } => f
                .debug_struct("D1")
                .field("account_id", account_id)
                .field("api_token", &"<redacted>")
                .field("database_id", database_id)
                .field("endpoint", endpoint)
                .finish(),
        }
    }
}

/// Pool limits. The only resource-sharing policy in the crate.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Ceiling on concurrently open connections (or in-flight requests).
    pub max_open: u32,
    /// Connections kept warm while idle.
    pub max_idle: u32,
    /// Connections older than this are recycled. `None` keeps them forever.
    pub max_lifetime: Option<Duration>,
    /// Idle connections are closed after this long. `None` keeps them open.
    pub idle_timeout: Option<Duration>,
    /// Upper bound on a single statement, including waiting for a connection.
    pub statement_timeout: Duration,
    /// Upper bound on establishing the pool and the initial ping.
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: 25,
            max_idle: 5,
            max_lifetime: Some(Duration::from_secs(5 * 60)),
            idle_timeout: Some(Duration::from_secs(2 * 60)),
            statement_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}
