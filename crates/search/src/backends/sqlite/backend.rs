//! SQLite backend setup: configuration, pooling and schema.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BackendError, SearchError, SearchResult};

use super::schema;

/// SQLite backend storing entities as JSON documents.
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    is_memory: bool,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Pool and connection settings for [`SqliteBackend`].
///
/// Missing keys take their [`Default`] values when deserialized.
/// `max_connections` and `min_connections` apply to file databases only;
/// an in-memory database always uses one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteBackendConfig {
    /// Pool size.
    pub max_connections: u32,
    /// Idle connections kept open.
    pub min_connections: u32,
    /// How long to wait for a pooled connection, in milliseconds.
    pub connection_timeout_ms: u64,
    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u32,
    /// Switch file databases to write-ahead logging.
    pub enable_wal: bool,
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connection_timeout_ms: 30_000,
            busy_timeout_ms: 5_000,
            enable_wal: true,
        }
    }
}

pub(crate) fn connection_failed(message: impl Into<String>) -> SearchError {
    SearchError::Backend(BackendError::ConnectionFailed {
        backend_name: "sqlite".to_string(),
        message: message.into(),
    })
}

impl SqliteBackend {
    /// Creates an in-memory backend with its schema initialized.
    ///
    /// Every SQLite in-memory connection is a separate database, so the pool
    /// is pinned to a single connection that is never recycled.
    pub fn in_memory() -> SearchResult<Self> {
        let config = SqliteBackendConfig::default();
        let manager = Self::manager(SqliteConnectionManager::memory(), &config);

        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)
            .map_err(|e| connection_failed(e.to_string()))?;

        Self::from_pool(pool, config, true)
    }

    /// Opens or creates a file database with its schema initialized.
    pub fn open<P: AsRef<Path>>(path: P) -> SearchResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Opens a file database with a custom configuration.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteBackendConfig,
    ) -> SearchResult<Self> {
        let manager = Self::manager(SqliteConnectionManager::file(path.as_ref()), &config);

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(config.min_connections))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)
            .map_err(|e| connection_failed(e.to_string()))?;

        Self::from_pool(pool, config, false)
    }

    fn manager(
        manager: SqliteConnectionManager,
        config: &SqliteBackendConfig,
    ) -> SqliteConnectionManager {
        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        manager.with_init(move |conn| conn.busy_timeout(busy_timeout))
    }

    fn from_pool(
        pool: Pool<SqliteConnectionManager>,
        config: SqliteBackendConfig,
        is_memory: bool,
    ) -> SearchResult<Self> {
        let backend = Self {
            pool,
            config,
            is_memory,
        };
        backend.configure_connection()?;
        backend.init_schema()?;
        Ok(backend)
    }

    /// Creates the schema if needed. Called on construction.
    pub fn init_schema(&self) -> SearchResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)
    }

    /// Get a connection from the pool.
    pub(crate) fn get_connection(
        &self,
    ) -> SearchResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| connection_failed(e.to_string()))
    }

    fn configure_connection(&self) -> SearchResult<()> {
        if !self.config.enable_wal || self.is_memory {
            return Ok(());
        }

        let conn = self.get_connection()?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(|e| {
                SearchError::Backend(BackendError::Internal {
                    backend_name: "sqlite".to_string(),
                    message: format!("Failed to enable WAL mode: {}", e),
                    source: None,
                })
            })?;
        debug!(journal_mode = %mode, "Configured SQLite journal mode");
        Ok(())
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }
}
