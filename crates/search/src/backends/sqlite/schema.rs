//! SQLite schema definitions and migrations.

use rusqlite::Connection;
use tracing::info;

use crate::error::{BackendError, SearchError, SearchResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

fn schema_error(context: &str, err: rusqlite::Error) -> SearchError {
    SearchError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message: format!("{}: {}", context, err),
        source: Some(Box::new(err)),
    })
}

/// Creates or upgrades the schema.
pub fn initialize_schema(conn: &Connection) -> SearchResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        info!(version = SCHEMA_VERSION, "Initialized SQLite schema");
    } else if current_version > SCHEMA_VERSION {
        return Err(SearchError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: format!(
                "database schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            ),
            source: None,
        }));
    }

    Ok(())
}

/// Reads the schema version; 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> SearchResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| schema_error("Failed to create schema_version table", e))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> SearchResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| schema_error("Failed to clear schema_version", e))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| schema_error("Failed to set schema_version", e))?;
    Ok(())
}

fn create_schema_v1(conn: &Connection) -> SearchResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entities (
            entity_type TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (entity_type, id)
        )",
        [],
    )
    .map_err(|e| schema_error("Failed to create entities table", e))?;

    Ok(())
}
