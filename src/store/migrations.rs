//! Schema versions for the libSQL key/value store.
//!
//! `intro_schema` records every applied step. Pending steps run in order,
//! each inside its own transaction together with its version row.

use libsql::Connection;

use crate::error::StorageError;

/// (version, label, statements). Append only.
const SCHEMA: &[(i64, &str, &str)] = &[(
    1,
    "intro_kv",
    "CREATE TABLE IF NOT EXISTS intro_kv (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );",
)];

/// Bring the schema up to date.
pub async fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS intro_schema (
            version INTEGER PRIMARY KEY,
            label TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| StorageError::Migration(format!("intro_schema: {e}")))?;

    let applied = schema_version(conn).await?;
    let pending = SCHEMA.iter().filter(|(version, _, _)| *version > applied);

    for &(version, label, sql) in pending {
        tracing::info!(version, label, "Upgrading intro store schema");
        apply(conn, version, label, sql)
            .await
            .map_err(|e| StorageError::Migration(format!("V{version} {label}: {e}")))?;
    }

    Ok(())
}

async fn apply(conn: &Connection, version: i64, label: &str, sql: &str) -> libsql::Result<()> {
    let tx = conn.transaction().await?;
    tx.execute_batch(sql).await?;
    tx.execute(
        "INSERT INTO intro_schema (version, label) VALUES (?1, ?2)",
        libsql::params![version, label],
    )
    .await?;
    tx.commit().await
}

/// Highest applied version, 0 on a fresh database.
pub async fn schema_version(conn: &Connection) -> Result<i64, StorageError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM intro_schema", ())
        .await
        .map_err(|e| StorageError::Migration(e.to_string()))?;

    match rows
        .next()
        .await
        .map_err(|e| StorageError::Migration(e.to_string()))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| StorageError::Migration(e.to_string())),
        None => Ok(0),
    }
}
