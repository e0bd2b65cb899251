//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.
//! On first run against a legacy DB (`users` exists, no `_migrations` table),
//! it adds whatever columns are missing and seeds the versions without
//! re-creating the table.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                telegram_username TEXT,
                language TEXT,
                nickname TEXT,
                stage TEXT,
                tribe TEXT,
                chosen_logo TEXT,
                registration_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 2,
        name: "real_name",
        sql: "ALTER TABLE users ADD COLUMN real_name TEXT;",
    },
    Migration {
        version: 3,
        name: "bonus_claimed",
        sql: "ALTER TABLE users ADD COLUMN bonus_claimed INTEGER NOT NULL DEFAULT 0;",
    },
];

/// Columns added after V1, with the DDL that adds them. Used to bring a
/// legacy table up to date.
static LEGACY_COLUMNS: &[(&str, &str)] = &[
    ("real_name", "ALTER TABLE users ADD COLUMN real_name TEXT"),
    (
        "bonus_claimed",
        "ALTER TABLE users ADD COLUMN bonus_claimed INTEGER NOT NULL DEFAULT 0",
    ),
];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
/// Detects legacy databases and seeds every version without re-running
/// schema DDL.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    // Create migrations tracking table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let mut current_version = get_current_version(conn).await?;

    // Legacy DB: users table exists but _migrations is empty
    if current_version == 0 && legacy_table_exists(conn).await? {
        for (column, ddl) in LEGACY_COLUMNS {
            if !column_exists(conn, "users", column).await? {
                conn.execute(ddl, ()).await.map_err(|e| {
                    DatabaseError::Migration(format!(
                        "Failed to add column {column} to legacy users table: {e}"
                    ))
                })?;
                tracing::info!(column, "Added missing column to legacy users table");
            }
        }
        for migration in MIGRATIONS {
            seed_version(conn, migration.version, migration.name).await?;
        }
        current_version = get_current_version(conn).await?;
        tracing::info!("Legacy database detected, seeded migrations up to V{current_version}");
    }

    // Apply pending migrations
    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    tracing::info!(
        "Database migrations complete (at V{})",
        get_current_version(conn).await?
    );

    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => {
            let version: i64 = row.get(0).map_err(|e| {
                DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
            })?;
            Ok(version)
        }
        None => Ok(0),
    }
}

/// Check if the legacy `users` table already exists.
async fn legacy_table_exists(conn: &Connection) -> Result<bool, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='users'",
            (),
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to check legacy tables: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to read legacy check: {e}")))?;

    match row {
        Some(row) => {
            let count: i64 = row.get(0).unwrap_or(0);
            Ok(count > 0)
        }
        None => Ok(false),
    }
}

/// Whether `table` has a column named `column`.
async fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let mut rows = conn
        .query(&format!("PRAGMA table_info({table})"), ())
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to read table info: {e}")))?;

    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to read table info row: {e}")))?
    {
        let name: String = row.get(1).unwrap_or_default();
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
