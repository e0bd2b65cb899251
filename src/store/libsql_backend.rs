//! libSQL backend: async `ProfileStore` implementation.
//!
//! Supports local file and in-memory databases. Column names follow the
//! legacy `users` table (`nickname`, `stage`, `tribe`, ...) so existing
//! databases keep working.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::channels::UserId;
use crate::error::DatabaseError;
use crate::locale::Language;
use crate::store::migrations;
use crate::store::model::Registration;
use crate::store::traits::ProfileStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    // Try RFC 3339 first (our canonical write format)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    // Try SQLite CURRENT_TIMESTAMP output with fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    // Try SQLite CURRENT_TIMESTAMP output without fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a Registration.
///
/// Column order matches USER_COLUMNS. Legacy rows may hold NULL in any
/// column except `user_id`.
fn row_to_registration(row: &libsql::Row) -> Result<Registration, libsql::Error> {
    let language: Option<String> = row.get::<String>(2).ok();
    let registered: Option<String> = row.get::<String>(8).ok();
    let bonus: i64 = row.get::<i64>(9).unwrap_or(0);

    Ok(Registration {
        user_id: row.get(0)?,
        platform_username: row.get::<String>(1).ok(),
        language: language
            .as_deref()
            .and_then(Language::from_code)
            .unwrap_or_default(),
        handle: row.get::<String>(3).unwrap_or_default(),
        cohort_stage: row.get::<String>(4).ok(),
        cohort_group: row.get::<String>(5).ok(),
        display_name: row.get::<String>(6).ok(),
        chosen_logo: row.get::<String>(7).ok(),
        registered_at: registered
            .as_deref()
            .map(parse_datetime)
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
        bonus_claimed: bonus != 0,
    })
}

fn is_unique_violation(e: &libsql::Error) -> bool {
    let msg = e.to_string();
    msg.contains("UNIQUE constraint failed") || msg.contains("PRIMARY KEY")
}

// ── Trait implementation ────────────────────────────────────────────

const USER_COLUMNS: &str = "user_id, telegram_username, language, nickname, stage, tribe, real_name, chosen_logo, registration_timestamp, bonus_claimed";

#[async_trait]
impl ProfileStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn exists(&self, user_id: UserId) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT 1 FROM users WHERE user_id = ?1", params![user_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("exists: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("exists: {e}")))?;
        Ok(row.is_some())
    }

    async fn insert(&self, r: &Registration) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    r.user_id,
                    opt_text(r.platform_username.as_deref()),
                    r.language.code(),
                    r.handle.as_str(),
                    opt_text(r.cohort_stage.as_deref()),
                    opt_text(r.cohort_group.as_deref()),
                    opt_text(r.display_name.as_deref()),
                    opt_text(r.chosen_logo.as_deref()),
                    r.registered_at.to_rfc3339(),
                    r.bonus_claimed as i64,
                ],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DatabaseError::Constraint(format!("user {} is already registered", r.user_id))
                } else {
                    DatabaseError::Query(format!("insert: {e}"))
                }
            })?;

        info!(user_id = r.user_id, handle = %r.handle, "Registration stored");
        Ok(())
    }

    async fn get(&self, user_id: UserId) -> Result<Option<Registration>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get: {e}")))?
        {
            Some(row) => {
                let registration = row_to_registration(&row)
                    .map_err(|e| DatabaseError::Query(format!("get row: {e}")))?;
                Ok(Some(registration))
            }
            None => Ok(None),
        }
    }

    async fn update_chosen_logo(
        &self,
        user_id: UserId,
        logo: &str,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE users SET chosen_logo = ?1 WHERE user_id = ?2",
                params![logo, user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_chosen_logo: {e}")))?;

        debug!(user_id, logo, changed, "Logo choice updated");
        Ok(changed > 0)
    }

    async fn mark_bonus_claimed(&self, user_id: UserId) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE users SET bonus_claimed = 1 WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_bonus_claimed: {e}")))?;

        debug!(user_id, changed, "Bonus claim recorded");
        Ok(changed > 0)
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute("DELETE FROM users WHERE user_id = ?1", params![user_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete: {e}")))?;

        info!(user_id, deleted = changed > 0, "Registration deleted");
        Ok(changed > 0)
    }

    async fn count(&self) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM users", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("count: {e}")))?
        {
            Some(row) => {
                let n: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("count row: {e}")))?;
                Ok(n.max(0) as u64)
            }
            None => Ok(0),
        }
    }
}
