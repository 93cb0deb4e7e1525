// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes; clone
//! the handle instead, which shares the same serialized connection.

use arcana_config::model::StorageConfig;
use arcana_core::ArcanaError;
use tracing::{debug, info};

/// Convert a tokio-rusqlite error into ArcanaError::Storage.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ArcanaError {
    ArcanaError::Storage {
        source: Box::new(e),
    }
}

/// Current UTC time in the millisecond-precision RFC 3339 form used for
/// every timestamp column. Fixed width, so lexicographic order is
/// chronological order.
pub(crate) fn now_ts() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Handle to the single serialized SQLite connection.
///
/// Cloning is cheap and shares the same background writer thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at the configured path, apply PRAGMAs,
    /// and run any pending migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, ArcanaError> {
        let path = std::path::Path::new(&config.database_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ArcanaError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(&config.database_path)
            .await
            .map_err(|e| map_tr_err(e.into()))?;

        let wal_mode = config.wal_mode;
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
            }
            conn.pragma_update(None, "busy_timeout", 5000)?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        // Migrations report their own error type; keep the closure's error
        // channel reserved for rusqlite and unwrap the inner result here.
        conn.call(
            |conn| -> Result<Result<(), ArcanaError>, rusqlite::Error> {
                Ok(crate::migrations::run_migrations(conn))
            },
        )
        .await
        .map_err(map_tr_err)??;

        info!(path = %config.database_path, wal = wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The shared serialized connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Cheap liveness probe for the health endpoint.
    pub async fn ping(&self) -> Result<(), ArcanaError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint the WAL before shutdown so the main database file is
    /// complete on its own.
    pub async fn close(&self) -> Result<(), ArcanaError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn open_creates_file_and_parent_dirs() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested/dir/arcana.db");
        let db = Database::open(&make_config(db_path.to_str().unwrap()))
            .await
            .unwrap();
        assert!(db_path.exists(), "database file should be created");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn migrations_create_expected_tables() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("schema.db");
        let db = Database::open(&make_config(db_path.to_str().unwrap()))
            .await
            .unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();

        for expected in ["readings", "credit_ledger", "balances"] {
            assert!(
                tables.iter().any(|t| t == expected),
                "missing table {expected}, got {tables:?}"
            );
        }

        db.ping().await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_is_idempotent_across_restarts() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("reopen.db");
        let config = make_config(db_path.to_str().unwrap());

        let db = Database::open(&config).await.unwrap();
        db.close().await.unwrap();
        drop(db);

        // Second open re-runs the migration runner; already-applied
        // migrations are skipped via refinery's history table.
        let db = Database::open(&config).await.unwrap();
        db.ping().await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn timestamps_sort_lexicographically() {
        let a = now_ts();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let b = now_ts();
        assert!(a < b, "expected {a} < {b}");
        assert!(a.ends_with('Z'));
    }
}
