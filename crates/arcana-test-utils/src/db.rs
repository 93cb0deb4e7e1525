// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scratch database helper for integration tests.

use arcana_config::model::StorageConfig;
use arcana_storage::Database;

/// Opens a fully migrated database in a temporary directory.
///
/// The returned `TempDir` must be kept alive for the lifetime of the
/// database; dropping it deletes the files under the connection.
pub async fn scratch_database() -> (Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create scratch dir");
    let db_path = dir.path().join("arcana_test.db");
    let db = Database::open(&StorageConfig {
        database_path: db_path.to_str().expect("utf-8 path").to_string(),
        wal_mode: true,
    })
    .await
    .expect("open scratch database");
    (db, dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scratch_database_is_migrated_and_usable() {
        let (db, _dir) = scratch_database().await;
        db.ping().await.expect("ping");
        db.close().await.expect("close");
    }
}
