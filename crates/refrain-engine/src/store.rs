// SPDX-License-Identifier: GPL-3.0-or-later

//! SQLite-backed fingerprint store.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::{EngineError, Fingerprint, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool_max_size: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://refrain.db".to_string(),
            pool_max_size: 4,
        }
    }
}

/// A fingerprinted song as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSong {
    pub id: i64,
    pub name: String,
    pub file_sha: String,
    pub fingerprint: Fingerprint,
}

#[derive(Clone)]
pub struct SongStore {
    pool: SqlitePool,
}

/// Turn `sqlite://relative/path.db` into an absolute, create-on-open URL.
fn normalize_url(url: &str) -> Result<String> {
    if !url.starts_with("sqlite://") || url.starts_with("sqlite://:memory:") {
        return Ok(url.to_string());
    }

    let db_path = url.trim_start_matches("sqlite://");
    let path = Path::new(db_path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| EngineError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
            debug!(target: "store", path = %parent.display(), "ensured database directory");
        }
    }

    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| EngineError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .join(path)
    };

    // SQLite accepts forward slashes on every platform
    let path_str = absolute_path.to_string_lossy().replace('\\', "/");
    Ok(format!("sqlite://{}?mode=rwc", path_str))
}

impl SongStore {
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let db_url = normalize_url(&settings.url)?;
        info!(target: "store", db_url = %db_url, "connecting to database");

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.pool_max_size.max(1))
            .connect(&db_url)
            .await?;

        sqlx::migrate!("../../migrations").run(&pool).await?;
        debug!(target: "store", "migrations applied");

        Ok(Self { pool })
    }

    pub async fn contains(&self, file_sha: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM songs WHERE file_sha = ? LIMIT 1")
            .bind(file_sha)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert a song. Returns `false` when a song with the same digest already exists.
    pub async fn insert(&self, name: &str, file_sha: &str, fingerprint: &Fingerprint) -> Result<bool> {
        debug!(target: "store", %name, %file_sha, "storing fingerprint");
        let raw = serde_json::to_string(&fingerprint.raw)?;

        let result = sqlx::query(
            r#"
            INSERT INTO songs (name, file_sha, duration_secs, hash, fingerprint, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(file_sha) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(file_sha)
        .bind(fingerprint.duration as i64)
        .bind(&fingerprint.hash)
        .bind(raw)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn all(&self) -> Result<Vec<StoredSong>> {
        let rows = sqlx::query(
            "SELECT id, name, file_sha, duration_secs, hash, fingerprint FROM songs ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<StoredSong> {
                let raw: Vec<u32> = serde_json::from_str(&row.try_get::<String, _>("fingerprint")?)?;
                let duration: i64 = row.try_get("duration_secs")?;
                Ok(StoredSong {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    file_sha: row.try_get("file_sha")?,
                    fingerprint: Fingerprint::new(
                        row.try_get::<String, _>("hash")?,
                        raw,
                        duration as u32,
                    ),
                })
            })
            .collect()
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM songs")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}
