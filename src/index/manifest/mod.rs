
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Pool, Sqlite};
use tracing::debug;
use uuid::Uuid;

/// Metadata row describing one complete persisted collection.
///
/// Written only after every entry is stored, so the presence of a row implies
/// the vector table beside it is complete. A vector table without a matching
/// row is treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CollectionManifest {
    pub name: String,
    pub embed_model_id: String,
    pub dimension: i64,
    pub entry_count: i64,
    pub build_id: String,
    pub built_at: DateTime<Utc>,
}

impl CollectionManifest {
    #[inline]
    pub fn new(name: &str, embed_model_id: &str, dimension: usize, entry_count: usize) -> Self {
        Self {
            name: name.to_string(),
            embed_model_id: embed_model_id.to_string(),
            dimension: dimension as i64,
            entry_count: entry_count as i64,
            build_id: Uuid::new_v4().to_string(),
            built_at: Utc::now(),
        }
    }
}

/// SQLite-backed store of collection manifests
#[derive(Debug, Clone)]
pub struct ManifestDb {
    pool: Pool<Sqlite>,
}

impl ManifestDb {
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create manifest directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to open manifest database")?;

        // One table, bootstrapped in place; no migration machinery needed.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                embed_model_id TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                entry_count INTEGER NOT NULL,
                build_id TEXT NOT NULL,
                built_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .context("Failed to create collections table")?;

        debug!("Manifest database ready at {}", path.display());
        Ok(Self { pool })
    }

    #[inline]
    pub async fn get(&self, name: &str) -> Result<Option<CollectionManifest>> {
        sqlx::query_as::<_, CollectionManifest>(
            "SELECT name, embed_model_id, dimension, entry_count, build_id, built_at
             FROM collections WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read collection manifest")
    }

    #[inline]
    pub async fn upsert(&self, manifest: &CollectionManifest) -> Result<()> {
        sqlx::query(
            "INSERT INTO collections
                (name, embed_model_id, dimension, entry_count, build_id, built_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET
                embed_model_id = excluded.embed_model_id,
                dimension = excluded.dimension,
                entry_count = excluded.entry_count,
                build_id = excluded.build_id,
                built_at = excluded.built_at",
        )
        .bind(&manifest.name)
        .bind(&manifest.embed_model_id)
        .bind(manifest.dimension)
        .bind(manifest.entry_count)
        .bind(&manifest.build_id)
        .bind(manifest.built_at)
        .execute(&self.pool)
        .await
        .context("Failed to write collection manifest")?;

        debug!("Recorded manifest for collection '{}'", manifest.name);
        Ok(())
    }

    #[inline]
    pub async fn delete(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to delete collection manifest")?;
        Ok(())
    }
}
