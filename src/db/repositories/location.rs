//! Location repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Location;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn create(&self, location: &Location) -> Result<Location>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>>;

    /// List published locations ordered by name
    async fn list_published(&self) -> Result<Vec<Location>>;

    /// Set the publication flag; false when no such location exists
    async fn set_published(&self, id: i64, is_published: bool) -> Result<bool>;
}

pub struct SqlxLocationRepository {
    pool: DynDatabasePool,
}

impl SqlxLocationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LocationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LocationRepository for SqlxLocationRepository {
    async fn create(&self, location: &Location) -> Result<Location> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.sqlite()?, location).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.mysql()?, location).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Location>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_published(&self) -> Result<Vec<Location>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_published_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_published_mysql(self.pool.mysql()?).await,
        }
    }

    async fn set_published(&self, id: i64, is_published: bool) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_published_sqlite(self.pool.sqlite()?, id, is_published).await
            }
            DatabaseDriver::Mysql => {
                set_published_mysql(self.pool.mysql()?, id, is_published).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, location: &Location) -> Result<Location> {
    let result = sqlx::query(
        "INSERT INTO locations (name, is_published, created_at) VALUES (?, ?, ?)",
    )
    .bind(&location.name)
    .bind(location.is_published)
    .bind(location.created_at)
    .execute(pool)
    .await
    .context("Failed to create location")?;

    get_by_id_sqlite(pool, result.last_insert_rowid())
        .await?
        .context("Location not found after creation")
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Location>> {
    let row = sqlx::query(
        "SELECT id, name, is_published, created_at FROM locations WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get location by ID")?;
    Ok(row.as_ref().map(row_to_location_sqlite))
}

async fn list_published_sqlite(pool: &SqlitePool) -> Result<Vec<Location>> {
    let rows = sqlx::query(
        "SELECT id, name, is_published, created_at FROM locations WHERE is_published = 1 ORDER BY name, id",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list locations")?;
    Ok(rows.iter().map(row_to_location_sqlite).collect())
}

async fn set_published_sqlite(pool: &SqlitePool, id: i64, is_published: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE locations SET is_published = ? WHERE id = ?")
        .bind(is_published)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update location")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_location_sqlite(row: &sqlx::sqlite::SqliteRow) -> Location {
    Location {
        id: row.get("id"),
        name: row.get("name"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, location: &Location) -> Result<Location> {
    let result = sqlx::query(
        "INSERT INTO locations (name, is_published, created_at) VALUES (?, ?, ?)",
    )
    .bind(&location.name)
    .bind(location.is_published)
    .bind(location.created_at)
    .execute(pool)
    .await
    .context("Failed to create location")?;

    get_by_id_mysql(pool, result.last_insert_id() as i64)
        .await?
        .context("Location not found after creation")
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Location>> {
    let row = sqlx::query(
        "SELECT id, name, is_published, created_at FROM locations WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get location by ID")?;
    Ok(row.as_ref().map(row_to_location_mysql))
}

async fn list_published_mysql(pool: &MySqlPool) -> Result<Vec<Location>> {
    let rows = sqlx::query(
        "SELECT id, name, is_published, created_at FROM locations WHERE is_published = 1 ORDER BY name, id",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list locations")?;
    Ok(rows.iter().map(row_to_location_mysql).collect())
}

async fn set_published_mysql(pool: &MySqlPool, id: i64, is_published: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE locations SET is_published = ? WHERE id = ?")
        .bind(is_published)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update location")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_location_mysql(row: &sqlx::mysql::MySqlRow) -> Location {
    Location {
        id: row.get("id"),
        name: row.get("name"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
    }
}
