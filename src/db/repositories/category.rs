//! Category repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category
    async fn create(&self, category: &Category) -> Result<Category>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Get category by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// List published categories ordered by title
    async fn list_published(&self) -> Result<Vec<Category>>;

    /// Toggle publication, returning false when the slug is unknown
    async fn set_published(&self, slug: &str, is_published: bool) -> Result<bool>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.sqlite()?, category).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.mysql()?, category).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_slug_sqlite(self.pool.sqlite()?, slug).await,
            DatabaseDriver::Mysql => get_by_slug_mysql(self.pool.mysql()?, slug).await,
        }
    }

    async fn list_published(&self) -> Result<Vec<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_published_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_published_mysql(self.pool.mysql()?).await,
        }
    }

    async fn set_published(&self, slug: &str, is_published: bool) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_published_sqlite(self.pool.sqlite()?, slug, is_published).await
            }
            DatabaseDriver::Mysql => {
                set_published_mysql(self.pool.mysql()?, slug, is_published).await
            }
        }
    }
}

const CATEGORY_COLUMNS: &str = "id, title, description, slug, is_published, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    let result = sqlx::query(
        r#"
        INSERT INTO categories (title, description, slug, is_published, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&category.title)
    .bind(&category.description)
    .bind(&category.slug)
    .bind(category.is_published)
    .bind(category.created_at)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    get_by_id_sqlite(pool, result.last_insert_rowid())
        .await?
        .context("Category not found after creation")
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Category>> {
    let sql = format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by ID")?;
    Ok(row.as_ref().map(row_to_category_sqlite))
}

async fn get_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Category>> {
    let sql = format!("SELECT {} FROM categories WHERE slug = ?", CATEGORY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by slug")?;
    Ok(row.as_ref().map(row_to_category_sqlite))
}

async fn list_published_sqlite(pool: &SqlitePool) -> Result<Vec<Category>> {
    let sql = format!(
        "SELECT {} FROM categories WHERE is_published = 1 ORDER BY title, id",
        CATEGORY_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;
    Ok(rows.iter().map(row_to_category_sqlite).collect())
}

async fn set_published_sqlite(pool: &SqlitePool, slug: &str, is_published: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE categories SET is_published = ? WHERE slug = ?")
        .bind(is_published)
        .bind(slug)
        .execute(pool)
        .await
        .context("Failed to update category")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        slug: row.get("slug"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    let result = sqlx::query(
        r#"
        INSERT INTO categories (title, description, slug, is_published, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&category.title)
    .bind(&category.description)
    .bind(&category.slug)
    .bind(category.is_published)
    .bind(category.created_at)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    get_by_id_mysql(pool, result.last_insert_id() as i64)
        .await?
        .context("Category not found after creation")
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Category>> {
    let sql = format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by ID")?;
    Ok(row.as_ref().map(row_to_category_mysql))
}

async fn get_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Category>> {
    let sql = format!("SELECT {} FROM categories WHERE slug = ?", CATEGORY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by slug")?;
    Ok(row.as_ref().map(row_to_category_mysql))
}

async fn list_published_mysql(pool: &MySqlPool) -> Result<Vec<Category>> {
    let sql = format!(
        "SELECT {} FROM categories WHERE is_published = 1 ORDER BY title, id",
        CATEGORY_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;
    Ok(rows.iter().map(row_to_category_mysql).collect())
}

async fn set_published_mysql(pool: &MySqlPool, slug: &str, is_published: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE categories SET is_published = ? WHERE slug = ?")
        .bind(is_published)
        .bind(slug)
        .execute(pool)
        .await
        .context("Failed to update category")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Category {
    Category {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        slug: row.get("slug"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
    }
}
