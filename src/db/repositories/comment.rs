//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentWithMeta};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, comment: &Comment) -> Result<Comment>;

    /// Get a comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Replace the text of a comment
    async fn update_text(&self, id: i64, text: &str) -> Result<Comment>;

    /// Delete a comment
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Comments of a post, oldest first
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithMeta>>;

    async fn count_for_post(&self, post_id: i64) -> Result<i64>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.sqlite()?, comment).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.mysql()?, comment).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn update_text(&self, id: i64, text: &str) -> Result<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_text_sqlite(self.pool.sqlite()?, id, text).await,
            DatabaseDriver::Mysql => update_text_mysql(self.pool.mysql()?, id, text).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithMeta>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_for_post_sqlite(self.pool.sqlite()?, post_id).await,
            DatabaseDriver::Mysql => list_for_post_mysql(self.pool.mysql()?, post_id).await,
        }
    }

    async fn count_for_post(&self, post_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_for_post_sqlite(self.pool.sqlite()?, post_id).await,
            DatabaseDriver::Mysql => count_for_post_mysql(self.pool.mysql()?, post_id).await,
        }
    }
}

const LIST_SQL: &str = r#"
    SELECT cm.id, cm.text, cm.post_id, cm.author_id, cm.created_at,
           u.username AS author_username
    FROM comments cm
    INNER JOIN users u ON u.id = cm.author_id
    WHERE cm.post_id = ?
    ORDER BY cm.created_at ASC, cm.id ASC
"#;

// SQLite implementations

async fn create_sqlite(pool: &SqlitePool, comment: &Comment) -> Result<Comment> {
    let result = sqlx::query(
        "INSERT INTO comments (text, post_id, author_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&comment.text)
    .bind(comment.post_id)
    .bind(comment.author_id)
    .bind(comment.created_at)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    get_by_id_sqlite(pool, result.last_insert_rowid())
        .await?
        .context("Comment not found after creation")
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(
        "SELECT id, text, post_id, author_id, created_at FROM comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get comment")?;

    Ok(row.map(|r| Comment {
        id: r.get("id"),
        text: r.get("text"),
        post_id: r.get("post_id"),
        author_id: r.get("author_id"),
        created_at: r.get("created_at"),
    }))
}

async fn update_text_sqlite(pool: &SqlitePool, id: i64, text: &str) -> Result<Comment> {
    sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
        .bind(text)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update comment")?;

    get_by_id_sqlite(pool, id)
        .await?
        .context("Comment not found after update")
}

async fn delete_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete comment")?;
    Ok(result.rows_affected() > 0)
}

async fn list_for_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<CommentWithMeta>> {
    let rows = sqlx::query(LIST_SQL)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;

    Ok(rows
        .iter()
        .map(|r| CommentWithMeta {
            comment: Comment {
                id: r.get("id"),
                text: r.get("text"),
                post_id: r.get("post_id"),
                author_id: r.get("author_id"),
                created_at: r.get("created_at"),
            },
            author_username: r.get("author_username"),
        })
        .collect())
}

async fn count_for_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM comments WHERE post_id = ?")
        .bind(post_id)
        .fetch_one(pool)
        .await
        .context("Failed to count comments")?;
    Ok(row.get("count"))
}

// MySQL implementations

async fn create_mysql(pool: &MySqlPool, comment: &Comment) -> Result<Comment> {
    let result = sqlx::query(
        "INSERT INTO comments (text, post_id, author_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&comment.text)
    .bind(comment.post_id)
    .bind(comment.author_id)
    .bind(comment.created_at)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    get_by_id_mysql(pool, result.last_insert_id() as i64)
        .await?
        .context("Comment not found after creation")
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(
        "SELECT id, text, post_id, author_id, created_at FROM comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get comment")?;

    Ok(row.map(|r| Comment {
        id: r.get("id"),
        text: r.get("text"),
        post_id: r.get("post_id"),
        author_id: r.get("author_id"),
        created_at: r.get("created_at"),
    }))
}

async fn update_text_mysql(pool: &MySqlPool, id: i64, text: &str) -> Result<Comment> {
    sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
        .bind(text)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update comment")?;

    get_by_id_mysql(pool, id)
        .await?
        .context("Comment not found after update")
}

async fn delete_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete comment")?;
    Ok(result.rows_affected() > 0)
}

async fn list_for_post_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<CommentWithMeta>> {
    let rows = sqlx::query(LIST_SQL)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;

    Ok(rows
        .iter()
        .map(|r| CommentWithMeta {
            comment: Comment {
                id: r.get("id"),
                text: r.get("text"),
                post_id: r.get("post_id"),
                author_id: r.get("author_id"),
                created_at: r.get("created_at"),
            },
            author_username: r.get("author_username"),
        })
        .collect())
}

async fn count_for_post_mysql(pool: &MySqlPool, post_id: i64) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM comments WHERE post_id = ?")
        .bind(post_id)
        .fetch_one(pool)
        .await
        .context("Failed to count comments")?;
    Ok(row.get("count"))
}
