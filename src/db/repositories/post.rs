//! Post repository
//!
//! Listings always come back as `PostWithMeta`: the post joined with its
//! author, category and location plus a comment count, newest first.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CategoryRef, ListParams, Post, PostWithMeta};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Which posts a listing covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    /// Posts visible to everyone
    Public,
    /// Posts visible to everyone within one category
    PublicInCategory(i64),
    /// Posts of one author; hidden ones only when `include_hidden` is set
    ByAuthor { author_id: i64, include_hidden: bool },
}

/// Value bound into a filter's WHERE clause
#[derive(Debug, Clone, Copy)]
enum FilterArg {
    Id(i64),
    Time(DateTime<Utc>),
}

const PUBLIC_CONDITION: &str =
    "p.is_published = 1 AND p.pub_date <= ? AND c.is_published = 1";

impl PostFilter {
    fn where_clause(&self, now: DateTime<Utc>) -> (String, Vec<FilterArg>) {
        match *self {
            PostFilter::Public => (PUBLIC_CONDITION.to_string(), vec![FilterArg::Time(now)]),
            PostFilter::PublicInCategory(category_id) => (
                format!("{} AND p.category_id = ?", PUBLIC_CONDITION),
                vec![FilterArg::Time(now), FilterArg::Id(category_id)],
            ),
            PostFilter::ByAuthor {
                author_id,
                include_hidden: true,
            } => ("p.author_id = ?".to_string(), vec![FilterArg::Id(author_id)]),
            PostFilter::ByAuthor {
                author_id,
                include_hidden: false,
            } => (
                format!("p.author_id = ? AND {}", PUBLIC_CONDITION),
                vec![FilterArg::Id(author_id), FilterArg::Time(now)],
            ),
        }
    }
}

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post and return it with its new ID
    async fn create(&self, post: &Post) -> Result<Post>;

    /// Overwrite the editable fields of a post
    async fn update(&self, post: &Post) -> Result<Post>;

    /// Delete a post and (through the schema) its comments
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Get a post with author, category, location and comment count
    async fn get_with_meta(&self, id: i64) -> Result<Option<PostWithMeta>>;

    /// One page of posts matching `filter`, evaluated at `now`
    async fn list(
        &self,
        filter: PostFilter,
        now: DateTime<Utc>,
        params: &ListParams,
    ) -> Result<Vec<PostWithMeta>>;

    /// Number of posts matching `filter`, evaluated at `now`
    async fn count(&self, filter: PostFilter, now: DateTime<Utc>) -> Result<i64>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, post).await,
        }
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Mysql => update_post_mysql(self.pool.mysql()?, post).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_post_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_post_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_post_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_with_meta(&self, id: i64) -> Result<Option<PostWithMeta>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_with_meta_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_post_with_meta_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list(
        &self,
        filter: PostFilter,
        now: DateTime<Utc>,
        params: &ListParams,
    ) -> Result<Vec<PostWithMeta>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_posts_sqlite(self.pool.sqlite()?, filter, now, params).await
            }
            DatabaseDriver::Mysql => {
                list_posts_mysql(self.pool.mysql()?, filter, now, params).await
            }
        }
    }

    async fn count(&self, filter: PostFilter, now: DateTime<Utc>) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_posts_sqlite(self.pool.sqlite()?, filter, now).await,
            DatabaseDriver::Mysql => count_posts_mysql(self.pool.mysql()?, filter, now).await,
        }
    }
}

const POST_COLUMNS: &str = "id, title, text, pub_date, author_id, location_id, category_id, \
     image, is_published, created_at";

const META_SELECT: &str = r#"
    SELECT p.id, p.title, p.text, p.pub_date, p.author_id, p.location_id, p.category_id,
           p.image, p.is_published, p.created_at,
           u.username AS author_username,
           c.id AS category_ref_id, c.title AS category_title, c.slug AS category_slug,
           c.is_published AS category_is_published,
           l.name AS location_name, l.is_published AS location_is_published,
           (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
    FROM posts p
    INNER JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id
"#;

const META_FROM: &str = r#"
    FROM posts p
    LEFT JOIN categories c ON c.id = p.category_id
"#;

fn list_sql(where_clause: &str) -> String {
    format!(
        "{} WHERE {} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?",
        META_SELECT, where_clause
    )
}

fn count_sql(where_clause: &str) -> String {
    format!("SELECT COUNT(*) AS count {} WHERE {}", META_FROM, where_clause)
}

fn meta_from_parts(
    post: Post,
    author_username: String,
    category: Option<CategoryRef>,
    location_name: Option<String>,
    location_is_published: Option<bool>,
    comment_count: i64,
) -> PostWithMeta {
    PostWithMeta {
        post,
        author_username,
        category,
        location_name: location_name.filter(|_| location_is_published == Some(true)),
        comment_count,
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, text, pub_date, author_id, location_id, category_id,
                           image, is_published, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(post.pub_date)
    .bind(post.author_id)
    .bind(post.location_id)
    .bind(post.category_id)
    .bind(&post.image)
    .bind(post.is_published)
    .bind(post.created_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    get_post_by_id_sqlite(pool, result.last_insert_rowid())
        .await?
        .context("Post not found after creation")
}

async fn update_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, text = ?, pub_date = ?, location_id = ?, category_id = ?,
            image = ?, is_published = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(post.pub_date)
    .bind(post.location_id)
    .bind(post.category_id)
    .bind(&post.image)
    .bind(post.is_published)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    get_post_by_id_sqlite(pool, post.id)
        .await?
        .context("Post not found after update")
}

async fn delete_post_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;
    Ok(result.rows_affected() > 0)
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;
    Ok(row.as_ref().map(row_to_post_sqlite))
}

async fn get_post_with_meta_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<PostWithMeta>> {
    let sql = format!("{} WHERE p.id = ?", META_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post with details")?;
    Ok(row.as_ref().map(row_to_meta_sqlite))
}

async fn list_posts_sqlite(
    pool: &SqlitePool,
    filter: PostFilter,
    now: DateTime<Utc>,
    params: &ListParams,
) -> Result<Vec<PostWithMeta>> {
    let (where_clause, args) = filter.where_clause(now);
    let sql = list_sql(&where_clause);
    let mut query = sqlx::query(&sql);
    for arg in args {
        query = match arg {
            FilterArg::Id(id) => query.bind(id),
            FilterArg::Time(time) => query.bind(time),
        };
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;
    Ok(rows.iter().map(row_to_meta_sqlite).collect())
}

async fn count_posts_sqlite(pool: &SqlitePool, filter: PostFilter, now: DateTime<Utc>) -> Result<i64> {
    let (where_clause, args) = filter.where_clause(now);
    let sql = count_sql(&where_clause);
    let mut query = sqlx::query(&sql);
    for arg in args {
        query = match arg {
            FilterArg::Id(id) => query.bind(id),
            FilterArg::Time(time) => query.bind(time),
        };
    }
    let row = query
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(row.get("count"))
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        author_id: row.get("author_id"),
        location_id: row.get("location_id"),
        category_id: row.get("category_id"),
        image: row.get("image"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
    }
}

fn row_to_meta_sqlite(row: &sqlx::sqlite::SqliteRow) -> PostWithMeta {
    let category = row
        .get::<Option<i64>, _>("category_ref_id")
        .map(|id| CategoryRef {
            id,
            title: row.get("category_title"),
            slug: row.get("category_slug"),
            is_published: row.get("category_is_published"),
        });
    meta_from_parts(
        row_to_post_sqlite(row),
        row.get("author_username"),
        category,
        row.get("location_name"),
        row.get("location_is_published"),
        row.get("comment_count"),
    )
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &Post) -> Result<Post> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, text, pub_date, author_id, location_id, category_id,
                           image, is_published, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(post.pub_date)
    .bind(post.author_id)
    .bind(post.location_id)
    .bind(post.category_id)
    .bind(&post.image)
    .bind(post.is_published)
    .bind(post.created_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    get_post_by_id_mysql(pool, result.last_insert_id() as i64)
        .await?
        .context("Post not found after creation")
}

async fn update_post_mysql(pool: &MySqlPool, post: &Post) -> Result<Post> {
    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, text = ?, pub_date = ?, location_id = ?, category_id = ?,
            image = ?, is_published = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.text)
    .bind(post.pub_date)
    .bind(post.location_id)
    .bind(post.category_id)
    .bind(&post.image)
    .bind(post.is_published)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    get_post_by_id_mysql(pool, post.id)
        .await?
        .context("Post not found after update")
}

async fn delete_post_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;
    Ok(result.rows_affected() > 0)
}

async fn get_post_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by ID")?;
    Ok(row.as_ref().map(row_to_post_mysql))
}

async fn get_post_with_meta_mysql(pool: &MySqlPool, id: i64) -> Result<Option<PostWithMeta>> {
    let sql = format!("{} WHERE p.id = ?", META_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post with details")?;
    Ok(row.as_ref().map(row_to_meta_mysql))
}

async fn list_posts_mysql(
    pool: &MySqlPool,
    filter: PostFilter,
    now: DateTime<Utc>,
    params: &ListParams,
) -> Result<Vec<PostWithMeta>> {
    let (where_clause, args) = filter.where_clause(now);
    let sql = list_sql(&where_clause);
    let mut query = sqlx::query(&sql);
    for arg in args {
        query = match arg {
            FilterArg::Id(id) => query.bind(id),
            FilterArg::Time(time) => query.bind(time),
        };
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;
    Ok(rows.iter().map(row_to_meta_mysql).collect())
}

async fn count_posts_mysql(pool: &MySqlPool, filter: PostFilter, now: DateTime<Utc>) -> Result<i64> {
    let (where_clause, args) = filter.where_clause(now);
    let sql = count_sql(&where_clause);
    let mut query = sqlx::query(&sql);
    for arg in args {
        query = match arg {
            FilterArg::Id(id) => query.bind(id),
            FilterArg::Time(time) => query.bind(time),
        };
    }
    let row = query
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(row.get("count"))
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Post {
    Post {
        id: row.get("id"),
        title: row.get("title"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        author_id: row.get("author_id"),
        location_id: row.get("location_id"),
        category_id: row.get("category_id"),
        image: row.get("image"),
        is_published: row.get("is_published"),
        created_at: row.get("created_at"),
    }
}

fn row_to_meta_mysql(row: &sqlx::mysql::MySqlRow) -> PostWithMeta {
    let category = row
        .get::<Option<i64>, _>("category_ref_id")
        .map(|id| CategoryRef {
            id,
            title: row.get("category_title"),
            slug: row.get("category_slug"),
            is_published: row.get("category_is_published"),
        });
    meta_from_parts(
        row_to_post_mysql(row),
        row.get("author_username"),
        category,
        row.get("location_name"),
        row.get("location_is_published"),
        row.get("comment_count"),
    )
}
