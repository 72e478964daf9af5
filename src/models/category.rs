//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A thematic grouping of posts.
///
/// Unpublished categories hide their page and every post filed under them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// URL identifier: latin letters, digits, hyphen and underscore
    pub slug: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl Category {
    /// Create a new Category. The ID is assigned by the database.
    pub fn new(title: String, slug: String, description: String, is_published: bool) -> Self {
        Self {
            id: 0,
            title,
            description,
            slug,
            is_published,
            created_at: Utc::now(),
        }
    }
}
