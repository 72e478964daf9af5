//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: i64, author_id: i64, text: String) -> Self {
        Self {
            id: 0,
            text,
            post_id,
            author_id,
            created_at: Utc::now(),
        }
    }
}

/// Comment joined with its author's username, as shown under a post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithMeta {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_username: String,
}
