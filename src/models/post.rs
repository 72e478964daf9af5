//! Post model
//!
//! `Post` is the stored row. `PostWithMeta` is what listings and the detail
//! page work with: the row joined with its author, category and location
//! plus the number of comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    /// Publication moment; posts dated in the future stay hidden until then
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    /// Image path relative to the media root
    pub image: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

/// The slice of a category that post listings need
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryRef {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub is_published: bool,
}

/// Post joined with author, category, location and comment count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithMeta {
    #[serde(flatten)]
    pub post: Post,
    pub author_username: String,
    pub category: Option<CategoryRef>,
    /// Location name, present only while the location is published
    pub location_name: Option<String>,
    pub comment_count: i64,
}

impl PostWithMeta {
    /// Check whether anyone may see this post at `now`.
    ///
    /// A post is public when it is published, its publication date has been
    /// reached and it belongs to a published category.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.post.is_published
            && self.post.pub_date <= now
            && self.category.as_ref().is_some_and(|c| c.is_published)
    }

    /// Check whether `viewer_id` may open this post's page at `now`.
    /// Authors always see their own posts.
    pub fn is_visible_to(&self, viewer_id: Option<i64>, now: DateTime<Utc>) -> bool {
        viewer_id == Some(self.post.author_id) || self.is_visible_at(now)
    }
}
