//! Comment service

use crate::db::repositories::CommentRepository;
use crate::models::{Comment, CommentWithMeta};
use crate::services::form::FormErrors;
use anyhow::Context;
use std::sync::Arc;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    /// Comment missing, or not attached to the given post
    #[error("Comment not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(FormErrors),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Comment service
pub struct CommentService {
    repo: Arc<dyn CommentRepository>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepository>) -> Self {
        Self { repo }
    }

    /// Comments under a post, oldest first
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithMeta>, CommentServiceError> {
        Ok(self
            .repo
            .list_for_post(post_id)
            .await
            .context("Failed to list comments")?)
    }

    /// Add a comment by `author_id`; the caller checks the post is visible
    pub async fn add(
        &self,
        post_id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<Comment, CommentServiceError> {
        let text = clean_text(text)?;
        let comment = self
            .repo
            .create(&Comment::new(post_id, author_id, text))
            .await
            .context("Failed to create comment")?;
        tracing::debug!(comment_id = comment.id, post_id, author_id, "Comment added");
        Ok(comment)
    }

    /// Look up a comment that must belong to `post_id`
    pub async fn get_for_post(
        &self,
        post_id: i64,
        comment_id: i64,
    ) -> Result<Comment, CommentServiceError> {
        match self
            .repo
            .get_by_id(comment_id)
            .await
            .context("Failed to get comment")?
        {
            Some(comment) if comment.post_id == post_id => Ok(comment),
            _ => Err(CommentServiceError::NotFound),
        }
    }

    pub async fn update(&self, comment: &Comment, text: &str) -> Result<Comment, CommentServiceError> {
        let text = clean_text(text)?;
        Ok(self
            .repo
            .update_text(comment.id, &text)
            .await
            .context("Failed to update comment")?)
    }

    pub async fn delete(&self, comment: &Comment) -> Result<(), CommentServiceError> {
        if !self
            .repo
            .delete(comment.id)
            .await
            .context("Failed to delete comment")?
        {
            return Err(CommentServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn count_for_post(&self, post_id: i64) -> Result<i64, CommentServiceError> {
        Ok(self
            .repo
            .count_for_post(post_id)
            .await
            .context("Failed to count comments")?)
    }
}

fn clean_text(text: &str) -> Result<String, CommentServiceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CommentServiceError::Validation(FormErrors::single(
            "text",
            "This field is required.",
        )));
    }
    Ok(text.to_string())
}
