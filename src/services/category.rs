//! Category service
//!
//! Categories group posts. A hidden category hides every post in it, and
//! its page answers 404.

use crate::db::repositories::CategoryRepository;
use crate::models::Category;
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Longest accepted category title
pub const MAX_TITLE_LENGTH: usize = 256;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern is valid"));

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    /// Category slug already exists
    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    /// Category not found, or not published where that matters
    #[error("Category not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for creating a category
#[derive(Debug, Clone)]
pub struct CreateCategoryInput {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub is_published: bool,
}

/// Category service
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    /// Create a new category
    ///
    /// # Errors
    /// - `ValidationError` for an empty or overlong title, or a slug with
    ///   characters outside latin letters, digits, hyphen and underscore
    /// - `DuplicateSlug` if the slug is already used
    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(CategoryServiceError::ValidationError(
                "Category title cannot be empty".to_string(),
            ));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(CategoryServiceError::ValidationError(format!(
                "Category title must be at most {} characters",
                MAX_TITLE_LENGTH
            )));
        }
        if !is_valid_slug(&input.slug) {
            return Err(CategoryServiceError::ValidationError(format!(
                "Invalid slug '{}': use latin letters, digits, hyphen and underscore",
                input.slug
            )));
        }

        if self
            .repo
            .get_by_slug(&input.slug)
            .await
            .context("Failed to check slug uniqueness")?
            .is_some()
        {
            return Err(CategoryServiceError::DuplicateSlug(input.slug));
        }

        let category = Category::new(
            title.to_string(),
            input.slug,
            input.description.trim().to_string(),
            input.is_published,
        );
        Ok(self
            .repo
            .create(&category)
            .await
            .context("Failed to create category")?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Category>, CategoryServiceError> {
        Ok(self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get category by ID")?)
    }

    /// Get a category that may be shown publicly
    pub async fn get_published(&self, slug: &str) -> Result<Category, CategoryServiceError> {
        match self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get category by slug")?
        {
            Some(category) if category.is_published => Ok(category),
            _ => Err(CategoryServiceError::NotFound(slug.to_string())),
        }
    }

    pub async fn list_published(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self
            .repo
            .list_published()
            .await
            .context("Failed to list categories")?)
    }

    /// Publish or hide a category
    pub async fn set_published(&self, slug: &str, is_published: bool) -> Result<(), CategoryServiceError> {
        let found = self
            .repo
            .set_published(slug, is_published)
            .await
            .context("Failed to update category")?;
        if !found {
            return Err(CategoryServiceError::NotFound(slug.to_string()));
        }
        tracing::info!(slug, is_published, "Category publication changed");
        Ok(())
    }
}

/// Check a slug against the allowed character set
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}
