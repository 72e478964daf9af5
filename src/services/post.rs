//! Post service
//!
//! Listings, visibility checks and the post form:
//! - public, per-category and per-author listings, paginated
//! - detail lookup that hides unpublished posts from everyone but the author
//! - validation of the submitted form, including the optional image

use crate::db::repositories::{CategoryRepository, LocationRepository, PostFilter, PostRepository};
use crate::models::{Category, Location, PagedResult, Paginator, Post, PostWithMeta};
use crate::services::form::FormErrors;
use crate::services::media::{MediaStore, UploadedImage};
use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Longest accepted post title
pub const MAX_TITLE_LENGTH: usize = 256;

/// Formats accepted for `pub_date`, read as UTC
const PUB_DATE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

const REQUIRED: &str = "This field is required.";
const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(FormErrors),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Raw values of the post form, as submitted or as prefilled
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostFormInput {
    pub title: String,
    pub text: String,
    pub pub_date: String,
    /// Category id as sent by the select box
    pub category: String,
    /// Location id, empty for none
    pub location: String,
    pub is_published: bool,
    /// `image-clear` checkbox
    pub clear_image: bool,
    #[serde(skip)]
    pub image: Option<UploadedImage>,
}

impl PostFormInput {
    /// Empty form for a new post, dated `now`
    pub fn blank(now: DateTime<Utc>) -> Self {
        Self {
            pub_date: format_pub_date(now),
            is_published: true,
            ..Self::default()
        }
    }

    /// Form prefilled from an existing post
    pub fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: format_pub_date(post.pub_date),
            category: post.category_id.map(|id| id.to_string()).unwrap_or_default(),
            location: post.location_id.map(|id| id.to_string()).unwrap_or_default(),
            is_published: post.is_published,
            clear_image: false,
            image: None,
        }
    }
}

/// Select box options for the post form
#[derive(Debug, Clone, Serialize)]
pub struct FormChoices {
    pub categories: Vec<Category>,
    pub locations: Vec<Location>,
}

/// Form values after validation
struct CleanPost {
    title: String,
    text: String,
    pub_date: DateTime<Utc>,
    category_id: i64,
    location_id: Option<i64>,
    is_published: bool,
}

/// Post service
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    categories: Arc<dyn CategoryRepository>,
    locations: Arc<dyn LocationRepository>,
    media: Arc<MediaStore>,
    per_page: u32,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        categories: Arc<dyn CategoryRepository>,
        locations: Arc<dyn LocationRepository>,
        media: Arc<MediaStore>,
        per_page: u32,
    ) -> Self {
        Self {
            posts,
            categories,
            locations,
            media,
            per_page,
        }
    }

    /// Publicly visible posts, newest first
    pub async fn list_public(
        &self,
        page: Option<&str>,
    ) -> Result<PagedResult<PostWithMeta>, PostServiceError> {
        self.paged(PostFilter::Public, page).await
    }

    /// Publicly visible posts of one category
    pub async fn list_in_category(
        &self,
        category_id: i64,
        page: Option<&str>,
    ) -> Result<PagedResult<PostWithMeta>, PostServiceError> {
        self.paged(PostFilter::PublicInCategory(category_id), page).await
    }

    /// Posts of one author; `include_hidden` is for the author's own view
    pub async fn list_by_author(
        &self,
        author_id: i64,
        include_hidden: bool,
        page: Option<&str>,
    ) -> Result<PagedResult<PostWithMeta>, PostServiceError> {
        self.paged(
            PostFilter::ByAuthor {
                author_id,
                include_hidden,
            },
            page,
        )
        .await
    }

    async fn paged(
        &self,
        filter: PostFilter,
        page: Option<&str>,
    ) -> Result<PagedResult<PostWithMeta>, PostServiceError> {
        let now = Utc::now();
        let total = self
            .posts
            .count(filter, now)
            .await
            .context("Failed to count posts")?;
        let params = Paginator::new(total, self.per_page).get_page(page);
        let items = self
            .posts
            .list(filter, now, &params)
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Plain post row, for ownership checks before edits
    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        self.posts
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound)
    }

    /// Post with listing metadata, ignoring visibility
    pub async fn get_with_meta(&self, id: i64) -> Result<PostWithMeta, PostServiceError> {
        self.posts
            .get_with_meta(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound)
    }

    /// Post as `viewer_id` may see it, or `NotFound`
    pub async fn get_visible(
        &self,
        id: i64,
        viewer_id: Option<i64>,
    ) -> Result<PostWithMeta, PostServiceError> {
        let post = self
            .posts
            .get_with_meta(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound)?;
        if post.is_visible_to(viewer_id, Utc::now()) {
            Ok(post)
        } else {
            Err(PostServiceError::NotFound)
        }
    }

    /// Options for the category and location select boxes
    pub async fn form_choices(&self) -> Result<FormChoices, PostServiceError> {
        Ok(FormChoices {
            categories: self
                .categories
                .list_published()
                .await
                .context("Failed to list categories")?,
            locations: self
                .locations
                .list_published()
                .await
                .context("Failed to list locations")?,
        })
    }

    /// Validate the form and store a new post written by `author_id`
    pub async fn create(
        &self,
        author_id: i64,
        input: &PostFormInput,
    ) -> Result<Post, PostServiceError> {
        let clean = self.clean(input).await?;
        let image = match &input.image {
            Some(upload) => Some(self.media.save(upload).await?),
            None => None,
        };

        let post = Post {
            id: 0,
            title: clean.title,
            text: clean.text,
            pub_date: clean.pub_date,
            author_id,
            location_id: clean.location_id,
            category_id: Some(clean.category_id),
            image,
            is_published: clean.is_published,
            created_at: Utc::now(),
        };
        let created = match self.posts.create(&post).await {
            Ok(created) => created,
            Err(e) => {
                if let Some(image) = &post.image {
                    self.media.remove(image).await;
                }
                return Err(e.context("Failed to create post").into());
            }
        };

        tracing::info!(post_id = created.id, author_id, "Post created");
        Ok(created)
    }

    /// Validate the form and overwrite `post` with it
    pub async fn update(
        &self,
        post: &Post,
        input: &PostFormInput,
    ) -> Result<Post, PostServiceError> {
        let clean = self.clean(input).await?;

        let mut updated = post.clone();
        updated.title = clean.title;
        updated.text = clean.text;
        updated.pub_date = clean.pub_date;
        updated.category_id = Some(clean.category_id);
        updated.location_id = clean.location_id;
        updated.is_published = clean.is_published;
        if let Some(upload) = &input.image {
            updated.image = Some(self.media.save(upload).await?);
        } else if input.clear_image {
            updated.image = None;
        }

        let saved = match self.posts.update(&updated).await {
            Ok(saved) => saved,
            Err(e) => {
                if input.image.is_some() {
                    if let Some(new_image) = &updated.image {
                        self.media.remove(new_image).await;
                    }
                }
                return Err(e.context("Failed to update post").into());
            }
        };

        if let Some(old) = &post.image {
            if saved.image.as_ref() != Some(old) {
                self.media.remove(old).await;
            }
        }
        Ok(saved)
    }

    /// Delete `post`, its comments and its image
    pub async fn delete(&self, post: &Post) -> Result<(), PostServiceError> {
        let deleted = self
            .posts
            .delete(post.id)
            .await
            .context("Failed to delete post")?;
        if !deleted {
            return Err(PostServiceError::NotFound);
        }
        if let Some(image) = &post.image {
            self.media.remove(image).await;
        }
        tracing::info!(post_id = post.id, "Post deleted");
        Ok(())
    }

    async fn clean(&self, input: &PostFormInput) -> Result<CleanPost, PostServiceError> {
        let mut errors = FormErrors::new();

        let title = input.title.trim().to_string();
        if title.is_empty() {
            errors.add("title", REQUIRED);
        } else if title.chars().count() > MAX_TITLE_LENGTH {
            errors.add(
                "title",
                format!("Ensure this value has at most {} characters.", MAX_TITLE_LENGTH),
            );
        }

        let text = input.text.trim().to_string();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let pub_date = if input.pub_date.trim().is_empty() {
            errors.add("pub_date", REQUIRED);
            None
        } else {
            let parsed = parse_pub_date(&input.pub_date);
            if parsed.is_none() {
                errors.add("pub_date", "Enter a valid date/time.");
            }
            parsed
        };

        let category_id = match input.category.trim() {
            "" => {
                errors.add("category", REQUIRED);
                None
            }
            raw => {
                let category = match raw.parse::<i64>() {
                    Ok(id) => self
                        .categories
                        .get_by_id(id)
                        .await
                        .context("Failed to get category")?,
                    Err(_) => None,
                };
                match category {
                    Some(c) if c.is_published => Some(c.id),
                    _ => {
                        errors.add("category", INVALID_CHOICE);
                        None
                    }
                }
            }
        };

        let location_id = match input.location.trim() {
            "" => None,
            raw => {
                let location = match raw.parse::<i64>() {
                    Ok(id) => self
                        .locations
                        .get_by_id(id)
                        .await
                        .context("Failed to get location")?,
                    Err(_) => None,
                };
                match location {
                    Some(l) if l.is_published => Some(l.id),
                    _ => {
                        errors.add("location", INVALID_CHOICE);
                        None
                    }
                }
            }
        };

        if let Some(upload) = &input.image {
            for problem in self.media.check(upload) {
                errors.add("image", problem);
            }
        }

        match (pub_date, category_id) {
            (Some(pub_date), Some(category_id)) if errors.is_empty() => Ok(CleanPost {
                title,
                text,
                pub_date,
                category_id,
                location_id,
                is_published: input.is_published,
            }),
            _ => Err(PostServiceError::Validation(errors)),
        }
    }
}

/// Parse a submitted `pub_date` in any accepted format, as UTC
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    PUB_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Render a date the way the form's datetime-local input expects
pub fn format_pub_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M").to_string()
}
