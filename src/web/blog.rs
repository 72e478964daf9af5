//! Public blog pages
//!
//! - GET / - latest public posts
//! - GET /posts/{id}/ - one post with its comments
//! - GET /category/{slug}/ - public posts of a published category

use axum::{
    extract::{Query, State},
    response::Response,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::models::PostWithMeta;
use crate::services::FormErrors;
use crate::web::middleware::{AppState, MaybeUser, ObjectPath, PageContext};
use crate::web::responses::AppError;

/// `?page=N`, kept raw so bad values fall back to page 1
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// GET /
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let page_obj = state.post_service.list_public(query.page.as_deref()).await?;

    let mut context = TeraContext::new();
    context.insert("page_obj", &page_obj);
    page.render(&state, "blog/index.html", &context)
}

/// GET /posts/{id}/
pub async fn post_detail(
    State(state): State<AppState>,
    page: PageContext,
    MaybeUser(user): MaybeUser,
    ObjectPath(id): ObjectPath<i64>,
) -> Result<Response, AppError> {
    let post = state
        .post_service
        .get_visible(id, user.as_ref().map(|u| u.id))
        .await?;

    let context = detail_context(&state, &post, DetailMode::View).await?;
    page.render(&state, "blog/detail.html", &context)
}

/// GET /category/{slug}/
pub async fn category_posts(
    State(state): State<AppState>,
    page: PageContext,
    ObjectPath(slug): ObjectPath<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let category = state.category_service.get_published(&slug).await?;
    let page_obj = state
        .post_service
        .list_in_category(category.id, query.page.as_deref())
        .await?;

    let mut context = TeraContext::new();
    context.insert("category", &category);
    context.insert("page_obj", &page_obj);
    page.render(&state, "blog/category.html", &context)
}

/// What the comment area of the detail page shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailMode {
    View,
    EditComment,
    DeleteComment,
}

impl DetailMode {
    fn as_str(self) -> &'static str {
        match self {
            DetailMode::View => "view",
            DetailMode::EditComment => "edit_comment",
            DetailMode::DeleteComment => "delete_comment",
        }
    }
}

/// Context for `blog/detail.html`: the post, its comments, an empty
/// comment form and no errors
pub async fn detail_context(
    state: &AppState,
    post: &PostWithMeta,
    mode: DetailMode,
) -> Result<TeraContext, AppError> {
    let comments = state.comment_service.list_for_post(post.post.id).await?;

    let mut context = TeraContext::new();
    context.insert("post", post);
    context.insert("comments", &comments);
    context.insert("mode", mode.as_str());
    context.insert("form", &serde_json::json!({ "text": "" }));
    context.insert("errors", &FormErrors::new());
    Ok(context)
}
