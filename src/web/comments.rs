//! Comment handlers
//!
//! All of them require login. Edits and deletions by anyone but the
//! comment's author are redirected back to the post.

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

use crate::services::CommentServiceError;
use crate::web::blog::{detail_context, DetailMode};
use crate::web::middleware::{AppState, AuthenticatedUser, ObjectPath, PageContext};
use crate::web::responses::AppError;

/// Comment form
#[derive(Debug, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

fn post_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

/// POST /posts/{id}/comment/
///
/// Redirects to the post whether or not the comment was accepted.
pub async fn add_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ObjectPath(post_id): ObjectPath<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let post = state.post_service.get_visible(post_id, Some(user.id)).await?;

    match state.comment_service.add(post.post.id, user.id, &form.text).await {
        Ok(_) | Err(CommentServiceError::Validation(_)) => {}
        Err(e) => return Err(e.into()),
    }
    Ok(Redirect::to(&post_url(post_id)).into_response())
}

/// GET /posts/{id}/edit_comment/{comment_id}/
pub async fn edit_comment_form(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    ObjectPath((post_id, comment_id)): ObjectPath<(i64, i64)>,
) -> Result<Response, AppError> {
    let comment = state.comment_service.get_for_post(post_id, comment_id).await?;
    if !user.is_author_of(comment.author_id) {
        return Ok(Redirect::to(&post_url(post_id)).into_response());
    }

    let post = state.post_service.get_with_meta(post_id).await?;
    let mut context = detail_context(&state, &post, DetailMode::EditComment).await?;
    context.insert("form", &serde_json::json!({ "text": comment.text }));
    context.insert("comment", &comment);
    page.render(&state, "blog/detail.html", &context)
}

/// POST /posts/{id}/edit_comment/{comment_id}/
pub async fn edit_comment(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    ObjectPath((post_id, comment_id)): ObjectPath<(i64, i64)>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let comment = state.comment_service.get_for_post(post_id, comment_id).await?;
    if !user.is_author_of(comment.author_id) {
        return Ok(Redirect::to(&post_url(post_id)).into_response());
    }

    match state.comment_service.update(&comment, &form.text).await {
        Ok(_) => Ok(Redirect::to(&post_url(post_id)).into_response()),
        Err(CommentServiceError::Validation(errors)) => {
            let post = state.post_service.get_with_meta(post_id).await?;
            let mut context = detail_context(&state, &post, DetailMode::EditComment).await?;
            context.insert("form", &serde_json::json!({ "text": form.text }));
            context.insert("errors", &errors);
            context.insert("comment", &comment);
            page.render(&state, "blog/detail.html", &context)
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /posts/{id}/delete_comment/{comment_id}/
pub async fn delete_comment_form(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    ObjectPath((post_id, comment_id)): ObjectPath<(i64, i64)>,
) -> Result<Response, AppError> {
    let comment = state.comment_service.get_for_post(post_id, comment_id).await?;
    if !user.is_author_of(comment.author_id) {
        return Ok(Redirect::to(&post_url(post_id)).into_response());
    }

    let post = state.post_service.get_with_meta(post_id).await?;
    let mut context = detail_context(&state, &post, DetailMode::DeleteComment).await?;
    context.insert("comment", &comment);
    page.render(&state, "blog/detail.html", &context)
}

/// POST /posts/{id}/delete_comment/{comment_id}/
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ObjectPath((post_id, comment_id)): ObjectPath<(i64, i64)>,
) -> Result<Response, AppError> {
    let comment = state.comment_service.get_for_post(post_id, comment_id).await?;
    if user.is_author_of(comment.author_id) {
        state.comment_service.delete(&comment).await?;
        tracing::debug!(comment_id, post_id, "Comment deleted");
    }
    Ok(Redirect::to(&post_url(post_id)).into_response())
}
