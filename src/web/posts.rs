//! Post authoring handlers
//!
//! - GET/POST /posts/create/
//! - GET/POST /posts/{id}/edit/
//! - GET/POST /posts/{id}/delete/
//!
//! Post forms are `multipart/form-data`, so the CSRF field is checked here
//! while reading the body instead of in the CSRF middleware.

use axum::{
    extract::{Multipart, State},
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use chrono::Utc;
use serde::Serialize;
use tera::Context as TeraContext;

use crate::models::{Post, User};
use crate::services::{FormErrors, PostFormInput, PostServiceError, UploadedImage};
use crate::web::middleware::{AppState, AuthenticatedUser, CsrfToken, ObjectPath, PageContext, CSRF_FIELD};
use crate::web::responses::AppError;

/// Which page `blog/create.html` shows
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum FormMode {
    Create,
    Edit,
    Delete,
}

fn profile_url(user: &User) -> String {
    format!("/profile/{}/", urlencoding::encode(&user.username))
}

fn post_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

/// Read the post form from a multipart body, verifying the CSRF field
async fn read_post_form(mut multipart: Multipart, csrf: &CsrfToken) -> Result<PostFormInput, AppError> {
    let mut input = PostFormInput::default();
    let mut csrf_ok = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "image" {
            let filename = field.file_name().unwrap_or("").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to read image: {}", e)))?;
            // Browsers send an empty part when no file was chosen
            if !filename.is_empty() || !data.is_empty() {
                input.image = Some(UploadedImage {
                    filename,
                    content_type,
                    data: data.to_vec(),
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to read form field: {}", e)))?;
        match name.as_str() {
            CSRF_FIELD => csrf_ok = value == csrf.0,
            "title" => input.title = value,
            "text" => input.text = value,
            "pub_date" => input.pub_date = value,
            "category" => input.category = value,
            "location" => input.location = value,
            "is_published" => input.is_published = is_checked(&value),
            "image-clear" => input.clear_image = is_checked(&value),
            _ => {}
        }
    }

    if !csrf_ok {
        tracing::warn!("CSRF verification failed for post form");
        return Err(AppError::CsrfFailure);
    }
    Ok(input)
}

fn is_checked(value: &str) -> bool {
    matches!(value, "on" | "true" | "1")
}

async fn render_form(
    state: &AppState,
    page: &PageContext,
    mode: FormMode,
    post: Option<&Post>,
    form: &PostFormInput,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let choices = state.post_service.form_choices().await?;

    let mut context = TeraContext::new();
    context.insert("mode", &mode);
    context.insert("post", &post);
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("choices", &choices);
    page.render(state, "blog/create.html", &context)
}

/// GET /posts/create/
pub async fn create_form(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(_user): AuthenticatedUser,
) -> Result<Response, AppError> {
    let form = PostFormInput::blank(Utc::now());
    render_form(&state, &page, FormMode::Create, None, &form, &FormErrors::new()).await
}

/// POST /posts/create/
pub async fn create_post(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    Extension(csrf): Extension<CsrfToken>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_post_form(multipart, &csrf).await?;

    match state.post_service.create(user.id, &form).await {
        Ok(_) => Ok(Redirect::to(&profile_url(&user)).into_response()),
        Err(PostServiceError::Validation(errors)) => {
            render_form(&state, &page, FormMode::Create, None, &form, &errors).await
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /posts/{id}/edit/
pub async fn edit_form(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    ObjectPath(post_id): ObjectPath<i64>,
) -> Result<Response, AppError> {
    let post = state.post_service.get(post_id).await?;
    if !user.is_author_of(post.author_id) {
        return Ok(Redirect::to(&post_url(post_id)).into_response());
    }

    let form = PostFormInput::from_post(&post);
    render_form(&state, &page, FormMode::Edit, Some(&post), &form, &FormErrors::new()).await
}

/// POST /posts/{id}/edit/
pub async fn edit_post(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    ObjectPath(post_id): ObjectPath<i64>,
    Extension(csrf): Extension<CsrfToken>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let post = state.post_service.get(post_id).await?;
    if !user.is_author_of(post.author_id) {
        return Ok(Redirect::to(&post_url(post_id)).into_response());
    }

    let form = read_post_form(multipart, &csrf).await?;
    match state.post_service.update(&post, &form).await {
        Ok(_) => Ok(Redirect::to(&post_url(post_id)).into_response()),
        Err(PostServiceError::Validation(errors)) => {
            render_form(&state, &page, FormMode::Edit, Some(&post), &form, &errors).await
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /posts/{id}/delete/ - confirmation page
pub async fn delete_form(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    ObjectPath(post_id): ObjectPath<i64>,
) -> Result<Response, AppError> {
    let post = state.post_service.get_with_meta(post_id).await?;
    if !user.is_author_of(post.post.author_id) {
        return Ok(Redirect::to(&post_url(post_id)).into_response());
    }

    let mut context = TeraContext::new();
    context.insert("mode", &FormMode::Delete);
    context.insert("post", &post);
    page.render(&state, "blog/create.html", &context)
}

/// POST /posts/{id}/delete/
pub async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ObjectPath(post_id): ObjectPath<i64>,
) -> Result<Response, AppError> {
    let post = state.post_service.get(post_id).await?;
    if !user.is_author_of(post.author_id) {
        return Ok(Redirect::to(&post_url(post_id)).into_response());
    }

    state.post_service.delete(&post).await?;
    Ok(Redirect::to(&profile_url(&user)).into_response())
}
