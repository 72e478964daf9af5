//! Profile handlers
//!
//! - GET /profile/{username}/ - a user's posts; the owner also sees hidden ones
//! - GET/POST /edit_profile/ - edit one's own names, email and username

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::services::{FormErrors, ProfileInput, UserServiceError};
use crate::web::blog::PageQuery;
use crate::web::middleware::{AppState, AuthenticatedUser, MaybeUser, ObjectPath, PageContext};
use crate::web::responses::AppError;

/// GET /profile/{username}/
pub async fn profile(
    State(state): State<AppState>,
    page: PageContext,
    MaybeUser(viewer): MaybeUser,
    ObjectPath(username): ObjectPath<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let profile = state
        .user_service
        .get_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;

    let is_owner = viewer.as_ref().is_some_and(|v| v.id == profile.id);
    let page_obj = state
        .post_service
        .list_by_author(profile.id, is_owner, query.page.as_deref())
        .await?;

    let mut context = TeraContext::new();
    context.insert("profile", &profile);
    context.insert("is_owner", &is_owner);
    context.insert("page_obj", &page_obj);
    page.render(&state, "blog/profile.html", &context)
}

/// Profile edit form as submitted
#[derive(Debug, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl From<ProfileForm> for ProfileInput {
    fn from(form: ProfileForm) -> Self {
        Self {
            username: form.username,
            email: form.email,
            first_name: form.first_name,
            last_name: form.last_name,
        }
    }
}

fn render_profile_form(
    state: &AppState,
    page: &PageContext,
    form: &ProfileInput,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    page.render(state, "blog/user.html", &context)
}

/// GET /edit_profile/
pub async fn edit_profile_form(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Response, AppError> {
    render_profile_form(&state, &page, &ProfileInput::from(&user), &FormErrors::new())
}

/// POST /edit_profile/
pub async fn edit_profile(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let input = ProfileInput::from(form);

    match state.user_service.update_profile(&user, input.clone()).await {
        Ok(updated) => Ok(Redirect::to(&format!(
            "/profile/{}/",
            urlencoding::encode(&updated.username)
        ))
        .into_response()),
        Err(UserServiceError::Validation(errors)) => {
            render_profile_form(&state, &page, &input, &errors)
        }
        Err(e) => Err(e.into()),
    }
}
