//! Authentication pages
//!
//! - GET/POST /auth/login/
//! - GET/POST /auth/logout/
//! - GET/POST /auth/registration/
//! - GET/POST /auth/password_change/
//! - GET /auth/password_change/done/

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use serde_json::json;
use tera::Context as TeraContext;

use crate::services::user::non_field_error;
use crate::services::{
    FormErrors, LoginInput, PasswordChangeInput, RegisterInput, UserServiceError,
};
use crate::web::middleware::{
    clear_session_cookie, session_cookie, AppState, AuthenticatedUser, ClientIp, CurrentSession,
    PageContext,
};
use crate::web::responses::{set_cookie, AppError};

/// Where to go after login when `next` is missing or unsafe
const DEFAULT_LOGIN_REDIRECT: &str = "/";

/// `next` if it is a path on this site, else the default
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n,
        _ => DEFAULT_LOGIN_REDIRECT,
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Login form
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

fn render_login(
    state: &AppState,
    page: &PageContext,
    username: &str,
    next: &str,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let mut context = TeraContext::new();
    context.insert("form", &json!({ "username": username }));
    context.insert("next", next);
    context.insert("errors", errors);
    page.render(state, "registration/login.html", &context)
}

/// GET /auth/login/
pub async fn login_form(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<NextQuery>,
) -> Result<Response, AppError> {
    let next = query.next.unwrap_or_default();
    render_login(&state, &page, "", &next, &FormErrors::new())
}

/// POST /auth/login/
pub async fn login(
    State(state): State<AppState>,
    page: PageContext,
    ClientIp(ip): ClientIp,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = form.next.clone().unwrap_or_default();
    let username = form.username.trim().to_string();

    if let Some(ip) = ip {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!(%ip, "Login blocked by IP rate limit");
            let errors = non_field_error("Too many login attempts. Please try again in a minute.");
            return render_login(&state, &page, &username, &next, &errors);
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    if state.rate_limiter.is_username_limited(&username).await {
        tracing::warn!(username = %username, "Login blocked by username rate limit");
        let errors = non_field_error("Too many failed login attempts. Please try again in 15 minutes.");
        return render_login(&state, &page, &username, &next, &errors);
    }

    match state
        .user_service
        .login(LoginInput::new(username.clone(), form.password))
        .await
    {
        Ok((user, session)) => {
            state.rate_limiter.clear_username_attempts(&username).await;
            tracing::info!(user_id = user.id, "User logged in");

            let mut response = Redirect::to(safe_next(form.next.as_deref())).into_response();
            set_cookie(
                &mut response,
                &session_cookie(&session.id, session.max_age_seconds()),
            );
            Ok(response)
        }
        Err(UserServiceError::AuthenticationError(message)) => {
            state.rate_limiter.record_failed_attempt(&username).await;
            render_login(&state, &page, &username, &next, &non_field_error(message))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET or POST /auth/logout/
pub async fn logout(
    State(state): State<AppState>,
    page: PageContext,
    CurrentSession(session_id): CurrentSession,
) -> Result<Response, AppError> {
    if let Some(session_id) = session_id {
        state.user_service.logout(&session_id).await?;
    }

    // The page is rendered as an anonymous visitor
    let PageContext(vars) = page;
    let page = PageContext(vars.with_user(None));
    let mut response = page.render(&state, "registration/logged_out.html", &TeraContext::new())?;
    set_cookie(&mut response, &clear_session_cookie());
    Ok(response)
}

/// Sign-up form
#[derive(Debug, Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

fn render_registration(
    state: &AppState,
    page: &PageContext,
    username: &str,
    email: &str,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let mut context = TeraContext::new();
    context.insert("form", &json!({ "username": username, "email": email }));
    context.insert("errors", errors);
    page.render(state, "registration/registration_form.html", &context)
}

/// GET /auth/registration/
pub async fn registration_form(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<Response, AppError> {
    render_registration(&state, &page, "", "", &FormErrors::new())
}

/// POST /auth/registration/
pub async fn register(
    State(state): State<AppState>,
    page: PageContext,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, AppError> {
    let input = RegisterInput {
        username: form.username.clone(),
        email: form.email.clone(),
        password1: form.password1,
        password2: form.password2,
    };

    match state.user_service.register(input).await {
        Ok(_) => Ok(Redirect::to("/auth/login/").into_response()),
        Err(UserServiceError::Validation(errors)) => {
            render_registration(&state, &page, &form.username, &form.email, &errors)
        }
        Err(e) => Err(e.into()),
    }
}

/// Password change form
#[derive(Debug, Default, Deserialize)]
pub struct PasswordChangeForm {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

/// GET /auth/password_change/
pub async fn password_change_form(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(_user): AuthenticatedUser,
) -> Result<Response, AppError> {
    let mut context = TeraContext::new();
    context.insert("errors", &FormErrors::new());
    page.render(&state, "registration/password_change_form.html", &context)
}

/// POST /auth/password_change/
pub async fn password_change(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    CurrentSession(session_id): CurrentSession,
    Form(form): Form<PasswordChangeForm>,
) -> Result<Response, AppError> {
    let input = PasswordChangeInput {
        old_password: form.old_password,
        new_password1: form.new_password1,
        new_password2: form.new_password2,
    };
    let current = session_id.unwrap_or_default();

    match state.user_service.change_password(&user, &current, input).await {
        Ok(()) => Ok(Redirect::to("/auth/password_change/done/").into_response()),
        Err(UserServiceError::Validation(errors)) => {
            let mut context = TeraContext::new();
            context.insert("errors", &errors);
            page.render(&state, "registration/password_change_form.html", &context)
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /auth/password_change/done/
pub async fn password_change_done(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(_user): AuthenticatedUser,
) -> Result<Response, AppError> {
    page.render(&state, "registration/password_change_done.html", &TeraContext::new())
}
