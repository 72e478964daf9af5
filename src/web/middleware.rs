//! Web middleware and request extractors
//!
//! Contains:
//! - Application state shared by all handlers
//! - CSRF protection (`csrftoken` cookie, `csrfmiddlewaretoken` form field)
//! - Session loading from the `sessionid` cookie
//! - Rendering of error pages for failed handlers
//! - Extractors for the current user, client IP and page variables

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, FromRequestParts, Path, Request, State},
    http::{header, request::Parts, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tera::Context as TeraContext;
use uuid::Uuid;

use crate::config::Config;
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxCommentRepository, SqlxLocationRepository, SqlxPostRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    CategoryService, CommentService, LoginRateLimiter, MediaStore, PostService, UserService,
};
use crate::theme::{StandardTemplateVars, ThemeEngine};
use crate::web::responses::{render_error_page, set_cookie, AppError, ErrorPage};

/// Cookie holding the login session id
pub const SESSION_COOKIE: &str = "sessionid";
/// Cookie holding the CSRF token
pub const CSRF_COOKIE: &str = "csrftoken";
/// Form field that must echo the CSRF cookie
pub const CSRF_FIELD: &str = "csrfmiddlewaretoken";
/// Header accepted instead of the form field
pub const CSRF_HEADER: &str = "x-csrftoken";

/// CSRF cookie lifetime: one year
const CSRF_COOKIE_MAX_AGE: i64 = 60 * 60 * 24 * 7 * 52;
/// Largest urlencoded body read while checking the CSRF field
const FORM_BODY_LIMIT: usize = 1024 * 1024;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    pub category_service: Arc<CategoryService>,
    pub theme_engine: Arc<ThemeEngine>,
    pub rate_limiter: Arc<LoginRateLimiter>,
}

impl AppState {
    /// Wire repositories and services on top of `pool`
    pub fn new(config: Config, pool: DynDatabasePool, theme_engine: ThemeEngine) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let location_repo = SqlxLocationRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool);

        let media = Arc::new(MediaStore::new(config.media.clone()));
        let post_service = PostService::new(
            post_repo,
            category_repo.clone(),
            location_repo,
            media,
            config.blog.posts_per_page,
        );

        Self {
            user_service: Arc::new(UserService::with_session_days(
                user_repo,
                session_repo,
                config.auth.session_days,
            )),
            post_service: Arc::new(post_service),
            comment_service: Arc::new(CommentService::new(comment_repo)),
            category_service: Arc::new(CategoryService::new(category_repo)),
            theme_engine: Arc::new(theme_engine),
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            config: Arc::new(config),
        }
    }

    /// Page variables for a request whose extensions were filled by the
    /// middleware below
    fn page_vars(&self, path: &str, extensions: &axum::http::Extensions) -> StandardTemplateVars {
        StandardTemplateVars::new(self.config.blog.site_name.clone(), path)
            .with_user(extensions.get::<CurrentUser>().and_then(|c| c.user.clone()))
            .with_csrf_token(
                extensions
                    .get::<CsrfToken>()
                    .map(|t| t.0.clone())
                    .unwrap_or_default(),
            )
    }
}

// ============================================================================
// Request extensions
// ============================================================================

/// Session state resolved from the `sessionid` cookie
#[derive(Debug, Clone, Default)]
pub struct CurrentUser {
    pub user: Option<User>,
    pub session_id: Option<String>,
}

/// CSRF token of the current client
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

// ============================================================================
// Cookies
// ============================================================================

/// Value of cookie `name` from the Cookie header
pub fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(cookies) = value.to_str() else { continue };
        for cookie in cookies.split(';') {
            if let Some((key, value)) = cookie.trim().split_once('=') {
                if key == name && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// `Set-Cookie` value for a new login session
pub fn session_cookie(session_id: &str, max_age_seconds: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, session_id, max_age_seconds
    )
}

/// `Set-Cookie` value that removes the login session
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

fn is_well_formed_token(token: &str) -> bool {
    (16..=64).contains(&token.len()) && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Decoded value of `name` in an `application/x-www-form-urlencoded` body
pub fn form_field(body: &[u8], name: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).ok()?;
    pairs.into_iter().find(|(key, _)| key == name).map(|(_, value)| value)
}

/// Routes whose handlers verify the CSRF field of a multipart body
/// themselves: `/posts/create/` and `/posts/{id}/edit/`
fn checks_multipart_token(path: &str) -> bool {
    if path == "/posts/create/" {
        return true;
    }
    path.strip_prefix("/posts/")
        .and_then(|rest| rest.strip_suffix("/edit/"))
        .is_some_and(|id| id.parse::<i64>().is_ok())
}

// ============================================================================
// Middleware
// ============================================================================

/// CSRF protection middleware
///
/// Issues a `csrftoken` cookie to clients without one. POST requests must
/// echo it in the `csrfmiddlewaretoken` field or the `X-CSRFToken` header.
/// Multipart bodies are only accepted on the post form routes, whose
/// handlers check the field while reading them, see [`crate::web::posts`].
pub async fn csrf_protect(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let existing = get_cookie(request.headers(), CSRF_COOKIE).filter(|t| is_well_formed_token(t));
    let issued = existing.is_none();
    let token = existing.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    request.extensions_mut().insert(CsrfToken(token.clone()));

    let mut response = if request.method() == Method::POST {
        match check_csrf(request, &token).await {
            Ok(request) => next.run(request).await,
            Err(request_path) => {
                tracing::warn!(path = %request_path, "CSRF verification failed");
                let vars = StandardTemplateVars::new(state.config.blog.site_name.clone(), request_path)
                    .with_csrf_token(token.clone());
                render_error_page(&state.theme_engine, ErrorPage::CsrfFailure, &vars)
            }
        }
    } else {
        next.run(request).await
    };

    if issued {
        set_cookie(
            &mut response,
            &format!(
                "{}={}; Path=/; SameSite=Lax; Max-Age={}",
                CSRF_COOKIE, token, CSRF_COOKIE_MAX_AGE
            ),
        );
    }
    response
}

/// Verify the token of a POST, returning the request with its body intact,
/// or the request path on failure
async fn check_csrf(request: Request, token: &str) -> Result<Request, String> {
    let path = request.uri().path().to_string();

    if let Some(header_token) = request.headers().get(CSRF_HEADER).and_then(|v| v.to_str().ok()) {
        return if header_token == token { Ok(request) } else { Err(path) };
    }

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        return if checks_multipart_token(&path) { Ok(request) } else { Err(path) };
    }
    if !content_type.starts_with("application/x-www-form-urlencoded") {
        return Err(path);
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, FORM_BODY_LIMIT).await.map_err(|_| path.clone())?;
    match form_field(&bytes, CSRF_FIELD) {
        Some(submitted) if submitted == token => Ok(Request::from_parts(parts, Body::from(bytes))),
        _ => Err(path),
    }
}

/// Resolve the `sessionid` cookie into the current user
pub async fn load_current_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut current = CurrentUser::default();

    if let Some(token) = get_cookie(request.headers(), SESSION_COOKIE) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                current.user = Some(user);
                current.session_id = Some(token);
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Session validation failed: {}", e),
        }
    }

    request.extensions_mut().insert(current);
    next.run(request).await
}

/// Replace the body of failed responses with the matching error template
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let vars = state.page_vars(request.uri().path(), request.extensions());
    let response = next.run(request).await;

    match response.extensions().get::<ErrorPage>().copied() {
        Some(page) => render_error_page(&state.theme_engine, page, &vars),
        None => response,
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// The logged-in user, if any
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<CurrentUser>()
                .and_then(|c| c.user.clone()),
        ))
    }
}

/// Authenticated user extracted from request
///
/// Anonymous requests are redirected to the login page with `next` set to
/// the requested path.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentUser>().and_then(|c| c.user.clone()) {
            Some(user) => Ok(AuthenticatedUser(user)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                Err(Redirect::to(&login_url(next)).into_response())
            }
        }
    }
}

/// Login page URL that returns to `next` afterwards
pub fn login_url(next: &str) -> String {
    format!("/auth/login/?next={}", urlencoding::encode(next))
}

/// Session id of the logged-in user, if any
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Option<String>);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentSession(
            parts
                .extensions
                .get::<CurrentUser>()
                .and_then(|c| c.session_id.clone()),
        ))
    }
}

/// Client address, from proxy headers or the socket
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        };
        let ip = from_header("x-forwarded-for")
            .or_else(|| from_header("x-real-ip"))
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            });
        Ok(ClientIp(ip))
    }
}

/// Standard template variables for the current request
#[derive(Debug, Clone)]
pub struct PageContext(pub StandardTemplateVars);

impl FromRequestParts<AppState> for PageContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(PageContext(state.page_vars(parts.uri.path(), &parts.extensions)))
    }
}

impl PageContext {
    /// Render `template` with these variables added to `context`
    pub fn render(
        &self,
        state: &AppState,
        template: &str,
        context: &TeraContext,
    ) -> Result<Response, AppError> {
        let html = state
            .theme_engine
            .render_with_standard_vars(template, context, &self.0)?;
        Ok(axum::response::Html(html).into_response())
    }
}

/// Path parameters where a malformed value means "no such page"
#[derive(Debug, Clone)]
pub struct ObjectPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ObjectPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| ObjectPath(value))
            .map_err(|_| AppError::NotFound)
    }
}
