//! Error responses and page rendering helpers

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use tera::Context as TeraContext;

use crate::services::{
    CategoryServiceError, CommentServiceError, PostServiceError, UserServiceError,
};
use crate::theme::{StandardTemplateVars, ThemeEngine};

/// Error pages the site can show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPage {
    NotFound,
    CsrfFailure,
    ServerError,
}

impl ErrorPage {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorPage::NotFound => StatusCode::NOT_FOUND,
            ErrorPage::CsrfFailure => StatusCode::FORBIDDEN,
            ErrorPage::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn template(self) -> &'static str {
        match self {
            ErrorPage::NotFound => "pages/404.html",
            ErrorPage::CsrfFailure => "pages/403csrf.html",
            ErrorPage::ServerError => "pages/500.html",
        }
    }
}

/// Handler error, turned into an error page
///
/// The response carries an [`ErrorPage`] marker; the error page middleware
/// replaces its body with the rendered template.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("CSRF verification failed")]
    CsrfFailure,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let page = match self {
            AppError::NotFound => ErrorPage::NotFound,
            AppError::CsrfFailure => ErrorPage::CsrfFailure,
            AppError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                ErrorPage::ServerError
            }
        };
        let mut response = page.status().into_response();
        response.extensions_mut().insert(page);
        response
    }
}

impl From<PostServiceError> for AppError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound => AppError::NotFound,
            PostServiceError::Validation(errors) => {
                AppError::Internal(anyhow::anyhow!("Unhandled post form errors: {}", errors))
            }
            PostServiceError::Internal(e) => AppError::Internal(e),
        }
    }
}

impl From<CommentServiceError> for AppError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::NotFound => AppError::NotFound,
            CommentServiceError::Validation(errors) => {
                AppError::Internal(anyhow::anyhow!("Unhandled comment form errors: {}", errors))
            }
            CommentServiceError::Internal(e) => AppError::Internal(e),
        }
    }
}

impl From<CategoryServiceError> for AppError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::NotFound(_) => AppError::NotFound,
            CategoryServiceError::InternalError(e) => AppError::Internal(e),
            other => AppError::Internal(anyhow::anyhow!(other.to_string())),
        }
    }
}

impl From<UserServiceError> for AppError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::InternalError(e) => AppError::Internal(e),
            other => AppError::Internal(anyhow::anyhow!("Unhandled user error: {}", other)),
        }
    }
}

/// Render an error page with whatever page variables are known
pub fn render_error_page(
    theme: &ThemeEngine,
    page: ErrorPage,
    vars: &StandardTemplateVars,
) -> Response {
    let mut context = TeraContext::new();
    vars.insert_into(&mut context);
    let html = theme.render_with_fallback(page.template(), &context);
    (page.status(), Html(html)).into_response()
}

/// Append a `Set-Cookie` header
pub fn set_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Invalid cookie header: {}", e),
    }
}
