//! Static pages and the 404 fallback

use axum::{extract::State, response::Response};
use tera::Context as TeraContext;

use crate::web::middleware::{AppState, PageContext};
use crate::web::responses::AppError;

/// GET /pages/about/
pub async fn about(State(state): State<AppState>, page: PageContext) -> Result<Response, AppError> {
    page.render(&state, "pages/about.html", &TeraContext::new())
}

/// GET /pages/rules/
pub async fn rules(State(state): State<AppState>, page: PageContext) -> Result<Response, AppError> {
    page.render(&state, "pages/rules.html", &TeraContext::new())
}

/// Any unknown route
pub async fn not_found() -> AppError {
    AppError::NotFound
}
