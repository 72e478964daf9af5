//! Web layer - HTML handlers and routing
//!
//! Route groups:
//! - Blog: posts, comments, categories, profiles
//! - Static pages
//! - Auth: login, logout, sign-up, password change
//! - Uploaded media under `/media/`

pub mod auth;
pub mod blog;
pub mod comments;
pub mod middleware;
pub mod pages;
pub mod posts;
pub mod profile;
pub mod responses;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

pub use middleware::{AppState, AuthenticatedUser, MaybeUser, PageContext};
pub use responses::AppError;

/// Room for the text fields around an uploaded image
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Routes of the blog, pages and auth groups
pub fn build_routes() -> Router<AppState> {
    Router::new()
        // Blog
        .route("/", get(blog::index))
        .route("/posts/create/", get(posts::create_form).post(posts::create_post))
        .route("/posts/{id}/", get(blog::post_detail))
        .route("/posts/{id}/edit/", get(posts::edit_form).post(posts::edit_post))
        .route("/posts/{id}/delete/", get(posts::delete_form).post(posts::delete_post))
        .route("/posts/{id}/comment/", axum::routing::post(comments::add_comment))
        .route(
            "/posts/{id}/edit_comment/{comment_id}/",
            get(comments::edit_comment_form).post(comments::edit_comment),
        )
        .route(
            "/posts/{id}/delete_comment/{comment_id}/",
            get(comments::delete_comment_form).post(comments::delete_comment),
        )
        .route("/category/{slug}/", get(blog::category_posts))
        .route("/profile/{username}/", get(profile::profile))
        .route("/edit_profile/", get(profile::edit_profile_form).post(profile::edit_profile))
        // Static pages
        .route("/pages/about/", get(pages::about))
        .route("/pages/rules/", get(pages::rules))
        // Auth
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route("/auth/registration/", get(auth::registration_form).post(auth::register))
        .route(
            "/auth/password_change/",
            get(auth::password_change_form).post(auth::password_change),
        )
        .route("/auth/password_change/done/", get(auth::password_change_done))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let media_dir = state.config.media.path.clone();
    let body_limit = state.config.media.max_file_size as usize + MULTIPART_OVERHEAD;

    build_routes()
        .nest_service("/media", ServeDir::new(media_dir))
        .fallback(pages::not_found)
        // Innermost first: error pages see the user and CSRF token
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::load_current_user,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::csrf_protect,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
