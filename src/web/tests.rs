//! Router-level tests driving the real application

use super::*;
use crate::config::{Config, MediaConfig};
use crate::db::{create_test_pool, migrations};
use crate::models::{Post, User};
use crate::services::{CreateCategoryInput, LoginInput, PostFormInput, RegisterInput};
use crate::theme::ThemeEngine;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use chrono::{Duration, Utc};
use tempfile::TempDir;
use tower::ServiceExt;

const CSRF: &str = "testcsrftoken000000000000";
const PASSWORD: &str = "correct-horse-battery";

struct TestApp {
    router: Router,
    state: AppState,
    category_id: i64,
    _media: TempDir,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl TestResponse {
    fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

async fn setup() -> TestApp {
    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();

    let media = TempDir::new().unwrap();
    let config = Config {
        media: MediaConfig {
            path: media.path().to_path_buf(),
            ..MediaConfig::default()
        },
        ..Config::default()
    };
    let state = AppState::new(config, pool, ThemeEngine::new(None).unwrap());

    let category = state
        .category_service
        .create(CreateCategoryInput {
            title: "Travel".to_string(),
            slug: "travel".to_string(),
            description: "Trips".to_string(),
            is_published: true,
        })
        .await
        .unwrap();
    state
        .category_service
        .create(CreateCategoryInput {
            title: "Drafts".to_string(),
            slug: "drafts".to_string(),
            description: String::new(),
            is_published: false,
        })
        .await
        .unwrap();

    TestApp {
        router: build_router(state.clone()),
        state,
        category_id: category.id,
        _media: media,
    }
}

impl TestApp {
    async fn user(&self, username: &str) -> User {
        self.state
            .user_service
            .register(RegisterInput::new(username, "", PASSWORD))
            .await
            .unwrap()
    }

    /// Cookie header of a logged-in `user`, including the CSRF cookie
    async fn login(&self, user: &User) -> String {
        let (_, session) = self
            .state
            .user_service
            .login(LoginInput::new(user.username.clone(), PASSWORD))
            .await
            .unwrap();
        format!("sessionid={}; csrftoken={}", session.id, CSRF)
    }

    async fn post(&self, author: &User, title: &str, category_id: i64, published: bool, pub_date_offset: Duration) -> Post {
        let input = PostFormInput {
            title: title.to_string(),
            text: "Body text".to_string(),
            pub_date: crate::services::post::format_pub_date(Utc::now() + pub_date_offset),
            category: category_id.to_string(),
            is_published: published,
            ..PostFormInput::default()
        };
        self.state.post_service.create(author.id, &input).await.unwrap()
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, cookie: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }
}

fn with_csrf(body: &str) -> String {
    if body.is_empty() {
        format!("csrfmiddlewaretoken={}", CSRF)
    } else {
        format!("{}&csrfmiddlewaretoken={}", body, CSRF)
    }
}

/// PNG signature followed by filler, enough for format detection
const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

const BOUNDARY: &str = "----blogicumtestboundary";

fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, data)) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(uri: &str, cookie: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

// ============================================================================
// Listings and detail
// ============================================================================

#[tokio::test]
async fn test_index_shows_only_public_posts() {
    let app = setup().await;
    let author = app.user("author").await;
    app.post(&author, "Visible post", app.category_id, true, -Duration::hours(1)).await;
    app.post(&author, "Draft post", app.category_id, false, -Duration::hours(1)).await;
    app.post(&author, "Future post", app.category_id, true, Duration::days(1)).await;

    let response = app.get("/", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Visible post"));
    assert!(!response.body.contains("Draft post"));
    assert!(!response.body.contains("Future post"));
}

#[tokio::test]
async fn test_hiding_category_hides_its_posts_everywhere() {
    let app = setup().await;
    let author = app.user("author").await;
    let reader = app.user("reader").await;
    let post = app.post(&author, "Soon hidden", app.category_id, true, -Duration::hours(1)).await;

    assert!(app.get("/", None).await.body.contains("Soon hidden"));
    app.state.category_service.set_published("travel", false).await.unwrap();

    assert!(!app.get("/", None).await.body.contains("Soon hidden"));
    assert_eq!(app.get("/category/travel/", None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/posts/{}/", post.id), None).await.status, StatusCode::NOT_FOUND);

    let reader_cookie = app.login(&reader).await;
    let other = app.get("/profile/author/", Some(&reader_cookie)).await;
    assert_eq!(other.status, StatusCode::OK);
    assert!(!other.body.contains("Soon hidden"));

    let author_cookie = app.login(&author).await;
    let own = app.get("/profile/author/", Some(&author_cookie)).await;
    assert!(own.body.contains("Soon hidden"));
}

#[tokio::test]
async fn test_index_paginates_by_ten() {
    let app = setup().await;
    let author = app.user("author").await;
    for i in 0..12 {
        app.post(&author, &format!("Entry number {:02}", i), app.category_id, true, -Duration::hours(i + 1)).await;
    }

    let first = app.get("/", None).await;
    assert_eq!(first.body.matches("class=\"post-card\"").count(), 10);
    assert!(first.body.contains("Page 1 of 2"));

    let second = app.get("/?page=2", None).await;
    assert_eq!(second.body.matches("class=\"post-card\"").count(), 2);

    // Garbage and out-of-range page numbers are clamped
    let garbage = app.get("/?page=abc", None).await;
    assert_eq!(garbage.status, StatusCode::OK);
    assert!(garbage.body.contains("Page 1 of 2"));
    let beyond = app.get("/?page=99", None).await;
    assert!(beyond.body.contains("Page 2 of 2"));
}

#[tokio::test]
async fn test_detail_hides_unpublished_post_from_others() {
    let app = setup().await;
    let author = app.user("author").await;
    let other = app.user("reader").await;
    let draft = app.post(&author, "Secret draft", app.category_id, false, -Duration::hours(1)).await;
    let uri = format!("/posts/{}/", draft.id);

    let anonymous = app.get(&uri, None).await;
    assert_eq!(anonymous.status, StatusCode::NOT_FOUND);
    assert!(anonymous.body.contains("Page not found"));

    let other_cookie = app.login(&other).await;
    assert_eq!(app.get(&uri, Some(&other_cookie)).await.status, StatusCode::NOT_FOUND);

    let author_cookie = app.login(&author).await;
    let own = app.get(&uri, Some(&author_cookie)).await;
    assert_eq!(own.status, StatusCode::OK);
    assert!(own.body.contains("Secret draft"));
}

#[tokio::test]
async fn test_detail_unknown_or_malformed_id_is_404() {
    let app = setup().await;
    assert_eq!(app.get("/posts/9999/", None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/posts/abc/", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_category_page() {
    let app = setup().await;
    let author = app.user("author").await;
    app.post(&author, "Trip to the mountains", app.category_id, true, -Duration::hours(1)).await;

    let response = app.get("/category/travel/", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Trip to the mountains"));

    assert_eq!(app.get("/category/drafts/", None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/category/missing/", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_route_renders_404_page() {
    let app = setup().await;
    let response = app.get("/no/such/page/", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.contains("Page not found"));
}

#[tokio::test]
async fn test_static_pages() {
    let app = setup().await;
    let about = app.get("/pages/about/", None).await;
    assert_eq!(about.status, StatusCode::OK);
    assert!(about.body.contains("About the project"));
    assert_eq!(app.get("/pages/rules/", None).await.status, StatusCode::OK);
}

// ============================================================================
// Login required and CSRF
// ============================================================================

#[tokio::test]
async fn test_anonymous_user_is_sent_to_login() {
    let app = setup().await;
    let response = app.get("/posts/create/", None).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), "/auth/login/?next=%2Fposts%2Fcreate%2F");
}

#[tokio::test]
async fn test_first_visit_issues_csrf_cookie() {
    let app = setup().await;
    let response = app.get("/", None).await;
    let cookies: Vec<_> = response
        .headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("csrftoken=")));

    // A client that already has one is not given another
    let again = app.get("/", Some(&format!("csrftoken={}", CSRF))).await;
    assert!(again.headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_post_without_csrf_token_is_forbidden() {
    let app = setup().await;
    let author = app.user("author").await;
    let post = app.post(&author, "Target", app.category_id, true, -Duration::hours(1)).await;
    let cookie = app.login(&author).await;

    let response = app
        .post_form(&format!("/posts/{}/comment/", post.id), &cookie, "text=hello")
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.body.contains("CSRF verification failed"));

    let wrong = app
        .post_form(
            &format!("/posts/{}/comment/", post.id),
            &cookie,
            "text=hello&csrfmiddlewaretoken=someothertoken00000",
        )
        .await;
    assert_eq!(wrong.status, StatusCode::FORBIDDEN);
    assert_eq!(app.state.comment_service.count_for_post(post.id).await.unwrap(), 0);
}

// ============================================================================
// Comments
// ============================================================================

#[tokio::test]
async fn test_add_comment_increments_count_and_redirects() {
    let app = setup().await;
    let author = app.user("author").await;
    let reader = app.user("reader").await;
    let post = app.post(&author, "Commentable", app.category_id, true, -Duration::hours(1)).await;
    let cookie = app.login(&reader).await;

    let response = app
        .post_form(
            &format!("/posts/{}/comment/", post.id),
            &cookie,
            &with_csrf("text=Great+trip%21"),
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), format!("/posts/{}/", post.id));
    assert_eq!(app.state.comment_service.count_for_post(post.id).await.unwrap(), 1);

    // Blank comments are dropped but still redirect
    let blank = app
        .post_form(&format!("/posts/{}/comment/", post.id), &cookie, &with_csrf("text=+++"))
        .await;
    assert_eq!(blank.status, StatusCode::SEE_OTHER);
    assert_eq!(app.state.comment_service.count_for_post(post.id).await.unwrap(), 1);

    let detail = app.get(&format!("/posts/{}/", post.id), None).await;
    assert!(detail.body.contains("Great trip!"));
}

#[tokio::test]
async fn test_comment_on_hidden_post_is_404() {
    let app = setup().await;
    let author = app.user("author").await;
    let reader = app.user("reader").await;
    let draft = app.post(&author, "Draft", app.category_id, false, -Duration::hours(1)).await;
    let cookie = app.login(&reader).await;

    let response = app
        .post_form(&format!("/posts/{}/comment/", draft.id), &cookie, &with_csrf("text=hi"))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_only_author_can_edit_or_delete_comment() {
    let app = setup().await;
    let author = app.user("author").await;
    let intruder = app.user("intruder").await;
    let post = app.post(&author, "Discussed", app.category_id, true, -Duration::hours(1)).await;
    let comment = app
        .state
        .comment_service
        .add(post.id, author.id, "original words")
        .await
        .unwrap();
    let edit_uri = format!("/posts/{}/edit_comment/{}/", post.id, comment.id);
    let delete_uri = format!("/posts/{}/delete_comment/{}/", post.id, comment.id);
    let detail_uri = format!("/posts/{}/", post.id);

    let intruder_cookie = app.login(&intruder).await;
    let edit = app.post_form(&edit_uri, &intruder_cookie, &with_csrf("text=hacked")).await;
    assert_eq!(edit.status, StatusCode::SEE_OTHER);
    assert_eq!(edit.location(), detail_uri);
    let delete = app.post_form(&delete_uri, &intruder_cookie, &with_csrf("")).await;
    assert_eq!(delete.location(), detail_uri);
    let stored = app.state.comment_service.get_for_post(post.id, comment.id).await.unwrap();
    assert_eq!(stored.text, "original words");

    let author_cookie = app.login(&author).await;
    let form = app.get(&edit_uri, Some(&author_cookie)).await;
    assert_eq!(form.status, StatusCode::OK);
    assert!(form.body.contains("Edit comment"));

    let invalid = app.post_form(&edit_uri, &author_cookie, &with_csrf("text=")).await;
    assert_eq!(invalid.status, StatusCode::OK);
    assert!(invalid.body.contains("This field is required."));

    let edited = app.post_form(&edit_uri, &author_cookie, &with_csrf("text=better+words")).await;
    assert_eq!(edited.location(), detail_uri);
    let stored = app.state.comment_service.get_for_post(post.id, comment.id).await.unwrap();
    assert_eq!(stored.text, "better words");

    let confirm = app.get(&delete_uri, Some(&author_cookie)).await;
    assert!(confirm.body.contains("Delete comment"));
    app.post_form(&delete_uri, &author_cookie, &with_csrf("")).await;
    assert_eq!(app.state.comment_service.count_for_post(post.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_comment_of_another_post_is_404() {
    let app = setup().await;
    let author = app.user("author").await;
    let first = app.post(&author, "First", app.category_id, true, -Duration::hours(2)).await;
    let second = app.post(&author, "Second", app.category_id, true, -Duration::hours(1)).await;
    let comment = app.state.comment_service.add(first.id, author.id, "hi").await.unwrap();
    let cookie = app.login(&author).await;

    let response = app
        .get(&format!("/posts/{}/edit_comment/{}/", second.id, comment.id), Some(&cookie))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Post authoring
// ============================================================================

#[tokio::test]
async fn test_create_post_with_image() {
    let app = setup().await;
    let author = app.user("author").await;
    let cookie = app.login(&author).await;

    let form = app.get("/posts/create/", Some(&cookie)).await;
    assert_eq!(form.status, StatusCode::OK);
    assert!(form.body.contains("Travel"));

    let category = app.category_id.to_string();
    let body = multipart_body(
        &[
            ("csrfmiddlewaretoken", CSRF),
            ("title", "Sunrise"),
            ("text", "Early morning"),
            ("pub_date", "2024-05-01T06:00"),
            ("category", &category),
            ("location", ""),
            ("is_published", "on"),
        ],
        Some(("sun.png", "image/png", PNG_BYTES)),
    );
    let response = app.send(multipart_request("/posts/create/", &cookie, body)).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), "/profile/author/");

    let listing = app.state.post_service.list_by_author(author.id, true, None).await.unwrap();
    assert_eq!(listing.count, 1);
    let image = listing.items[0].post.image.clone().unwrap();
    assert!(image.starts_with("posts_images/"));
    assert!(app.state.config.media.path.join(&image).exists());

    let served = app.get(&format!("/media/{}", image), None).await;
    assert_eq!(served.status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_post_form_rerenders_with_errors() {
    let app = setup().await;
    let author = app.user("author").await;
    let cookie = app.login(&author).await;

    let body = multipart_body(
        &[
            ("csrfmiddlewaretoken", CSRF),
            ("title", ""),
            ("text", "Body"),
            ("pub_date", "not a date"),
            ("category", ""),
        ],
        None,
    );
    let response = app.send(multipart_request("/posts/create/", &cookie, body)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("This field is required."));
    assert!(response.body.contains("Enter a valid date"));
    assert_eq!(
        app.state.post_service.list_by_author(author.id, true, None).await.unwrap().count,
        0
    );
}

#[tokio::test]
async fn test_multipart_post_without_csrf_is_forbidden() {
    let app = setup().await;
    let author = app.user("author").await;
    let cookie = app.login(&author).await;
    let category = app.category_id.to_string();

    let body = multipart_body(
        &[
            ("title", "Sneaky"),
            ("text", "Body"),
            ("pub_date", "2024-05-01T06:00"),
            ("category", &category),
        ],
        None,
    );
    let response = app.send(multipart_request("/posts/create/", &cookie, body)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_multipart_delete_requests_are_forbidden() {
    let app = setup().await;
    let author = app.user("author").await;
    let cookie = app.login(&author).await;
    let post = app.post(&author, "Keep me", app.category_id, true, -Duration::hours(1)).await;
    let comment = app.state.comment_service.add(post.id, author.id, "still here").await.unwrap();

    // A forged token in a body the handler never reads, then no token at all
    let forged = multipart_body(&[("csrfmiddlewaretoken", "forgedforgedforged")], None);
    let response = app
        .send(multipart_request(
            &format!("/posts/{}/delete_comment/{}/", post.id, comment.id),
            &cookie,
            forged,
        ))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .send(multipart_request(
            &format!("/posts/{}/delete/", post.id),
            &cookie,
            multipart_body(&[], None),
        ))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let logout = app
        .send(multipart_request("/auth/logout/", &cookie, multipart_body(&[], None)))
        .await;
    assert_eq!(logout.status, StatusCode::FORBIDDEN);

    assert!(app.state.post_service.get(post.id).await.is_ok());
    assert_eq!(app.state.comment_service.count_for_post(post.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_uploaded_html_is_not_served_as_html() {
    let app = setup().await;
    let author = app.user("author").await;
    let cookie = app.login(&author).await;
    let category = app.category_id.to_string();

    let fields = [
        ("csrfmiddlewaretoken", CSRF),
        ("title", "Disguised"),
        ("text", "Body"),
        ("pub_date", "2024-05-01T06:00"),
        ("category", category.as_str()),
        ("is_published", "on"),
    ];

    // Script content declared as a PNG is refused
    let script = multipart_body(&fields, Some(("evil.html", "image/png", &b"<script>1</script>"[..])));
    let refused = app.send(multipart_request("/posts/create/", &cookie, script)).await;
    assert_eq!(refused.status, StatusCode::OK);
    assert!(refused.body.contains("not an image"));

    // A real image keeps its detected extension whatever the filename says
    let image = multipart_body(&fields, Some(("evil.html", "image/png", PNG_BYTES)));
    let created = app.send(multipart_request("/posts/create/", &cookie, image)).await;
    assert_eq!(created.status, StatusCode::SEE_OTHER);

    let listing = app.state.post_service.list_by_author(author.id, true, None).await.unwrap();
    let stored = listing.items[0].post.image.clone().unwrap();
    assert!(stored.ends_with(".png"), "stored as {}", stored);

    let served = app.get(&format!("/media/{}", stored), None).await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(
        served.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("image/png")
    );
}

#[tokio::test]
async fn test_only_author_can_edit_or_delete_post() {
    let app = setup().await;
    let author = app.user("author").await;
    let intruder = app.user("intruder").await;
    let post = app.post(&author, "Mine", app.category_id, true, -Duration::hours(1)).await;
    let detail_uri = format!("/posts/{}/", post.id);

    let intruder_cookie = app.login(&intruder).await;
    let edit_form = app.get(&format!("/posts/{}/edit/", post.id), Some(&intruder_cookie)).await;
    assert_eq!(edit_form.status, StatusCode::SEE_OTHER);
    assert_eq!(edit_form.location(), detail_uri);

    let category = app.category_id.to_string();
    let body = multipart_body(
        &[
            ("csrfmiddlewaretoken", CSRF),
            ("title", "Stolen"),
            ("text", "x"),
            ("pub_date", "2024-05-01T06:00"),
            ("category", &category),
        ],
        None,
    );
    let edit = app
        .send(multipart_request(&format!("/posts/{}/edit/", post.id), &intruder_cookie, body))
        .await;
    assert_eq!(edit.location(), detail_uri);

    let delete = app
        .post_form(&format!("/posts/{}/delete/", post.id), &intruder_cookie, &with_csrf(""))
        .await;
    assert_eq!(delete.location(), detail_uri);

    let unchanged = app.state.post_service.get(post.id).await.unwrap();
    assert_eq!(unchanged.title, "Mine");

    let author_cookie = app.login(&author).await;
    let confirm = app.get(&format!("/posts/{}/delete/", post.id), Some(&author_cookie)).await;
    assert_eq!(confirm.status, StatusCode::OK);
    assert!(confirm.body.contains("Delete post"));

    let deleted = app
        .post_form(&format!("/posts/{}/delete/", post.id), &author_cookie, &with_csrf(""))
        .await;
    assert_eq!(deleted.location(), "/profile/author/");
    assert!(app.state.post_service.get(post.id).await.is_err());
}

#[tokio::test]
async fn test_author_edits_post() {
    let app = setup().await;
    let author = app.user("author").await;
    let post = app.post(&author, "Before", app.category_id, true, -Duration::hours(1)).await;
    let cookie = app.login(&author).await;

    let form = app.get(&format!("/posts/{}/edit/", post.id), Some(&cookie)).await;
    assert_eq!(form.status, StatusCode::OK);
    assert!(form.body.contains("Before"));

    let category = app.category_id.to_string();
    let body = multipart_body(
        &[
            ("csrfmiddlewaretoken", CSRF),
            ("title", "After"),
            ("text", "New body"),
            ("pub_date", "2024-05-01 06:00"),
            ("category", &category),
            ("is_published", "on"),
        ],
        None,
    );
    let response = app
        .send(multipart_request(&format!("/posts/{}/edit/", post.id), &cookie, body))
        .await;
    assert_eq!(response.location(), format!("/posts/{}/", post.id));
    assert_eq!(app.state.post_service.get(post.id).await.unwrap().title, "After");
}

// ============================================================================
// Profiles
// ============================================================================

#[tokio::test]
async fn test_profile_owner_sees_hidden_posts() {
    let app = setup().await;
    let author = app.user("author").await;
    let reader = app.user("reader").await;
    app.post(&author, "Public entry", app.category_id, true, -Duration::hours(1)).await;
    app.post(&author, "Unpublished entry", app.category_id, false, -Duration::hours(1)).await;
    app.post(&author, "Scheduled entry", app.category_id, true, Duration::days(3)).await;

    let owner_cookie = app.login(&author).await;
    let own = app.get("/profile/author/", Some(&owner_cookie)).await;
    assert_eq!(own.status, StatusCode::OK);
    for title in ["Public entry", "Unpublished entry", "Scheduled entry"] {
        assert!(own.body.contains(title), "owner should see {}", title);
    }

    let reader_cookie = app.login(&reader).await;
    let other = app.get("/profile/author/", Some(&reader_cookie)).await;
    assert!(other.body.contains("Public entry"));
    assert!(!other.body.contains("Unpublished entry"));
    assert!(!other.body.contains("Scheduled entry"));

    assert_eq!(app.get("/profile/nobody/", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_edit_profile() {
    let app = setup().await;
    let author = app.user("author").await;
    app.user("taken").await;
    let cookie = app.login(&author).await;

    assert_eq!(app.get("/edit_profile/", Some(&cookie)).await.status, StatusCode::OK);

    let clash = app
        .post_form("/edit_profile/", &cookie, &with_csrf("username=taken&email=&first_name=&last_name="))
        .await;
    assert_eq!(clash.status, StatusCode::OK);
    assert!(clash.body.contains("A user with that username already exists."));

    let saved = app
        .post_form(
            "/edit_profile/",
            &cookie,
            &with_csrf("username=writer&email=w%40example.com&first_name=Anna&last_name=K"),
        )
        .await;
    assert_eq!(saved.status, StatusCode::SEE_OTHER);
    assert_eq!(saved.location(), "/profile/writer/");
    let updated = app.state.user_service.get_by_id(author.id).await.unwrap().unwrap();
    assert_eq!(updated.first_name, "Anna");
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_registration_then_login_and_logout() {
    let app = setup().await;
    let cookie = format!("csrftoken={}", CSRF);

    let mismatch = app
        .post_form(
            "/auth/registration/",
            &cookie,
            &with_csrf("username=newbie&password1=long-enough-1&password2=different-2"),
        )
        .await;
    assert_eq!(mismatch.status, StatusCode::OK);
    assert!(mismatch.body.contains("didn’t match"));

    let registered = app
        .post_form(
            "/auth/registration/",
            &cookie,
            &with_csrf("username=newbie&password1=long-enough-1&password2=long-enough-1"),
        )
        .await;
    assert_eq!(registered.status, StatusCode::SEE_OTHER);
    assert_eq!(registered.location(), "/auth/login/");

    let login = app
        .post_form(
            "/auth/login/",
            &cookie,
            &with_csrf("username=newbie&password=long-enough-1&next=%2Fpages%2Fabout%2F"),
        )
        .await;
    assert_eq!(login.status, StatusCode::SEE_OTHER);
    assert_eq!(login.location(), "/pages/about/");
    let set_cookie = login
        .headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("sessionid="));
    assert!(set_cookie.contains("HttpOnly"));
    let session_id = set_cookie
        .trim_start_matches("sessionid=")
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let session_cookie = format!("sessionid={}; csrftoken={}", session_id, CSRF);
    let home = app.get("/", Some(&session_cookie)).await;
    assert!(home.body.contains("newbie"));

    let logout = app.post_form("/auth/logout/", &session_cookie, &with_csrf("")).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert!(logout.body.contains("You have been logged out"));
    assert!(app.state.user_service.validate_session(&session_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_rejects_unsafe_next_and_bad_password() {
    let app = setup().await;
    let author = app.user("author").await;
    let cookie = format!("csrftoken={}", CSRF);

    let wrong = app
        .post_form("/auth/login/", &cookie, &with_csrf("username=author&password=nope"))
        .await;
    assert_eq!(wrong.status, StatusCode::OK);
    assert!(wrong.body.contains("Please enter a correct username and password."));

    let login = app
        .post_form(
            "/auth/login/",
            &cookie,
            &with_csrf(&format!(
                "username={}&password={}&next=https%3A%2F%2Fevil.example%2F",
                author.username, PASSWORD
            )),
        )
        .await;
    assert_eq!(login.location(), "/");
}

#[tokio::test]
async fn test_login_rate_limit_per_username() {
    let app = setup().await;
    let cookie = format!("csrftoken={}", CSRF);

    for _ in 0..5 {
        let response = app
            .post_form("/auth/login/", &cookie, &with_csrf("username=ghost&password=x"))
            .await;
        assert!(response.body.contains("Please enter a correct username"));
    }
    let limited = app
        .post_form("/auth/login/", &cookie, &with_csrf("username=ghost&password=x"))
        .await;
    assert!(limited.body.contains("Too many failed login attempts"));
}

#[tokio::test]
async fn test_password_change_ends_other_sessions() {
    let app = setup().await;
    let author = app.user("author").await;
    let cookie = app.login(&author).await;
    let other_cookie = app.login(&author).await;

    assert_eq!(app.get("/auth/password_change/", Some(&cookie)).await.status, StatusCode::OK);

    let response = app
        .post_form(
            "/auth/password_change/",
            &cookie,
            &with_csrf(&format!(
                "old_password={}&new_password1=brand-new-secret&new_password2=brand-new-secret",
                PASSWORD
            )),
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), "/auth/password_change/done/");

    // Still logged in here, logged out elsewhere
    assert_eq!(app.get("/auth/password_change/done/", Some(&cookie)).await.status, StatusCode::OK);
    assert_eq!(
        app.get("/auth/password_change/done/", Some(&other_cookie)).await.status,
        StatusCode::SEE_OTHER
    );
}
