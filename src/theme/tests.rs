//! Tests for the template engine

use super::*;
use crate::models::{PagedResult, Paginator};
use chrono::Datelike;
use std::fs;
use tempfile::TempDir;
use tera::Context as TeraContext;

fn vars() -> StandardTemplateVars {
    StandardTemplateVars::new("Test Blog", "/").with_csrf_token("token123")
}

fn empty_page() -> PagedResult<serde_json::Value> {
    PagedResult::new(Vec::new(), 0, &Paginator::new(0, 10).get_page(None))
}

#[test]
fn test_embedded_templates_are_loaded() {
    let engine = ThemeEngine::new(None).unwrap();

    for name in [
        "base.html",
        "blog/index.html",
        "blog/detail.html",
        "blog/create.html",
        "blog/category.html",
        "blog/profile.html",
        "blog/user.html",
        "pages/about.html",
        "pages/rules.html",
        "pages/403csrf.html",
        "pages/404.html",
        "pages/500.html",
        "registration/login.html",
        "registration/logged_out.html",
        "registration/registration_form.html",
        "registration/password_change_form.html",
        "registration/password_change_done.html",
    ] {
        assert!(engine.has_template(name), "missing template {}", name);
    }
}

#[test]
fn test_standard_vars_are_injected() {
    let engine = ThemeEngine::new(None).unwrap();
    let html = engine
        .render_with_standard_vars("pages/about.html", &TeraContext::new(), &vars())
        .unwrap();

    assert!(html.contains("Test Blog"));
    assert!(html.contains(&chrono::Utc::now().year().to_string()));
    // Anonymous visitors get the login link
    assert!(html.contains("Log in"));
}

#[test]
fn test_logged_in_header_shows_username_and_token() {
    let engine = ThemeEngine::new(None).unwrap();
    let mut user = User::new("alice".to_string(), String::new(), "hash".to_string());
    user.id = 1;
    let vars = vars().with_user(Some(user));

    let html = engine
        .render_with_standard_vars("pages/rules.html", &TeraContext::new(), &vars)
        .unwrap();
    assert!(html.contains("alice"));
    assert!(html.contains("token123"));
    assert!(!html.contains("hash"));
}

#[test]
fn test_empty_listing_renders() {
    let engine = ThemeEngine::new(None).unwrap();
    let mut context = TeraContext::new();
    context.insert("page_obj", &empty_page());

    let html = engine
        .render_with_standard_vars("blog/index.html", &context, &vars())
        .unwrap();
    assert!(html.contains("No posts yet."));
}

#[test]
fn test_override_directory_replaces_templates_by_name() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("pages")).unwrap();
    fs::write(
        temp_dir.path().join("pages/about.html"),
        r#"{% extends "base.html" %}{% block content %}Custom about for {{ site_name }}{% endblock %}"#,
    )
    .unwrap();

    let engine = ThemeEngine::new(Some(temp_dir.path())).unwrap();
    let html = engine
        .render_with_standard_vars("pages/about.html", &TeraContext::new(), &vars())
        .unwrap();
    assert!(html.contains("Custom about for Test Blog"));

    // Untouched templates still come from the embedded set
    let rules = engine
        .render_with_standard_vars("pages/rules.html", &TeraContext::new(), &vars())
        .unwrap();
    assert!(rules.contains("Rules"));
}

#[test]
fn test_reload_picks_up_new_override() {
    let temp_dir = TempDir::new().unwrap();
    let mut engine = ThemeEngine::new(Some(temp_dir.path())).unwrap();
    assert!(!engine.has_template("pages/extra.html"));

    fs::create_dir_all(temp_dir.path().join("pages")).unwrap();
    fs::write(temp_dir.path().join("pages/extra.html"), "extra").unwrap();
    engine.reload_templates().unwrap();
    assert!(engine.has_template("pages/extra.html"));
}

#[test]
fn test_broken_override_fails_to_load() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("broken.html"), "{% if %}").unwrap();

    assert!(ThemeEngine::new(Some(temp_dir.path())).is_err());
}

#[test]
fn test_missing_template_is_an_error() {
    let engine = ThemeEngine::new(None).unwrap();
    let err = engine
        .render("nope.html", &TeraContext::new())
        .unwrap_err();
    assert!(err.to_string().contains("nope.html"));
}

#[test]
fn test_render_with_fallback_uses_server_error_page() {
    let engine = ThemeEngine::new(None).unwrap();
    let mut context = TeraContext::new();
    vars().insert_into(&mut context);

    // Missing `page_obj` makes the listing fail
    let html = engine.render_with_fallback("blog/index.html", &context);
    assert!(html.contains("Server error"));
}

#[test]
fn test_render_with_fallback_last_resort() {
    let engine = ThemeEngine::new(None).unwrap();
    // No standard vars: even the 500 template cannot render
    let html = engine.render_with_fallback("blog/index.html", &TeraContext::new());
    assert!(html.contains("Server Error (500)"));
}

#[test]
fn test_text_is_escaped() {
    let engine = ThemeEngine::new(None).unwrap();
    let tera = engine.tera();
    let mut context = TeraContext::new();
    context.insert("text", "<script>x</script>\nline");

    let html = Tera::one_off(
        "{{ text | escape | linebreaksbr | safe }}",
        &context,
        false,
    )
    .unwrap();
    assert!(html.contains("&lt;script&gt;"));
    assert!(html.contains("<br>"));
    assert!(tera.get_template_names().count() > 0);
}
