//! Template engine
//!
//! Page rendering with Tera:
//! - Default templates embedded in the binary
//! - Optional override directory, replacing templates file by file
//! - Standard template variables injected into every page
//! - Plain HTML fallback when even the error template fails

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

use crate::models::User;

mod error;

pub use error::ThemeError;

/// Templates shipped with the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct DefaultTemplates;

/// Template rendered for internal errors
pub const SERVER_ERROR_TEMPLATE: &str = "pages/500.html";

/// Tera-backed template engine
pub struct ThemeEngine {
    tera: Tera,
    /// Directory whose templates replace the embedded ones
    override_path: Option<PathBuf>,
}

impl ThemeEngine {
    /// Create the engine from the embedded templates, with `override_path`
    /// templates taking precedence by name
    pub fn new(override_path: Option<&Path>) -> Result<Self> {
        let override_path = override_path.map(Path::to_path_buf);
        let tera = Self::load_templates(override_path.as_deref())?;
        Ok(Self {
            tera,
            override_path,
        })
    }

    /// Re-read the override directory and rebuild the template set
    pub fn reload_templates(&mut self) -> Result<()> {
        self.tera = Self::load_templates(self.override_path.as_deref())?;
        Ok(())
    }

    fn load_templates(override_path: Option<&Path>) -> Result<Tera> {
        let mut templates: BTreeMap<String, String> = BTreeMap::new();

        for name in DefaultTemplates::iter() {
            let file = DefaultTemplates::get(&name)
                .ok_or_else(|| ThemeError::NotFound(name.to_string()))?;
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|_| ThemeError::InvalidEncoding(name.to_string()))?;
            templates.insert(name.to_string(), content);
        }

        if let Some(dir) = override_path {
            if dir.is_dir() {
                let mut overrides = Vec::new();
                collect_templates_from_dir(dir, dir, &mut overrides)?;
                for (name, content) in overrides {
                    tracing::debug!(template = %name, "Using template override");
                    templates.insert(name, content);
                }
            } else {
                tracing::warn!(path = ?dir, "Template override directory does not exist");
            }
        }

        let mut tera = Tera::default();
        // Added together so `extends` resolves regardless of order
        tera.add_raw_templates(templates.into_iter())
            .map_err(|e| ThemeError::TemplateError(format!("Failed to load templates: {}", error_chain(&e))))?;

        tracing::debug!(count = tera.get_template_names().count(), "Templates loaded");
        Ok(tera)
    }

    /// Whether a template with this name is registered
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(format!("Failed to render '{}': {}", template, error_chain(&e)))
                .into()
        })
    }

    /// Render a template with the standard page variables added
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        standard_vars.insert_into(&mut full_context);
        self.render(template, &full_context)
    }

    /// Render a template, falling back to the 500 template and then to a
    /// plain HTML page
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("Failed to render template '{}': {:#}", template, e);

                if template != SERVER_ERROR_TEMPLATE {
                    if let Ok(html) = self.render(SERVER_ERROR_TEMPLATE, context) {
                        return html;
                    }
                }
                simple_error_page()
            }
        }
    }

    pub fn tera(&self) -> &Tera {
        &self.tera
    }
}

/// Error message followed by its source chain
fn error_chain(e: &tera::Error) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        msg.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    msg
}

/// Collect `.html` files under `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path)? {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.push((template_name, content));
        }
    }
    Ok(())
}

/// Last-resort page when no template can be rendered
fn simple_error_page() -> String {
    r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Server Error</title>
</head>
<body>
    <h1>Server Error (500)</h1>
    <p>Something went wrong on our side. Please try again later.</p>
</body>
</html>"#
        .to_string()
}

/// Variables every page receives
#[derive(Debug, Clone, Serialize)]
pub struct StandardTemplateVars {
    pub site_name: String,
    /// Path of the current request, used for the login `next` link
    pub request_path: String,
    /// Current year (for the footer)
    pub year: i32,
    /// Logged-in user, `None` for anonymous visitors
    pub user: Option<User>,
    /// Value for the hidden `csrfmiddlewaretoken` field
    pub csrf_token: String,
}

impl StandardTemplateVars {
    pub fn new(site_name: impl Into<String>, request_path: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
            user: None,
            csrf_token: String::new(),
        }
    }

    pub fn with_user(mut self, user: Option<User>) -> Self {
        self.user = user;
        self
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = token.into();
        self
    }

    /// Add the variables to a render context
    pub fn insert_into(&self, context: &mut TeraContext) {
        context.insert("site_name", &self.site_name);
        context.insert("request_path", &self.request_path);
        context.insert("year", &self.year);
        context.insert("user", &self.user);
        context.insert("csrf_token", &self.csrf_token);
    }
}

#[cfg(test)]
mod tests;
