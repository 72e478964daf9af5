//! Configuration management
//!
//! Configuration is read from `config.yml` and may be overridden with
//! `BLOGICUM_*` environment variables. Every missing value falls back to a
//! default, so an absent file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Template override configuration
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// Uploaded media configuration
    #[serde(default)]
    pub media: MediaConfig,
    /// Blog presentation settings
    #[serde(default)]
    pub blog: BlogConfig,
    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/blogicum.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Template configuration
///
/// Templates are compiled into the binary. When `path` is set, any `.html`
/// file found under it replaces the built-in template with the same name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatesConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Media (uploaded images) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory uploaded files are written to and served from
    #[serde(default = "default_media_path")]
    pub path: PathBuf,
    /// Maximum image size in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            path: default_media_path(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_media_path() -> PathBuf {
    PathBuf::from("media")
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

impl MediaConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            _ => "bin",
        }
    }
}

/// Blog presentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogConfig {
    /// Site title shown in the header
    #[serde(default = "default_site_name")]
    pub site_name: String,
    /// Posts per listing page
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u32,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            site_name: default_site_name(),
            posts_per_page: default_posts_per_page(),
        }
    }
}

fn default_site_name() -> String {
    "Blogicum".to_string()
}

fn default_posts_per_page() -> u32 {
    10
}

/// Authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
        }
    }
}

fn default_session_days() -> i64 {
    14
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration. A file that
    /// exists but is not valid YAML for this structure is an error.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Recognised variables:
    /// - BLOGICUM_SERVER_HOST
    /// - BLOGICUM_SERVER_PORT
    /// - BLOGICUM_DATABASE_DRIVER
    /// - BLOGICUM_DATABASE_URL
    /// - BLOGICUM_TEMPLATES_PATH
    /// - BLOGICUM_MEDIA_PATH
    /// - BLOGICUM_BLOG_SITE_NAME
    /// - BLOGICUM_BLOG_POSTS_PER_PAGE
    /// - BLOGICUM_AUTH_SESSION_DAYS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the application cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url must not be empty".to_string(),
            ));
        }
        if self.blog.posts_per_page == 0 {
            return Err(ConfigError::ValidationError(
                "blog.posts_per_page must be at least 1".to_string(),
            ));
        }
        if self.auth.session_days <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.session_days must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("BLOGICUM_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("BLOGICUM_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(driver) = std::env::var("BLOGICUM_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("BLOGICUM_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(path) = std::env::var("BLOGICUM_TEMPLATES_PATH") {
            self.templates.path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("BLOGICUM_MEDIA_PATH") {
            self.media.path = PathBuf::from(path);
        }

        if let Ok(name) = std::env::var("BLOGICUM_BLOG_SITE_NAME") {
            self.blog.site_name = name;
        }
        if let Ok(per_page) = std::env::var("BLOGICUM_BLOG_POSTS_PER_PAGE") {
            if let Ok(per_page) = per_page.parse::<u32>() {
                self.blog.posts_per_page = per_page;
            }
        }
        if let Ok(days) = std::env::var("BLOGICUM_AUTH_SESSION_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.auth.session_days = days;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Tests touching process environment share this lock.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
