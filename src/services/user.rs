//! User service
//!
//! Accounts and login sessions:
//! - Registration with username and password rules
//! - Login/logout backed by server-side sessions
//! - Session validation for the `sessionid` cookie
//! - Password change and profile editing

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User};
use crate::services::form::{FormErrors, NON_FIELD_ERRORS};
use crate::services::password::{hash_password, password_problems, verify_password};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

/// Default session lifetime in days
const DEFAULT_SESSION_DAYS: i64 = 14;

/// Longest accepted username, first name or last name
pub const MAX_NAME_LENGTH: usize = 150;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Submitted form did not validate
    #[error("Validation error: {0}")]
    Validation(FormErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Sign-up form
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

impl RegisterInput {
    /// Registration with a password typed twice the same way
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        let password = password.into();
        Self {
            username: username.into(),
            email: email.into(),
            password1: password.clone(),
            password2: password,
        }
    }
}

/// Login form
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Password change form
#[derive(Debug, Clone, Default)]
pub struct PasswordChangeInput {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

/// Profile edit form
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ProfileInput {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for ProfileInput {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_days(user_repo, session_repo, DEFAULT_SESSION_DAYS)
    }

    /// Create a user service with a custom session lifetime
    pub fn with_session_days(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_days,
        }
    }

    /// Session lifetime in days, used for the cookie Max-Age
    pub fn session_days(&self) -> i64 {
        self.session_days
    }

    /// Register a new user
    ///
    /// # Errors
    ///
    /// - `Validation` with per-field messages when the username is taken or
    ///   malformed, or the passwords are missing, differ or are too weak
    /// - `InternalError` for database errors
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let mut errors = FormErrors::new();
        let username = input.username.trim().to_string();

        for message in username_problems(&username) {
            errors.add("username", message);
        }
        if !errors.has("username") && self.username_taken(&username, None).await? {
            errors.add("username", "A user with that username already exists.");
        }

        let email = input.email.trim().to_string();
        if !email.is_empty() && !email.contains('@') {
            errors.add("email", "Enter a valid email address.");
        }

        if input.password1.is_empty() {
            errors.add("password1", "This field is required.");
        }
        if input.password2.is_empty() {
            errors.add("password2", "This field is required.");
        } else if input.password1 != input.password2 {
            errors.add("password2", "The two password fields didn’t match.");
        } else {
            for message in password_problems(&input.password2) {
                errors.add("password2", message);
            }
        }

        if !errors.is_empty() {
            return Err(UserServiceError::Validation(errors));
        }

        let password_hash = hash_password(&input.password1).context("Failed to hash password")?;
        let user = self
            .user_repo
            .create(&User::new(username, email, password_hash))
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Login with credentials, opening a new session
    ///
    /// Unknown usernames and wrong passwords produce the same error.
    pub async fn login(&self, input: LoginInput) -> Result<(User, Session), UserServiceError> {
        let invalid = || {
            UserServiceError::AuthenticationError(
                "Please enter a correct username and password. Note that both fields may be case-sensitive."
                    .to_string(),
            )
        };

        let user = self
            .user_repo
            .get_by_username(input.username.trim())
            .await
            .context("Failed to get user by username")?
            .ok_or_else(invalid)?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            return Err(invalid());
        }

        let session = self.create_session(user.id).await?;
        Ok((user, session))
    }

    /// Logout (invalidate session)
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown and expired tokens yield `None`; expired ones are removed.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?)
    }

    /// Change the password of `user` and end their other sessions
    pub async fn change_password(
        &self,
        user: &User,
        current_session: &str,
        input: PasswordChangeInput,
    ) -> Result<(), UserServiceError> {
        let mut errors = FormErrors::new();

        let old_ok = verify_password(&input.old_password, &user.password_hash)
            .context("Failed to verify password")?;
        if !old_ok {
            errors.add(
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            );
        }

        if input.new_password1.is_empty() {
            errors.add("new_password1", "This field is required.");
        }
        if input.new_password2.is_empty() {
            errors.add("new_password2", "This field is required.");
        } else if input.new_password1 != input.new_password2 {
            errors.add("new_password2", "The two password fields didn’t match.");
        } else {
            for message in password_problems(&input.new_password2) {
                errors.add("new_password2", message);
            }
        }

        if !errors.is_empty() {
            return Err(UserServiceError::Validation(errors));
        }

        let hash = hash_password(&input.new_password1).context("Failed to hash password")?;
        self.user_repo
            .update_password(user.id, &hash)
            .await
            .context("Failed to update password")?;
        let dropped = self
            .session_repo
            .delete_others(user.id, current_session)
            .await
            .context("Failed to end other sessions")?;

        tracing::info!(user_id = user.id, dropped_sessions = dropped, "Password changed");
        Ok(())
    }

    /// Update names, email and username of `user`
    pub async fn update_profile(
        &self,
        user: &User,
        input: ProfileInput,
    ) -> Result<User, UserServiceError> {
        let mut errors = FormErrors::new();
        let username = input.username.trim().to_string();

        for message in username_problems(&username) {
            errors.add("username", message);
        }
        if !errors.has("username") && self.username_taken(&username, Some(user.id)).await? {
            errors.add("username", "A user with that username already exists.");
        }

        let email = input.email.trim().to_string();
        if !email.is_empty() && !email.contains('@') {
            errors.add("email", "Enter a valid email address.");
        }
        for (field, value) in [("first_name", &input.first_name), ("last_name", &input.last_name)] {
            if value.trim().chars().count() > MAX_NAME_LENGTH {
                errors.add(
                    field,
                    format!("Ensure this value has at most {} characters.", MAX_NAME_LENGTH),
                );
            }
        }

        if !errors.is_empty() {
            return Err(UserServiceError::Validation(errors));
        }

        let mut updated = user.clone();
        updated.username = username;
        updated.email = email;
        updated.first_name = input.first_name.trim().to_string();
        updated.last_name = input.last_name.trim().to_string();

        Ok(self
            .user_repo
            .update_profile(&updated)
            .await
            .context("Failed to update profile")?)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn username_taken(
        &self,
        username: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, UserServiceError> {
        let existing = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?;
        Ok(existing.is_some_and(|u| Some(u.id) != exclude_id))
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let session = Session::new(Uuid::new_v4().to_string(), user_id, self.session_days);
        Ok(self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?)
    }
}

/// Messages for a username that breaks the length or character rules
pub fn username_problems(username: &str) -> Vec<String> {
    if username.is_empty() {
        return vec!["This field is required.".to_string()];
    }
    let mut problems = Vec::new();
    if username.chars().count() > MAX_NAME_LENGTH {
        problems.push(format!(
            "Ensure this value has at most {} characters.",
            MAX_NAME_LENGTH
        ));
    }
    if !USERNAME_RE.is_match(username) {
        problems.push(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        );
    }
    problems
}

/// Message shown above a form when the whole submission was rejected
pub fn non_field_error(message: impl Into<String>) -> FormErrors {
    FormErrors::single(NON_FIELD_ERRORS, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
    }

    fn validation(result: Result<User, UserServiceError>) -> FormErrors {
        match result {
            Err(UserServiceError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other.map(|u| u.username)),
        }
    }

    // ========================================================================
    // Registration tests
    // ========================================================================

    #[tokio::test]
    async fn test_register_and_login() {
        let service = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("reader", "", "s3cret-pass"))
            .await
            .expect("Failed to register");
        assert_eq!(user.username, "reader");
        assert!(user.password_hash.starts_with("$argon2id$"));

        let (logged_in, session) = service
            .login(LoginInput::new("reader", "s3cret-pass"))
            .await
            .expect("Failed to login");
        assert_eq!(logged_in.id, user.id);
        assert!(!session.is_expired());

        let resolved = service.validate_session(&session.id).await.unwrap();
        assert_eq!(resolved.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_register_duplicate_username_fails() {
        let service = setup_test_service().await;
        service
            .register(RegisterInput::new("reader", "", "s3cret-pass"))
            .await
            .unwrap();

        let errors = validation(
            service
                .register(RegisterInput::new("reader", "", "other-pass-1"))
                .await,
        );
        assert!(errors.has("username"));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_username_characters() {
        let service = setup_test_service().await;
        let errors = validation(
            service
                .register(RegisterInput::new("bad name!", "", "s3cret-pass"))
                .await,
        );
        assert!(errors.has("username"));
    }

    #[tokio::test]
    async fn test_register_password_rules() {
        let service = setup_test_service().await;

        let mut input = RegisterInput::new("reader", "", "s3cret-pass");
        input.password2 = "different-pass".to_string();
        assert!(validation(service.register(input).await).has("password2"));

        let errors = validation(
            service
                .register(RegisterInput::new("reader", "", "12345678"))
                .await,
        );
        assert!(errors.has("password2"));

        let errors = validation(service.register(RegisterInput::new("reader", "", "short")).await);
        assert!(errors.has("password2"));
    }

    // ========================================================================
    // Login and session tests
    // ========================================================================

    #[tokio::test]
    async fn test_login_failures_share_one_message() {
        let service = setup_test_service().await;
        service
            .register(RegisterInput::new("reader", "", "s3cret-pass"))
            .await
            .unwrap();

        let wrong_password = service.login(LoginInput::new("reader", "nope-nope")).await;
        let unknown_user = service.login(LoginInput::new("ghost", "s3cret-pass")).await;
        match (wrong_password, unknown_user) {
            (
                Err(UserServiceError::AuthenticationError(a)),
                Err(UserServiceError::AuthenticationError(b)),
            ) => assert_eq!(a, b),
            _ => panic!("both logins should fail with AuthenticationError"),
        }
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let service = setup_test_service().await;
        service
            .register(RegisterInput::new("reader", "", "s3cret-pass"))
            .await
            .unwrap();
        let (_, session) = service
            .login(LoginInput::new("reader", "s3cret-pass"))
            .await
            .unwrap();

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert!(service.validate_session("made-up").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_password_ends_other_sessions() {
        let service = setup_test_service().await;
        service
            .register(RegisterInput::new("reader", "", "s3cret-pass"))
            .await
            .unwrap();
        let (user, current) = service
            .login(LoginInput::new("reader", "s3cret-pass"))
            .await
            .unwrap();
        let (_, other) = service
            .login(LoginInput::new("reader", "s3cret-pass"))
            .await
            .unwrap();

        let bad = service
            .change_password(
                &user,
                &current.id,
                PasswordChangeInput {
                    old_password: "wrong".to_string(),
                    new_password1: "brand-new-pass".to_string(),
                    new_password2: "brand-new-pass".to_string(),
                },
            )
            .await;
        assert!(matches!(bad, Err(UserServiceError::Validation(ref e)) if e.has("old_password")));

        service
            .change_password(
                &user,
                &current.id,
                PasswordChangeInput {
                    old_password: "s3cret-pass".to_string(),
                    new_password1: "brand-new-pass".to_string(),
                    new_password2: "brand-new-pass".to_string(),
                },
            )
            .await
            .expect("Failed to change password");

        assert!(service.validate_session(&current.id).await.unwrap().is_some());
        assert!(service.validate_session(&other.id).await.unwrap().is_none());
        assert!(service
            .login(LoginInput::new("reader", "brand-new-pass"))
            .await
            .is_ok());
    }

    // ========================================================================
    // Profile tests
    // ========================================================================

    #[tokio::test]
    async fn test_update_profile() {
        let service = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("reader", "", "s3cret-pass"))
            .await
            .unwrap();
        service
            .register(RegisterInput::new("writer", "", "s3cret-pass"))
            .await
            .unwrap();

        let mut input = ProfileInput::from(&user);
        input.username = "writer".to_string();
        assert!(matches!(
            service.update_profile(&user, input).await,
            Err(UserServiceError::Validation(ref e)) if e.has("username")
        ));

        let mut input = ProfileInput::from(&user);
        input.first_name = "Anna".to_string();
        input.email = "anna@example.com".to_string();
        let updated = service.update_profile(&user, input).await.unwrap();
        assert_eq!(updated.first_name, "Anna");
        assert_eq!(updated.username, "reader");
    }

    #[test]
    fn test_username_problems() {
        assert!(username_problems("leo.tolstoy+1@ya-ru_").is_empty());
        assert_eq!(username_problems("").len(), 1);
        assert_eq!(username_problems("with space").len(), 1);
        assert_eq!(username_problems(&"a".repeat(151)).len(), 1);
    }
}
