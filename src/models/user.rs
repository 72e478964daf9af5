//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account. Posts and comments reference users by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    /// Login name, unique
    pub username: String,
    /// Contact address, may be empty
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new User.
    ///
    /// The password must already be hashed with
    /// `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            first_name: String::new(),
            last_name: String::new(),
            password_hash,
            created_at: Utc::now(),
        }
    }

    /// "First Last", or the username when no name is set
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    /// Check if this user wrote the content with `author_id`
    pub fn is_author_of(&self, author_id: i64) -> bool {
        self.id == author_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_username() {
        let mut user = User::new("leo".to_string(), String::new(), "hash".to_string());
        assert_eq!(user.display_name(), "leo");

        user.first_name = "Leo".to_string();
        assert_eq!(user.display_name(), "Leo");

        user.last_name = "Tolstoy".to_string();
        assert_eq!(user.display_name(), "Leo Tolstoy");
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User::new("leo".to_string(), String::new(), "secret-hash".to_string());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"username\":\"leo\""));
    }

    #[test]
    fn test_is_author_of() {
        let mut user = User::new("leo".to_string(), String::new(), "hash".to_string());
        user.id = 7;
        assert!(user.is_author_of(7));
        assert!(!user.is_author_of(8));
    }
}
