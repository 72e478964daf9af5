//! Rate limiter for login attempts
//!
//! Two sliding windows guard the login form:
//! - failed attempts per username (5 per 15 minutes)
//! - login requests per client IP (20 per minute)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::RwLock;

const USERNAME_LIMIT: usize = 5;
const USERNAME_WINDOW_MINUTES: i64 = 15;
const IP_LIMIT: usize = 20;
const IP_WINDOW_MINUTES: i64 = 1;

/// Login rate limiter
pub struct LoginRateLimiter {
    /// Failed login attempts by lowercased username
    username_attempts: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
    /// Login requests by IP address
    ip_attempts: RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            username_attempts: RwLock::new(HashMap::new()),
            ip_attempts: RwLock::new(HashMap::new()),
        }
    }

    /// Check if a username has too many recent failures
    pub async fn is_username_limited(&self, username: &str) -> bool {
        let cutoff = Utc::now() - Duration::minutes(USERNAME_WINDOW_MINUTES);
        let mut attempts = self.username_attempts.write().await;
        match attempts.get_mut(&username.to_lowercase()) {
            Some(times) => {
                times.retain(|time| *time > cutoff);
                times.len() >= USERNAME_LIMIT
            }
            None => false,
        }
    }

    /// Record a failed login attempt for username
    pub async fn record_failed_attempt(&self, username: &str) {
        let mut attempts = self.username_attempts.write().await;
        attempts
            .entry(username.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures for username after a successful login
    pub async fn clear_username_attempts(&self, username: &str) {
        let mut attempts = self.username_attempts.write().await;
        attempts.remove(&username.to_lowercase());
    }

    /// Check if an IP has sent too many login requests
    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        let cutoff = Utc::now() - Duration::minutes(IP_WINDOW_MINUTES);
        let mut attempts = self.ip_attempts.write().await;
        match attempts.get_mut(&ip) {
            Some(times) => {
                times.retain(|time| *time > cutoff);
                times.len() >= IP_LIMIT
            }
            None => false,
        }
    }

    /// Record a login request from IP
    pub async fn record_ip_request(&self, ip: IpAddr) {
        let mut attempts = self.ip_attempts.write().await;
        attempts.entry(ip).or_default().push(Utc::now());
    }

    /// Drop expired entries; returns how many keys were removed
    pub async fn cleanup(&self) -> usize {
        let now = Utc::now();
        let username_cutoff = now - Duration::minutes(USERNAME_WINDOW_MINUTES);
        let ip_cutoff = now - Duration::minutes(IP_WINDOW_MINUTES);
        let mut removed = 0;

        {
            let mut attempts = self.username_attempts.write().await;
            let before = attempts.len();
            attempts.retain(|_, times| {
                times.retain(|time| *time > username_cutoff);
                !times.is_empty()
            });
            removed += before - attempts.len();
        }

        {
            let mut attempts = self.ip_attempts.write().await;
            let before = attempts.len();
            attempts.retain(|_, times| {
                times.retain(|time| *time > ip_cutoff);
                !times.is_empty()
            });
            removed += before - attempts.len();
        }

        removed
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
