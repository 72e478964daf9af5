//! Blogicum - a small multi-author blog
//!
//! Registered users publish posts into categories, attach an optional
//! location and image, and comment on each other's posts. Pages are
//! rendered on the server from Tera templates.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
pub mod web;
