//! Data models
//!
//! Plain data carried between repositories, services and templates:
//! - Database entities (User, Session, Category, Location, Post, Comment)
//! - Joined read models used by listings (PostWithMeta, CommentWithMeta)
//! - Pagination types

mod category;
mod comment;
mod location;
mod pagination;
mod post;
mod session;
mod user;

pub use category::Category;
pub use comment::{Comment, CommentWithMeta};
pub use location::Location;
pub use pagination::{ListParams, PagedResult, Paginator};
pub use post::{CategoryRef, Post, PostWithMeta};
pub use session::Session;
pub use user::User;
