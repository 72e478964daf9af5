//! Services layer - Business logic
//!
//! Services sit between the web handlers and the repositories:
//! - Validating submitted forms
//! - Applying visibility and ownership rules
//! - Coordinating repositories and uploaded files

pub mod category;
pub mod comment;
pub mod form;
pub mod location;
pub mod media;
pub mod password;
pub mod post;
pub mod rate_limiter;
pub mod user;

pub use category::{CategoryService, CategoryServiceError, CreateCategoryInput};
pub use comment::{CommentService, CommentServiceError};
pub use form::FormErrors;
pub use location::LocationService;
pub use media::{MediaStore, UploadedImage};
pub use password::{hash_password, verify_password};
pub use post::{FormChoices, PostFormInput, PostService, PostServiceError};
pub use rate_limiter::LoginRateLimiter;
pub use user::{
    LoginInput, PasswordChangeInput, ProfileInput, RegisterInput, UserService, UserServiceError,
};
