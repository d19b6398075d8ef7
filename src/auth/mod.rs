//! Authentication: JWT issuance/validation, password hashing, extractors.

pub mod extract;
pub mod jwt;
pub mod password;

pub use extract::{AdminUser, CurrentUser};
pub use jwt::{Claims, JwtKeys};
