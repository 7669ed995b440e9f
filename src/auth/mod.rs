pub mod attribution;
mod claims;
pub mod jwt;

pub use jwt::{AuthUser, MaybeAuthUser};
