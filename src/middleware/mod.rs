/// Middleware module
///
/// Custom middleware for authentication.

mod auth_guard;

pub use auth_guard::{AuthGuard, AuthenticatedUser};
