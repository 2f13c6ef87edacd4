/// Authentication module
///
/// Password hashing, JWT issuing/verification, session cookies and the
/// session manager that ties them to the credential store.

mod claims;
mod cookies;
mod jwt;
mod password;
mod session;

pub use claims::Claims;
pub use cookies::{SessionCookies, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
pub use jwt::{TokenKind, TokenService};
pub use password::PasswordHasher;
pub use session::{IssuedSession, SessionManager};
