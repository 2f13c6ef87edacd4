/// Domain types
///
/// Validated value objects and the user entity shared by the store and
/// the session manager.

mod new_user;
mod user;

pub use new_user::{NewUser, Password, PersonName, UserEmail};
pub use user::{PasswordHash, PublicUser, RefreshTokenRecord, User, UserCredentials};
