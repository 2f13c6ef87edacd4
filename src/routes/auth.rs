/// Authentication Routes
///
/// Registration, login, current user, refresh and logout. Tokens travel
/// in http-only cookies; registration additionally returns the access
/// token in the body.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{SessionManager, REFRESH_TOKEN_COOKIE};
use crate::domain::{NewUser, PublicUser};
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;

/// User registration request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: PublicUser,
    pub access_token: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub message: &'static str,
    pub user: PublicUser,
}

#[derive(Serialize)]
pub struct CurrentUserResponse {
    pub user: PublicUser,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// POST /api/auth/register
///
/// # Errors
/// - 400: missing or invalid field
/// - 409: email already registered
/// - 500: store or token failure
pub async fn register(
    form: web::Json<RegisterRequest>,
    session: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let new_user = NewUser::parse(
        form.first_name.as_deref(),
        form.last_name.as_deref(),
        form.email.as_deref(),
        form.password.as_deref(),
    )?;

    let issued = session.register(new_user).await?;

    Ok(HttpResponse::Ok()
        .cookie(session.cookies().refresh(&issued.refresh_token))
        .json(RegisterResponse {
            message: "Registration successful",
            user: issued.user.to_public(),
            access_token: issued.access_token,
        }))
}

/// POST /api/auth/login
///
/// # Errors
/// - 400: email or password missing
/// - 404: unknown email or wrong password (401 when uniform login errors
///   are configured)
/// - 500: store or token failure
pub async fn login(
    form: web::Json<LoginRequest>,
    session: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let issued = session
        .login(form.email.as_deref(), form.password.as_deref())
        .await?;

    Ok(HttpResponse::Ok()
        .cookie(session.cookies().refresh(&issued.refresh_token))
        .cookie(session.cookies().access(&issued.access_token))
        .json(SessionResponse {
            message: "Login successful",
            user: issued.user.to_public(),
        }))
}

/// GET /api/auth/me
///
/// Requires the access-token cookie; the user is attached by `AuthGuard`.
pub async fn get_current_user(user: web::ReqData<AuthenticatedUser>) -> HttpResponse {
    HttpResponse::Ok().json(CurrentUserResponse {
        user: user.to_public(),
    })
}

/// POST /api/auth/refresh
///
/// Rotates the refresh token from the `refreshToken` cookie and sets a new
/// cookie pair.
///
/// # Errors
/// - 401: missing, invalid, expired or revoked refresh token
pub async fn refresh(
    req: HttpRequest,
    session: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let token = req.cookie(REFRESH_TOKEN_COOKIE);
    let issued = session.refresh(token.as_ref().map(|c| c.value())).await?;

    Ok(HttpResponse::Ok()
        .cookie(session.cookies().refresh(&issued.refresh_token))
        .cookie(session.cookies().access(&issued.access_token))
        .json(SessionResponse {
            message: "Token refreshed",
            user: issued.user.to_public(),
        }))
}

/// POST /api/auth/logout
///
/// Revokes the refresh token from the cookie, if any, and clears both
/// cookies. Always 200.
pub async fn logout(req: HttpRequest, session: web::Data<SessionManager>) -> HttpResponse {
    let token = req.cookie(REFRESH_TOKEN_COOKIE);
    session.logout(token.as_ref().map(|c| c.value())).await;

    cleared(&session, "Logged out successfully")
}

/// POST /api/auth/logout-all
///
/// Revokes every refresh token of the current user.
pub async fn logout_all(
    user: web::ReqData<AuthenticatedUser>,
    session: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    session.logout_everywhere(&user).await?;

    Ok(cleared(&session, "Logged out from all devices"))
}

fn cleared(session: &SessionManager, message: &'static str) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(session.cookies().clear_access())
        .cookie(session.cookies().clear_refresh())
        .json(MessageResponse { message })
}
