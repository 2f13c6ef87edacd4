use actix_web::dev::Server;
use actix_web::{error, web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::SessionManager;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::AuthGuard;
use crate::routes::{get_current_user, health_check, login, logout, logout_all, refresh, register};

pub fn run(listener: TcpListener, session: SessionManager) -> Result<Server, std::io::Error> {
    let session = web::Data::new(session);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(session.clone())
            .app_data(json_config())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/auth")
                    // Public routes
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))
                    // Protected routes
                    .service(
                        web::resource("/me")
                            .wrap(AuthGuard::new(session.clone()))
                            .route(web::get().to(get_current_user)),
                    )
                    .service(
                        web::resource("/logout-all")
                            .wrap(AuthGuard::new(session.clone()))
                            .route(web::post().to(logout_all)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Malformed JSON bodies get the same error shape as every other failure.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        error::Error::from(AppError::Validation(ValidationError::MalformedBody(message)))
    })
}
