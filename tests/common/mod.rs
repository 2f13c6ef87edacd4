#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;

use actix_web::cookie::Cookie;
use showroom::auth::SessionManager;
use showroom::configuration::{
    ApplicationSettings, AuthSettings, CookieSettings, DatabaseSettings, JwtSettings,
    PasswordSettings, SameSitePolicy, Settings,
};
use showroom::startup::run;
use showroom::store::InMemoryCredentialStore;

pub const ACCESS_SECRET: &str = "integration-access-secret-0123456789";

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryCredentialStore>,
    pub client: reqwest::Client,
}

pub fn test_settings() -> Settings {
    Settings {
        database: DatabaseSettings {
            username: "postgres".to_string(),
            password: "password".to_string(),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "showroom".to_string(),
            max_connections: 1,
            connect_retries: 1,
            retry_delay_seconds: 0,
            acquire_timeout_seconds: 1,
            idle_timeout_seconds: 1,
        },
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        jwt: JwtSettings {
            access_secret: ACCESS_SECRET.to_string(),
            refresh_secret: "integration-refresh-secret-0123456789".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "showroom-test".to_string(),
        },
        cookie: CookieSettings {
            secure: true,
            same_site: SameSitePolicy::None,
            domain: None,
        },
        password: PasswordSettings { bcrypt_cost: 4 },
        auth: AuthSettings::default(),
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_settings()).await
}

pub async fn spawn_app_with(settings: Settings) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = Arc::new(InMemoryCredentialStore::new());
    let session = SessionManager::from_settings(&settings, store.clone())
        .expect("Failed to build session manager");
    let server = run(listener, session).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        client: reqwest::Client::new(),
    }
}

/// All `Set-Cookie` headers of a response, parsed.
pub fn set_cookies(response: &reqwest::Response) -> Vec<Cookie<'static>> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .map(|value| {
            Cookie::parse(value.to_str().expect("non-ascii cookie").to_string())
                .expect("Failed to parse Set-Cookie header")
        })
        .collect()
}

pub fn find_cookie(cookies: &[Cookie<'static>], name: &str) -> Option<Cookie<'static>> {
    cookies.iter().find(|cookie| cookie.name() == name).cloned()
}
