use actix_web::cookie::{time::Duration, Cookie, SameSite};

use crate::configuration::{CookieSettings, SameSitePolicy};

pub const ACCESS_TOKEN_COOKIE: &str = "token";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Builds the session cookies.
///
/// Removal cookies carry exactly the attributes of the cookies they
/// replace; browsers ignore a removal whose attributes differ.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    settings: CookieSettings,
    access_max_age: i64,
    refresh_max_age: i64,
}

impl SessionCookies {
    /// Browsers drop `SameSite=None` cookies that are not `Secure`, so that
    /// pairing falls back to `Lax`.
    pub fn new(mut settings: CookieSettings, access_max_age: i64, refresh_max_age: i64) -> Self {
        if settings.same_site == SameSitePolicy::None && !settings.secure {
            tracing::warn!("cookie.same_site=none requires cookie.secure=true; using lax");
            settings.same_site = SameSitePolicy::Lax;
        }

        Self {
            settings,
            access_max_age,
            refresh_max_age,
        }
    }

    pub fn access(&self, token: &str) -> Cookie<'static> {
        self.build(ACCESS_TOKEN_COOKIE, token.to_string(), self.access_max_age)
    }

    pub fn refresh(&self, token: &str) -> Cookie<'static> {
        self.build(REFRESH_TOKEN_COOKIE, token.to_string(), self.refresh_max_age)
    }

    pub fn clear_access(&self) -> Cookie<'static> {
        self.removal(ACCESS_TOKEN_COOKIE)
    }

    pub fn clear_refresh(&self) -> Cookie<'static> {
        self.removal(REFRESH_TOKEN_COOKIE)
    }

    fn removal(&self, name: &'static str) -> Cookie<'static> {
        let mut cookie = self.build(name, String::new(), 0);
        cookie.make_removal();
        cookie
    }

    fn build(&self, name: &'static str, value: String, max_age_seconds: i64) -> Cookie<'static> {
        let mut builder = Cookie::build(name, value)
            .path("/")
            .http_only(true)
            .secure(self.settings.secure)
            .same_site(same_site(self.settings.same_site))
            .max_age(Duration::seconds(max_age_seconds));

        if let Some(domain) = &self.settings.domain {
            builder = builder.domain(domain.clone());
        }

        builder.finish()
    }
}

fn same_site(policy: SameSitePolicy) -> SameSite {
    match policy {
        SameSitePolicy::None => SameSite::None,
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::Strict => SameSite::Strict,
    }
}
