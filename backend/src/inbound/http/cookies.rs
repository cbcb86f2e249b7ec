//! Auth cookie construction.
//!
//! The access token cookie is sent on every request; the refresh token
//! cookie is scoped to the refresh endpoint so it never leaves the browser
//! otherwise.

use std::time::Duration;

use actix_web::cookie::{Cookie, SameSite, time};

use crate::domain::AuthPolicy;

/// Cookie carrying the signed access token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
/// Cookie carrying the opaque refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
/// Path the refresh cookie is limited to.
pub const REFRESH_COOKIE_PATH: &str = "/api/v1/auth/refresh";

/// Cookie attributes shared by the auth endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieSettings {
    /// Mark cookies `Secure`.
    pub secure: bool,
    /// Access cookie lifetime.
    pub access_max_age: Duration,
    /// Refresh cookie lifetime.
    pub refresh_max_age: Duration,
}

impl CookieSettings {
    /// Lifetimes taken from the token policy.
    pub fn from_policy(policy: &AuthPolicy, secure: bool) -> Self {
        Self {
            secure,
            access_max_age: policy.access_token_ttl,
            refresh_max_age: policy.refresh_token_ttl,
        }
    }

    /// `access_token` cookie: HttpOnly, `SameSite=Lax`, path `/`.
    pub fn access_cookie(&self, token: impl Into<String>) -> Cookie<'static> {
        Cookie::build(ACCESS_TOKEN_COOKIE, token.into())
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(max_age(self.access_max_age))
            .finish()
    }

    /// `refresh_token` cookie: HttpOnly, `SameSite=Strict`, refresh path only.
    pub fn refresh_cookie(&self, token: impl Into<String>) -> Cookie<'static> {
        Cookie::build(REFRESH_TOKEN_COOKIE, token.into())
            .path(REFRESH_COOKIE_PATH)
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(max_age(self.refresh_max_age))
            .finish()
    }

    /// Expired `access_token` cookie.
    pub fn clear_access(&self) -> Cookie<'static> {
        let mut cookie = self.access_cookie("");
        cookie.make_removal();
        cookie
    }

    /// Expired `refresh_token` cookie.
    pub fn clear_refresh(&self) -> Cookie<'static> {
        let mut cookie = self.refresh_cookie("");
        cookie.make_removal();
        cookie
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self::from_policy(&AuthPolicy::default(), true)
    }
}

fn max_age(lifetime: Duration) -> time::Duration {
    time::Duration::seconds(i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn access_cookie_matches_the_browser_contract() {
        let cookie = CookieSettings::default().access_cookie("jwt");
        assert_eq!(cookie.name(), ACCESS_TOKEN_COOKIE);
        assert_eq!(cookie.value(), "jwt");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(900)));
    }

    #[rstest]
    fn refresh_cookie_is_scoped_to_the_refresh_endpoint() {
        let cookie = CookieSettings::default().refresh_cookie("opaque");
        assert_eq!(cookie.path(), Some(REFRESH_COOKIE_PATH));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(604_800)));
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn secure_flag_follows_configuration(#[case] secure: bool) {
        let settings = CookieSettings::from_policy(&AuthPolicy::default(), secure);
        assert_eq!(settings.access_cookie("a").secure(), Some(secure));
        assert_eq!(settings.refresh_cookie("r").secure(), Some(secure));
    }

    #[rstest]
    fn cleared_cookies_are_empty_and_expired() {
        let settings = CookieSettings::default();
        for cookie in [settings.clear_access(), settings.clear_refresh()] {
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        }
        assert_eq!(settings.clear_refresh().path(), Some(REFRESH_COOKIE_PATH));
    }
}
