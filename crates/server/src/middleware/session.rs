//! Session cookies.
//!
//! The session token travels in the configured session cookie. Moderators get
//! a second cookie naming their kind, which selects the session namespace.

use axum::http::{HeaderMap, HeaderValue, header};
use tower_sessions::cookie::{Cookie, SameSite, time::Duration};

use medico_core::ModeratorKind;

use crate::config::SessionConfig;
use crate::services::session::SessionToken;

/// Cookie naming the kind of a logged-in moderator.
pub const MODERATOR_TYPE_COOKIE: &str = "moderator_type";

fn build(config: &SessionConfig, name: &str, value: String, max_age: Duration) -> HeaderValue {
    let cookie = Cookie::build((name.to_owned(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(config.secure)
        .max_age(max_age)
        .build();

    // Names come from config and values are UUIDs or kind names, all ASCII.
    HeaderValue::from_str(&cookie.to_string()).unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn ttl(config: &SessionConfig) -> Duration {
    Duration::seconds(i64::try_from(config.ttl.as_secs()).unwrap_or(i64::MAX))
}

/// `Set-Cookie` values that start a session.
#[must_use]
pub fn login_cookies(
    config: &SessionConfig,
    token: SessionToken,
    moderator: Option<ModeratorKind>,
) -> Vec<HeaderValue> {
    let mut cookies = vec![build(config, &config.cookie_name, token.to_string(), ttl(config))];
    if let Some(kind) = moderator {
        cookies.push(build(
            config,
            MODERATOR_TYPE_COOKIE,
            kind.as_str().to_owned(),
            ttl(config),
        ));
    }
    cookies
}

/// `Set-Cookie` values that make the browser drop the session cookies.
#[must_use]
pub fn logout_cookies(config: &SessionConfig, moderator: bool) -> Vec<HeaderValue> {
    let mut cookies = vec![build(
        config,
        &config.cookie_name,
        String::new(),
        Duration::ZERO,
    )];
    if moderator {
        cookies.push(build(
            config,
            MODERATOR_TYPE_COOKIE,
            String::new(),
            Duration::ZERO,
        ));
    }
    cookies
}

/// Read a cookie value from request headers.
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig::default()
    }

    #[test]
    fn test_login_cookie_attributes() {
        let token = SessionToken::generate();
        let cookies = login_cookies(&config(), token, None);
        assert_eq!(cookies.len(), 1);

        let value = cookies[0].to_str().unwrap();
        assert!(value.starts_with(&format!("medico_session={token}")));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Strict"));
        assert!(value.contains("Path=/"));
        assert!(value.contains("Max-Age=3600"));
        assert!(!value.contains("Secure"));
    }

    #[test]
    fn test_moderator_gets_type_cookie() {
        let cookies = login_cookies(
            &config(),
            SessionToken::generate(),
            Some(ModeratorKind::Medicament),
        );
        assert_eq!(cookies.len(), 2);
        assert!(
            cookies[1]
                .to_str()
                .unwrap()
                .starts_with("moderator_type=medicament")
        );
    }

    #[test]
    fn test_secure_flag_follows_config() {
        let config = SessionConfig {
            secure: true,
            ..SessionConfig::default()
        };
        let cookies = login_cookies(&config, SessionToken::generate(), None);
        assert!(cookies[0].to_str().unwrap().contains("Secure"));
    }

    #[test]
    fn test_logout_cookies_expire_immediately() {
        let cookies = logout_cookies(&config(), true);
        assert_eq!(cookies.len(), 2);
        for cookie in cookies {
            assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
        }
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; medico_session=abc; moderator_type=doctor"),
        );

        assert_eq!(read_cookie(&headers, "medico_session").as_deref(), Some("abc"));
        assert_eq!(read_cookie(&headers, MODERATOR_TYPE_COOKIE).as_deref(), Some("doctor"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }
}
