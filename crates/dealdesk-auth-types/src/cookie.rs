//! Session cookie builders.
//!
//! The cookie only carries the opaque session id; all session state lives server-side.
//! Services add the cookie to a signed jar so the id cannot be forged client-side.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie name for the session id.
pub const SESSION_COOKIE: &str = "dealdesk_session";

/// Session lifetime in seconds (7 days). Also used as the cookie Max-Age.
pub const SESSION_TTL_SECS: u64 = 604800;

/// Attributes applied to every session cookie.
#[derive(Debug, Clone, Default)]
pub struct CookieSettings {
    /// `Domain` attribute; host-only when `None`.
    pub domain: Option<String>,
    /// `Secure` attribute; on in production.
    pub secure: bool,
}

/// Build the session cookie for a freshly issued session.
///
/// ```
/// use dealdesk_auth_types::cookie::{CookieSettings, SESSION_COOKIE, session_cookie};
///
/// let settings = CookieSettings { domain: Some("example.com".to_string()), secure: true };
/// let cookie = session_cookie("sid".to_string(), &settings);
/// assert_eq!(cookie.name(), SESSION_COOKIE);
/// assert_eq!(cookie.path(), Some("/"));
/// assert_eq!(cookie.domain(), Some("example.com"));
/// assert_eq!(cookie.max_age(), Some(time::Duration::seconds(604800)));
/// assert!(cookie.http_only().unwrap_or(false));
/// assert!(cookie.secure().unwrap_or(false));
/// ```
pub fn session_cookie(session_id: String, settings: &CookieSettings) -> Cookie<'static> {
    build(session_id, Duration::seconds(SESSION_TTL_SECS as i64), settings)
}

/// Build an expired session cookie that makes the browser drop the session.
///
/// ```
/// use dealdesk_auth_types::cookie::{CookieSettings, cleared_session_cookie};
///
/// let cookie = cleared_session_cookie(&CookieSettings::default());
/// assert_eq!(cookie.value(), "");
/// assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
/// assert_eq!(cookie.domain(), None);
/// ```
pub fn cleared_session_cookie(settings: &CookieSettings) -> Cookie<'static> {
    build(String::new(), Duration::ZERO, settings)
}

fn build(value: String, max_age: Duration, settings: &CookieSettings) -> Cookie<'static> {
    let mut builder = Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .max_age(max_age)
        .http_only(true)
        .secure(settings.secure)
        .same_site(SameSite::Lax);
    if let Some(domain) = &settings.domain {
        builder = builder.domain(domain.clone());
    }
    builder.build()
}
