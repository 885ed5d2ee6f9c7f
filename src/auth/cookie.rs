use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::OffsetDateTime;

pub const SESSION_COOKIE: &str = "token";

fn base(value: String, expires: OffsetDateTime) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::None)
        .secure(true)
        .expires(expires)
        .build()
}

pub fn session_cookie(token: String, expires: OffsetDateTime) -> Cookie<'static> {
    base(token, expires)
}

/// Empty value, expired at the epoch so the browser drops it immediately.
pub fn cleared_cookie() -> Cookie<'static> {
    base(String::new(), OffsetDateTime::UNIX_EPOCH)
}

/// Session token from the jar, ignoring an empty (logged out) value.
pub fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value())
        .filter(|v| !v.is_empty())
}
