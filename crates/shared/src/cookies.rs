//! Parsing of `Cookie`-style header strings (`"a=1; b=2"`).

pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Returns the value of the first cookie named `name`, if present.
pub fn cookie_value(cookie_header: &str, name: &str) -> Option<String> {
    cookie_header
        .split(';')
        .map(str::trim)
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

pub fn csrf_token(cookie_header: &str) -> Option<String> {
    cookie_value(cookie_header, CSRF_COOKIE)
}
