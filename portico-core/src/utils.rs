use http::header::{HeaderMap, HeaderValue, AUTHORIZATION};

/// Extract the Bearer token from the Authorization header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|s| s.trim())
}

/// Build an `Authorization: Bearer <token>` header value.
///
/// Returns `None` when the token contains bytes that are not valid in a header.
pub fn bearer_header_value(token: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).ok()?;
    value.set_sensitive(true);
    Some(value)
}

/// Set the Authorization header to the given bearer token.
///
/// Returns whether the header was set.
pub fn set_bearer_token(headers: &mut HeaderMap, token: &str) -> bool {
    match bearer_header_value(token) {
        Some(value) => {
            headers.insert(AUTHORIZATION, value);
            true
        }
        None => false,
    }
}
