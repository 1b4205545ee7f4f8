use portico_core::{utils, ApiRequest};
use portico_session::SessionStore;
use tracing::trace;

/// Stamp `request` with the session's current access token.
///
/// Leaves the headers untouched when the session holds no token, or when the
/// token cannot be encoded as a header value; the API then rejects the call and
/// the normal 401 path takes over. Returns the token that was attached.
pub fn attach_credentials(session: &SessionStore, request: &mut ApiRequest) -> Option<String> {
    let token = session.access_token()?;
    if utils::set_bearer_token(request.headers_mut(), &token) {
        trace!(path = request.path(), "Attached bearer token");
        Some(token)
    } else {
        trace!(path = request.path(), "Access token is not a valid header value");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderValue, AUTHORIZATION};
    use portico_core::{Identity, TokenGrant};

    #[tokio::test]
    async fn test_attaches_current_token() {
        let session = SessionStore::in_memory();
        session
            .login(TokenGrant::bearer("T1"), Identity::new("u1"))
            .await
            .unwrap();

        let mut request = ApiRequest::get("/modules");
        assert_eq!(attach_credentials(&session, &mut request).as_deref(), Some("T1"));
        assert_eq!(request.bearer_token(), Some("T1"));
    }

    #[test]
    fn test_without_session_headers_are_unchanged() {
        let session = SessionStore::in_memory();
        let mut request = ApiRequest::get("/modules")
            .header(AUTHORIZATION, HeaderValue::from_static("Basic abc"));

        assert_eq!(attach_credentials(&session, &mut request), None);
        assert_eq!(request.headers()[AUTHORIZATION], "Basic abc");
    }

    #[tokio::test]
    async fn test_unencodable_token_is_skipped() {
        let session = SessionStore::in_memory();
        session
            .login(TokenGrant::bearer("bad\r\ntoken"), Identity::new("u1"))
            .await
            .unwrap();

        let mut request = ApiRequest::get("/modules");
        assert_eq!(attach_credentials(&session, &mut request), None);
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }
}
