use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

pub mod health;
pub mod mcp_http;
pub mod profile;

/// Pull a bearer credential out of the Authorization header. Absence and a
/// non-bearer scheme both read as "no credential"; the tools decide whether
/// that is an error.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = raw.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_extracts_credential() {
        assert_eq!(
            bearer_token(&headers_with("Bearer abc123")).as_deref(),
            Some("abc123")
        );
        assert_eq!(
            bearer_token(&headers_with("bearer abc123")).as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn non_bearer_schemes_read_as_no_credential() {
        assert!(bearer_token(&headers_with("Basic abc123")).is_none());
        assert!(bearer_token(&headers_with("Bearer ")).is_none());
        assert!(bearer_token(&HeaderMap::new()).is_none());
    }
}
