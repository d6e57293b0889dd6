//! Small request-extraction helpers shared by the handlers.

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode, header};

use crate::error::ApiError;

/// Value of a cookie from the `Cookie` request header, if present.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in raw.split(';') {
        let Some((k, v)) = pair.split_once('=') else {
            continue;
        };
        if k.trim() == name {
            return Some(v.trim().to_string());
        }
    }
    None
}

/// Bearer token from the `Authorization` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    raw.strip_prefix("Bearer ").map(|t| t.trim().to_string())
}

/// Map a JSON extraction rejection onto the contract's status vocabulary:
/// 422 for well-formed-but-invalid data, 413 for oversized bodies, 400 for
/// everything else (including a missing content type).
pub fn map_json_rejection(rejection: JsonRejection) -> ApiError {
    let status = match &rejection {
        JsonRejection::JsonDataError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        _ => StatusCode::BAD_REQUEST,
    };
    ApiError::new(status, "invalid request body")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).expect("header value"));
        headers
    }

    #[test]
    fn test_cookie_value_parses_pairs() {
        let headers = headers_with(
            header::COOKIE,
            "refresh_token=rt-1; csrf_token=cs-2",
        );
        assert_eq!(
            cookie_value(&headers, "refresh_token").as_deref(),
            Some("rt-1")
        );
        assert_eq!(cookie_value(&headers, "csrf_token").as_deref(), Some("cs-2"));
        assert!(cookie_value(&headers, "session").is_none());
    }

    #[test]
    fn test_cookie_value_absent_header() {
        let headers = HeaderMap::new();
        assert!(cookie_value(&headers, "refresh_token").is_none());
    }

    #[test]
    fn test_bearer_token_requires_scheme() {
        let headers = headers_with(header::AUTHORIZATION, "Bearer at-123");
        assert_eq!(bearer_token(&headers).as_deref(), Some("at-123"));

        let headers = headers_with(header::AUTHORIZATION, "Basic dXNlcg==");
        assert!(bearer_token(&headers).is_none());
    }
}
