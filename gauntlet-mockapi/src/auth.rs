//! Session endpoints: login, refresh, logout.
//!
//! Contract highlights:
//! - Login is create-or-login and idempotent for identical credentials.
//! - The refresh cookie is `HttpOnly; SameSite=Lax`, the CSRF cookie
//!   `SameSite=Strict`; both use `Path=/`.
//! - A refresh-cookie-bearing request must echo its CSRF token in the
//!   `X-CSRF-Token` header, else 403.
//! - Refresh tokens rotate: each is consumable exactly once, so duplicate
//!   concurrent refreshes yield one 200 and otherwise 401.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::ApiError;
use crate::extract::{bearer_token, cookie_value, map_json_rejection};
use crate::state::AppState;

/// Cookie names, fixed by the external contract.
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => return map_json_rejection(rejection).into_response(),
    };

    if request.username.trim().is_empty() || request.password.is_empty() {
        return ApiError::unprocessable("username and password are required").into_response();
    }

    let mut stores = state.stores.lock().await;

    if let Err(retry_after) = stores.check_login_rate(
        &request.username,
        state.config.login_rate_limit,
        state.config.rate_window,
    ) {
        return ApiError::rate_limited(retry_after).into_response();
    }

    let user_id = match stores.login(&request.username, &request.password) {
        Ok(user_id) => user_id,
        Err(()) => {
            return ApiError::unauthorized(state.detail(
                "invalid credentials",
                "invalid credentials: OperationalError in /app/auth/service.py",
            ))
            .into_response();
        }
    };

    let (access, refresh, csrf) = stores.open_session(&request.username, user_id);
    drop(stores);

    debug!(user_id, "session opened");
    let body = Json(json!({ "access_token": access, "user_id": user_id }));
    with_session_cookies((StatusCode::OK, body).into_response(), &refresh, &csrf)
}

/// `POST /auth/refresh`
pub async fn refresh(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(refresh_token) = cookie_value(&headers, REFRESH_COOKIE) else {
        return ApiError::unauthorized("missing refresh token").into_response();
    };

    let csrf_header = headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut stores = state.stores.lock().await;

    // CSRF is validated against the record bound to this refresh token, so
    // a cookie for user A plus a token for user B never passes.
    match stores.refresh_record(&refresh_token) {
        None => {
            return ApiError::unauthorized("invalid refresh token").into_response();
        }
        Some(record) => {
            if csrf_header.as_deref() != Some(record.csrf.as_str()) {
                return ApiError::forbidden("missing or mismatched CSRF token").into_response();
            }
        }
    }

    let Some(record) = stores.consume_refresh(&refresh_token) else {
        return ApiError::unauthorized("invalid refresh token").into_response();
    };

    let (access, new_refresh, new_csrf) = stores.open_session(&record.username, record.user_id);
    drop(stores);

    let body = Json(json!({ "access_token": access, "user_id": record.user_id }));
    with_session_cookies(
        (StatusCode::OK, body).into_response(),
        &new_refresh,
        &new_csrf,
    )
}

/// `POST /auth/logout`
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return ApiError::unauthorized("missing bearer token").into_response();
    };

    let mut stores = state.stores.lock().await;
    match stores.revoke_session(&token) {
        Some(ctx) => {
            debug!(user = %ctx.username, "session revoked");
            (StatusCode::OK, Json(json!({ "detail": "logged out" }))).into_response()
        }
        None => ApiError::unauthorized("invalid bearer token").into_response(),
    }
}

/// Attach the contract's session cookies to a response.
fn with_session_cookies(mut response: Response, refresh: &str, csrf: &str) -> Response {
    let refresh_line = format!("{REFRESH_COOKIE}={refresh}; Path=/; HttpOnly; SameSite=Lax");
    let csrf_line = format!("{CSRF_COOKIE}={csrf}; Path=/; SameSite=Strict");
    for line in [refresh_line, csrf_line] {
        if let Ok(value) = HeaderValue::from_str(&line) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}
