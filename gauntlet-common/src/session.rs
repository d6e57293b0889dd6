//! Session establishment against the backend under test.
//!
//! Login is health-gated: the backend may still be starting when a scenario
//! begins, so [`wait_until_healthy`] polls the health endpoint on a fixed
//! interval before the first credentialed call. Login failures are hard
//! scenario failures with the offending status and a body snippet, never
//! assertable outcomes.

use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tracing::debug;

use crate::client::{ApiClient, ClientError, HttpOutcome, Method, RequestSpec};
use crate::identity::IsolatedIdentity;

/// Default bound on waiting for the backend to become healthy.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(60);

/// Interval between health probes.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Cookie carrying the CSRF token.
pub const CSRF_COOKIE: &str = "csrf_token";

/// Header echoing the CSRF token on refresh-cookie-bearing requests.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Everything a successful login returns. Owned by the scenario that
/// created it; shared across closures only as read-only data.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_cookie: String,
    pub csrf_token: String,
    pub user_id: String,
}

/// Errors establishing or rotating a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("backend not healthy after {0:?}")]
    HealthTimeout(Duration),

    #[error("login failed for {identity}: status {status}: {snippet}")]
    LoginFailed {
        identity: String,
        status: u16,
        snippet: String,
    },

    #[error("session payload missing {field}")]
    MalformedPayload { field: &'static str },

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Poll the health endpoint until it answers 2xx or the timeout elapses.
pub async fn wait_until_healthy(
    client: &ApiClient,
    timeout: Duration,
) -> Result<(), SessionError> {
    let deadline = Instant::now() + timeout;
    loop {
        match client.get("/healthz").await {
            Ok(outcome) if outcome.is_success() => return Ok(()),
            Ok(outcome) => {
                debug!(status = outcome.status, "health probe not ready");
            }
            Err(err) => {
                debug!(error = %err, "health probe transport failure");
            }
        }
        if Instant::now() >= deadline {
            return Err(SessionError::HealthTimeout(timeout));
        }
        tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Health-gate, then log in with an isolated identity.
///
/// The backend treats login as create-or-login, so a fresh identity becomes
/// a fresh account on first use.
pub async fn login(
    client: &ApiClient,
    identity: &IsolatedIdentity,
) -> Result<Session, SessionError> {
    login_with_deadline(client, identity, DEFAULT_HEALTH_TIMEOUT).await
}

/// [`login`] with an explicit health-wait bound.
pub async fn login_with_deadline(
    client: &ApiClient,
    identity: &IsolatedIdentity,
    health_timeout: Duration,
) -> Result<Session, SessionError> {
    wait_until_healthy(client, health_timeout).await?;

    let outcome = client
        .post_json(
            "/auth/login",
            json!({
                "username": identity.as_str(),
                "password": identity.password(),
            }),
        )
        .await?;

    if !outcome.is_success() {
        return Err(SessionError::LoginFailed {
            identity: identity.as_str().to_string(),
            status: outcome.status,
            snippet: snippet(&outcome.body),
        });
    }

    session_from_login(&outcome)
}

/// Extract a [`Session`] from a successful login response.
pub fn session_from_login(outcome: &HttpOutcome) -> Result<Session, SessionError> {
    let body = outcome
        .safe_json()
        .ok_or(SessionError::MalformedPayload { field: "body" })?;

    let access_token = body
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or(SessionError::MalformedPayload {
            field: "access_token",
        })?
        .to_string();

    let user_id = match body.get("user_id") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => return Err(SessionError::MalformedPayload { field: "user_id" }),
    };

    let refresh_cookie = outcome
        .set_cookie(REFRESH_COOKIE)
        .ok_or(SessionError::MalformedPayload {
            field: "refresh_token cookie",
        })?;
    let csrf_token = outcome
        .set_cookie(CSRF_COOKIE)
        .ok_or(SessionError::MalformedPayload {
            field: "csrf_token cookie",
        })?;

    Ok(Session {
        access_token,
        refresh_cookie,
        csrf_token,
        user_id,
    })
}

/// One refresh attempt carrying this session's cookie and CSRF header.
/// Returns the raw outcome: refresh races are scenario material.
pub async fn refresh(
    client: &ApiClient,
    session: &Session,
) -> Result<HttpOutcome, ClientError> {
    client
        .request(
            Method::POST,
            "/auth/refresh",
            RequestSpec::new()
                .cookie(REFRESH_COOKIE, &session.refresh_cookie)
                .cookie(CSRF_COOKIE, &session.csrf_token)
                .header(CSRF_HEADER, &session.csrf_token),
        )
        .await
}

/// One logout attempt with this session's bearer token.
pub async fn logout(
    client: &ApiClient,
    session: &Session,
) -> Result<HttpOutcome, ClientError> {
    client
        .authed_request(
            &session.access_token,
            Method::POST,
            "/auth/logout",
            RequestSpec::new(),
        )
        .await
}

/// Bounded body excerpt for error messages.
fn snippet(body: &str) -> String {
    const MAX: usize = 160;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}
