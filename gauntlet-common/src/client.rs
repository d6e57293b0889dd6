//! HTTP client adapter for driving a backend under test.
//!
//! Non-2xx statuses are data, never errors: every status the backend can
//! produce must be observable by the invariant layer. Only transport-level
//! failures (DNS, connection refused, timeout) surface as [`ClientError`],
//! and those are fatal to the enclosing scenario.
//!
//! Cookie propagation is always explicit per request. The underlying client
//! keeps no cookie jar and follows no redirects, so scenarios can construct
//! deliberate cookie/body mismatches and observe signed-URL behavior directly.

use std::time::Duration;

use serde_json::Value;

pub use reqwest::Method;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by the client adapter.
///
/// These are transport failures, not HTTP outcomes. A 404 or a 503 comes
/// back as an [`HttpOutcome`]; a refused connection comes back as this.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport failure for {method} {url}: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Request parameters beyond method and path.
///
/// Headers and cookies are plain pairs so a scenario can attach a cookie for
/// one identity and a body token for another without the client second-guessing.
#[derive(Debug, Clone, Default)]
pub struct RequestSpec {
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    body: Option<RequestBody>,
}

#[derive(Debug, Clone)]
enum RequestBody {
    Json(Value),
    Raw { content_type: String, payload: String },
}

impl RequestSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a cookie pair to this request only.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Set a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Set a raw body with an explicit content type, for malformed-input probes.
    pub fn raw_body(mut self, content_type: impl Into<String>, payload: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Raw {
            content_type: content_type.into(),
            payload: payload.into(),
        });
        self
    }
}

/// Normalized result of one HTTP call.
#[derive(Debug, Clone)]
pub struct HttpOutcome {
    /// HTTP status code.
    pub status: u16,
    /// Response headers as (lowercased-name, value) pairs, in wire order.
    /// Repeated headers (notably `Set-Cookie`) appear once per value.
    pub headers: Vec<(String, String)>,
    /// Response body text. Empty when the body was empty or undecodable.
    pub body: String,
}

impl HttpOutcome {
    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON, returning `None` rather than failing when the
    /// body is absent or not valid JSON. "No parseable body" is a valid
    /// outcome, not an error.
    pub fn safe_json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// First value of a response header, by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        let wanted = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == wanted)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a cookie set by this response, if any `Set-Cookie` header
    /// carries it.
    pub fn set_cookie(&self, name: &str) -> Option<String> {
        self.set_cookie_line(name).and_then(|line| {
            let first = line.split(';').next()?;
            let (_, value) = first.split_once('=')?;
            Some(value.trim().to_string())
        })
    }

    /// Full `Set-Cookie` line for a cookie, including attributes such as
    /// `HttpOnly`, `SameSite`, and `Path`. Used by contract checks.
    pub fn set_cookie_line(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n == "set-cookie")
            .map(|(_, v)| v.as_str())
            .find(|line| {
                line.split(';')
                    .next()
                    .and_then(|pair| pair.split_once('='))
                    .is_some_and(|(n, _)| n.trim() == name)
            })
    }

    /// True when the named `Set-Cookie` line carries the given attribute,
    /// matched case-insensitively (`HttpOnly`, `SameSite=Lax`, ...).
    pub fn cookie_has_attribute(&self, name: &str, attribute: &str) -> bool {
        let wanted = attribute.to_ascii_lowercase();
        self.set_cookie_line(name).is_some_and(|line| {
            line.split(';')
                .skip(1)
                .any(|attr| attr.trim().to_ascii_lowercase() == wanted)
        })
    }
}

/// HTTP client bound to one backend base URL.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Create a client with the default request timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with an explicit request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(ClientError::Build)?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { base_url, http })
    }

    /// The base URL this client targets, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue an unauthenticated request.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        spec: RequestSpec,
    ) -> Result<HttpOutcome, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.request(method.clone(), &url);

        for (name, value) in &spec.headers {
            builder = builder.header(name, value);
        }

        if !spec.cookies.is_empty() {
            let cookie_header = spec
                .cookies
                .iter()
                .map(|(n, v)| format!("{n}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(reqwest::header::COOKIE, cookie_header);
        }

        match &spec.body {
            Some(RequestBody::Json(value)) => builder = builder.json(value),
            Some(RequestBody::Raw {
                content_type,
                payload,
            }) => {
                builder = builder
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .body(payload.clone());
            }
            None => {}
        }

        let response = builder.send().await.map_err(|source| {
            ClientError::Transport {
                method: method.to_string(),
                url: url.clone(),
                source,
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response.text().await.map_err(|source| {
            ClientError::Transport {
                method: method.to_string(),
                url,
                source,
            }
        })?;

        Ok(HttpOutcome {
            status,
            headers,
            body,
        })
    }

    /// Issue a request with a bearer token. Cookies are still explicit: a
    /// scenario that wants cookie-plus-bearer attaches both itself.
    pub async fn authed_request(
        &self,
        token: &str,
        method: Method,
        path: &str,
        spec: RequestSpec,
    ) -> Result<HttpOutcome, ClientError> {
        let spec = spec.header("Authorization", format!("Bearer {token}"));
        self.request(method, path, spec).await
    }

    /// Convenience GET with an empty spec.
    pub async fn get(&self, path: &str) -> Result<HttpOutcome, ClientError> {
        self.request(Method::GET, path, RequestSpec::new()).await
    }

    /// Convenience unauthenticated POST with a JSON body.
    pub async fn post_json(&self, path: &str, body: Value) -> Result<HttpOutcome, ClientError> {
        self.request(Method::POST, path, RequestSpec::new().json(body))
            .await
    }
}
