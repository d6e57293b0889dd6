//! Auth race E2E tests: session establishment, duplicate-login idempotency,
//! and concurrent refresh rotation against the reference mock backend.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use gauntlet_common::{
    ApiClient, ContentionPolicy, Method, RequestSpec, SessionError, check_contention,
    check_statuses, login, refresh, run_repeat, scan_outcomes,
    session::{CSRF_HEADER, REFRESH_COOKIE},
    wait_until_healthy,
};
use serde_json::json;

use common::{spawn_default_backend, storm_iterations};

#[tokio::test]
async fn e2e_login_yields_complete_session() {
    let client = spawn_default_backend().await;
    wait_until_healthy(&client, Duration::from_secs(5))
        .await
        .expect("healthy");

    let provisioner = gauntlet_common::IdentityProvisioner::new();
    let identity = provisioner.isolated_token("session-shape");
    let session = login(&client, &identity).await.expect("login");

    assert!(!session.access_token.is_empty());
    assert!(!session.refresh_cookie.is_empty());
    assert!(!session.csrf_token.is_empty());
    assert!(!session.user_id.is_empty());
}

#[tokio::test]
async fn e2e_health_wait_times_out_descriptively() {
    // Nothing listens on this port.
    let client = ApiClient::new("http://127.0.0.1:9").expect("client");
    let err = wait_until_healthy(&client, Duration::from_millis(600))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::HealthTimeout(_)));
}

#[tokio::test]
async fn e2e_duplicate_login_storm_is_idempotent() {
    // Rate limiting is not under test here; leave generous headroom so the
    // nightly iteration override cannot turn 200s into 429s.
    let client = Arc::new(
        common::spawn_backend(gauntlet_mockapi::MockApiConfig {
            login_rate_limit: 1_000_000,
            ..gauntlet_mockapi::MockApiConfig::default()
        })
        .await,
    );
    let provisioner = gauntlet_common::IdentityProvisioner::new();
    let identity = provisioner.isolated_token("login-storm");

    let iterations = storm_iterations();
    let shared = Arc::clone(&client);
    let username = identity.as_str().to_string();
    let password = identity.password();

    let outcomes = run_repeat(iterations, 8, move |_| {
        let client = Arc::clone(&shared);
        let username = username.clone();
        let password = password.clone();
        async move {
            client
                .post_json(
                    "/auth/login",
                    json!({ "username": username, "password": password }),
                )
                .await
        }
    })
    .await;

    assert_eq!(outcomes.len(), iterations);
    check_contention(
        &outcomes,
        &ContentionPolicy::Idempotent { status: 200 },
        "login storm",
    )
    .expect("all duplicate logins succeed identically");
    assert!(scan_outcomes(&outcomes, "login storm").is_empty());

    // Every login minted a distinct access token.
    let tokens: HashSet<String> = outcomes
        .iter()
        .filter_map(|o| o.completed())
        .filter_map(|http| http.safe_json())
        .filter_map(|body| {
            body.get("access_token")
                .and_then(|v| v.as_str().map(str::to_string))
        })
        .collect();
    assert_eq!(tokens.len(), iterations);
}

#[tokio::test]
async fn e2e_twenty_concurrent_refreshes_of_one_token() {
    let client = Arc::new(spawn_default_backend().await);
    let provisioner = gauntlet_common::IdentityProvisioner::new();
    let identity = provisioner.isolated_token("refresh-race");
    let session = login(&client, &identity).await.expect("login");

    let shared = Arc::clone(&client);
    let cookie = session.refresh_cookie.clone();
    let csrf = session.csrf_token.clone();

    let outcomes = run_repeat(20, 10, move |_| {
        let client = Arc::clone(&shared);
        let cookie = cookie.clone();
        let csrf = csrf.clone();
        async move {
            client
                .request(
                    Method::POST,
                    "/auth/refresh",
                    RequestSpec::new()
                        .cookie(REFRESH_COOKIE, cookie)
                        .header(CSRF_HEADER, csrf),
                )
                .await
        }
    })
    .await;

    // Outcome set completeness plus the refresh-race vocabulary.
    assert_eq!(outcomes.len(), 20);
    check_statuses(&outcomes, &[200, 400, 401], "refresh race")
        .expect("statuses stay in {200, 400, 401}");
    check_contention(
        &outcomes,
        &ContentionPolicy::AtLeastOneWinner {
            losers: vec![400, 401],
        },
        "refresh race",
    )
    .expect("at least one refresh wins, no 5xx");
}

#[tokio::test]
async fn e2e_refresh_helper_rotates_the_cookie() {
    let client = spawn_default_backend().await;
    let provisioner = gauntlet_common::IdentityProvisioner::new();
    let identity = provisioner.isolated_token("rotation");
    let session = login(&client, &identity).await.expect("login");

    let outcome = refresh(&client, &session).await.expect("refresh");
    assert_eq!(outcome.status, 200);
    let rotated = outcome
        .set_cookie(REFRESH_COOKIE)
        .expect("rotated refresh cookie");
    assert_ne!(rotated, session.refresh_cookie);

    // The old cookie is spent.
    let replay = refresh(&client, &session).await.expect("replay");
    assert_eq!(replay.status, 401);
}

#[tokio::test]
async fn e2e_cookie_for_a_with_csrf_of_b_is_forbidden() {
    let client = spawn_default_backend().await;
    let provisioner = gauntlet_common::IdentityProvisioner::new();
    let session_a = login(&client, &provisioner.isolated_token("pair-a"))
        .await
        .expect("login a");
    let session_b = login(&client, &provisioner.isolated_token("pair-b"))
        .await
        .expect("login b");

    let outcome = client
        .request(
            Method::POST,
            "/auth/refresh",
            RequestSpec::new()
                .cookie(REFRESH_COOKIE, &session_a.refresh_cookie)
                .header(CSRF_HEADER, &session_b.csrf_token),
        )
        .await
        .expect("request");
    assert_eq!(outcome.status, 403);

    // Identity A's session is intact afterwards.
    let outcome = refresh(&client, &session_a).await.expect("refresh a");
    assert_eq!(outcome.status, 200);
}

#[tokio::test]
async fn e2e_logout_storm_single_winner() {
    let client = Arc::new(spawn_default_backend().await);
    let provisioner = gauntlet_common::IdentityProvisioner::new();
    let identity = provisioner.isolated_token("logout-storm");
    let session = login(&client, &identity).await.expect("login");

    let shared = Arc::clone(&client);
    let token = session.access_token.clone();
    let outcomes = run_repeat(12, 6, move |_| {
        let client = Arc::clone(&shared);
        let token = token.clone();
        async move {
            client
                .authed_request(&token, Method::POST, "/auth/logout", RequestSpec::new())
                .await
        }
    })
    .await;

    check_contention(
        &outcomes,
        &ContentionPolicy::ExactlyOneWinner { losers: vec![401] },
        "logout storm",
    )
    .expect("one logout wins, the rest see 401");
}
