//! Auth suite: login idempotency, refresh rotation races, CSRF precedence,
//! logout storms.

use std::sync::Arc;

use gauntlet_common::{
    CheckRecord, ContentionPolicy, Method, RequestSpec, ScenarioReport, ScenarioSpec,
    check_contention, check_statuses, login, run_repeat, run_scenario,
    session::{CSRF_HEADER, REFRESH_COOKIE},
};

use super::{SuiteCtx, sweep};

const LOGIN_IDEMPOTENCY: (&str, &str) = (
    "auth.login-idempotency",
    "Duplicate concurrent logins with one identity all return the same success status",
);
const REFRESH_ROTATION_RACE: (&str, &str) = (
    "auth.refresh-rotation-race",
    "Concurrent refreshes of one token stay in {200,400,401} with at least one winner",
);
const CSRF_MISMATCH: (&str, &str) = (
    "auth.csrf-mismatch",
    "Refresh with a forged CSRF header is uniformly rejected with 403",
);
const CROSS_IDENTITY_CSRF: (&str, &str) = (
    "auth.cross-identity-csrf",
    "Cookie of identity A with CSRF token of identity B never passes",
);
const LOGOUT_STORM: (&str, &str) = (
    "auth.logout-storm",
    "Concurrent logouts of one session yield a winner and otherwise 401",
);

pub const SCENARIOS: &[(&str, &str)] = &[
    LOGIN_IDEMPOTENCY,
    REFRESH_ROTATION_RACE,
    CSRF_MISMATCH,
    CROSS_IDENTITY_CSRF,
    LOGOUT_STORM,
];

pub async fn run(ctx: &SuiteCtx) -> Vec<ScenarioReport> {
    vec![
        login_idempotency(ctx).await,
        refresh_rotation_race(ctx).await,
        csrf_mismatch(ctx).await,
        cross_identity_csrf(ctx).await,
        logout_storm(ctx).await,
    ]
}

/// Same credentials, N concurrent logins: create-or-login must be
/// idempotent, never a mix of success and conflict.
async fn login_idempotency(ctx: &SuiteCtx) -> ScenarioReport {
    let spec = ScenarioSpec::new(LOGIN_IDEMPOTENCY.0, LOGIN_IDEMPOTENCY.1)
        .with_concurrency(ctx.concurrency)
        .with_iterations(ctx.iterations);

    run_scenario(&spec, || async {
        let identity = ctx.provisioner.isolated_token("login-idem");
        let client = Arc::clone(&ctx.client);
        let username = identity.as_str().to_string();
        let password = identity.password();

        let outcomes = run_repeat(spec.iterations, spec.concurrency, move |_| {
            let client = Arc::clone(&client);
            let username = username.clone();
            let password = password.clone();
            async move {
                client
                    .post_json(
                        "/auth/login",
                        serde_json::json!({ "username": username, "password": password }),
                    )
                    .await
            }
        })
        .await;

        let mut checks = vec![CheckRecord::from_result(
            "idempotent-200",
            check_contention(
                &outcomes,
                &ContentionPolicy::Idempotent { status: 200 },
                &spec.id,
            ),
        )];
        checks.extend(sweep(&outcomes, &spec.id));
        Ok(checks)
    })
    .await
}

/// 20 concurrent refreshes of the same refresh token.
async fn refresh_rotation_race(ctx: &SuiteCtx) -> ScenarioReport {
    let spec = ScenarioSpec::new(REFRESH_ROTATION_RACE.0, REFRESH_ROTATION_RACE.1)
        .with_concurrency(ctx.concurrency)
        .with_iterations(20);

    run_scenario(&spec, || async {
        let identity = ctx.provisioner.isolated_token("refresh-race");
        let session = login(&ctx.client, &identity).await?;
        let client = Arc::clone(&ctx.client);
        let refresh_cookie = session.refresh_cookie.clone();
        let csrf = session.csrf_token.clone();

        let outcomes = run_repeat(spec.iterations, spec.concurrency, move |_| {
            let client = Arc::clone(&client);
            let refresh_cookie = refresh_cookie.clone();
            let csrf = csrf.clone();
            async move {
                client
                    .request(
                        Method::POST,
                        "/auth/refresh",
                        RequestSpec::new()
                            .cookie(REFRESH_COOKIE, refresh_cookie)
                            .header(CSRF_HEADER, csrf),
                    )
                    .await
            }
        })
        .await;

        let mut checks = vec![
            CheckRecord::from_result(
                "status-vocabulary",
                check_statuses(&outcomes, &[200, 400, 401], &spec.id),
            ),
            CheckRecord::from_result(
                "at-least-one-winner",
                check_contention(
                    &outcomes,
                    &ContentionPolicy::AtLeastOneWinner {
                        losers: vec![400, 401],
                    },
                    &spec.id,
                ),
            ),
        ];
        checks.extend(sweep(&outcomes, &spec.id));
        Ok(checks)
    })
    .await
}

/// Valid refresh cookie, forged CSRF header: uniformly 403.
async fn csrf_mismatch(ctx: &SuiteCtx) -> ScenarioReport {
    let spec = ScenarioSpec::new(CSRF_MISMATCH.0, CSRF_MISMATCH.1)
        .with_concurrency(ctx.concurrency)
        .with_iterations(ctx.iterations.min(10));

    run_scenario(&spec, || async {
        let identity = ctx.provisioner.isolated_token("csrf-forge");
        let session = login(&ctx.client, &identity).await?;
        let client = Arc::clone(&ctx.client);
        let refresh_cookie = session.refresh_cookie.clone();

        let outcomes = run_repeat(spec.iterations, spec.concurrency, move |i| {
            let client = Arc::clone(&client);
            let refresh_cookie = refresh_cookie.clone();
            async move {
                let mut request = RequestSpec::new().cookie(REFRESH_COOKIE, refresh_cookie);
                // Alternate between a forged header and no header at all.
                if i % 2 == 0 {
                    request = request.header(CSRF_HEADER, "forged-token");
                }
                client.request(Method::POST, "/auth/refresh", request).await
            }
        })
        .await;

        let mut checks = vec![CheckRecord::from_result(
            "uniform-403",
            check_contention(
                &outcomes,
                &ContentionPolicy::Idempotent { status: 403 },
                &spec.id,
            ),
        )];
        checks.extend(sweep(&outcomes, &spec.id));
        Ok(checks)
    })
    .await
}

/// Identity A's refresh cookie paired with identity B's CSRF token.
async fn cross_identity_csrf(ctx: &SuiteCtx) -> ScenarioReport {
    let spec = ScenarioSpec::new(CROSS_IDENTITY_CSRF.0, CROSS_IDENTITY_CSRF.1)
        .with_concurrency(ctx.concurrency.min(4))
        .with_iterations(ctx.iterations.min(8));

    run_scenario(&spec, || async {
        let identity_a = ctx.provisioner.isolated_token("cross-a");
        let identity_b = ctx.provisioner.isolated_token("cross-b");
        let session_a = login(&ctx.client, &identity_a).await?;
        let session_b = login(&ctx.client, &identity_b).await?;

        let client = Arc::clone(&ctx.client);
        let cookie_a = session_a.refresh_cookie.clone();
        let csrf_b = session_b.csrf_token.clone();

        let outcomes = run_repeat(spec.iterations, spec.concurrency, move |_| {
            let client = Arc::clone(&client);
            let cookie_a = cookie_a.clone();
            let csrf_b = csrf_b.clone();
            async move {
                client
                    .request(
                        Method::POST,
                        "/auth/refresh",
                        RequestSpec::new()
                            .cookie(REFRESH_COOKIE, cookie_a)
                            .header(CSRF_HEADER, csrf_b),
                    )
                    .await
            }
        })
        .await;

        let mut checks = vec![CheckRecord::from_result(
            "uniform-403",
            check_contention(
                &outcomes,
                &ContentionPolicy::Idempotent { status: 403 },
                &spec.id,
            ),
        )];
        checks.extend(sweep(&outcomes, &spec.id));
        Ok(checks)
    })
    .await
}

/// N concurrent logouts of the same bearer token.
async fn logout_storm(ctx: &SuiteCtx) -> ScenarioReport {
    let spec = ScenarioSpec::new(LOGOUT_STORM.0, LOGOUT_STORM.1)
        .with_concurrency(ctx.concurrency)
        .with_iterations(ctx.iterations.min(16));

    run_scenario(&spec, || async {
        let identity = ctx.provisioner.isolated_token("logout-storm");
        let session = login(&ctx.client, &identity).await?;
        let client = Arc::clone(&ctx.client);
        let token = session.access_token.clone();

        let outcomes = run_repeat(spec.iterations, spec.concurrency, move |_| {
            let client = Arc::clone(&client);
            let token = token.clone();
            async move {
                client
                    .authed_request(&token, Method::POST, "/auth/logout", RequestSpec::new())
                    .await
            }
        })
        .await;

        let mut checks = vec![CheckRecord::from_result(
            "single-winner-then-401",
            check_contention(
                &outcomes,
                &ContentionPolicy::ExactlyOneWinner { losers: vec![401] },
                &spec.id,
            ),
        )];
        checks.extend(sweep(&outcomes, &spec.id));
        Ok(checks)
    })
    .await
}
