//! Hardening suite: rate-limit storms, malformed payloads, signed-URL
//! tampering, and leak probes over error responses.
//!
//! These scenarios mostly assert safety rather than winners: whatever the
//! backend decides, it must stay inside the declared status vocabulary,
//! never 5xx, and never leak internals.

use std::sync::Arc;

use gauntlet_common::{
    CheckRecord, ContentionPolicy, HarnessError, HttpOutcome, Method, Outcome, RequestSpec,
    ScenarioReport, ScenarioSpec, Violation, check_contention, check_no_leak, check_statuses,
    login, run_all, run_repeat, run_scenario,
};
use serde_json::json;

use super::{SuiteCtx, sweep};

const RATE_LIMIT_STORM: (&str, &str) = (
    "hardening.rate-limit-storm",
    "A login storm on one identity stays within {200,429} and 429s carry Retry-After",
);
const MALFORMED_PAYLOAD_PROBE: (&str, &str) = (
    "hardening.malformed-payload-probe",
    "Malformed, mistyped, and oversized login payloads fail in {400,413,422} without leaks",
);
const SIGNED_URL_TAMPER: (&str, &str) = (
    "hardening.signed-url-tamper",
    "Export succeeds with a valid signature and is 403 when tampered or unsigned",
);
const LEAK_PROBE: (&str, &str) = (
    "hardening.leak-probe",
    "Error responses across endpoints carry no internal diagnostics",
);

pub const SCENARIOS: &[(&str, &str)] = &[
    RATE_LIMIT_STORM,
    MALFORMED_PAYLOAD_PROBE,
    SIGNED_URL_TAMPER,
    LEAK_PROBE,
];

pub async fn run(ctx: &SuiteCtx) -> Vec<ScenarioReport> {
    vec![
        rate_limit_storm(ctx).await,
        malformed_payload_probe(ctx).await,
        signed_url_tamper(ctx).await,
        leak_probe(ctx).await,
    ]
}

/// Hammer login with one identity well past any plausible per-window limit.
async fn rate_limit_storm(ctx: &SuiteCtx) -> ScenarioReport {
    let spec = ScenarioSpec::new(RATE_LIMIT_STORM.0, RATE_LIMIT_STORM.1)
        .with_concurrency(ctx.concurrency)
        .with_iterations(ctx.iterations.max(60));

    run_scenario(&spec, || async {
        let identity = ctx.provisioner.isolated_token("rate-storm");
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
                        json!({ "username": username, "password": password }),
                    )
                    .await
            }
        })
        .await;

        let mut checks = vec![CheckRecord::from_result(
            "safe-status-vocabulary",
            check_contention(
                &outcomes,
                &ContentionPolicy::SafeOnly {
                    allowed: vec![200, 429],
                },
                &spec.id,
            ),
        )];
        checks.push(CheckRecord::from_result(
            "429-carries-retry-after",
            check_retry_after(&outcomes, &spec.id),
        ));
        checks.extend(sweep(&outcomes, &spec.id));
        Ok(checks)
    })
    .await
}

/// Throw structurally broken login payloads at the backend.
async fn malformed_payload_probe(ctx: &SuiteCtx) -> ScenarioReport {
    let spec = ScenarioSpec::new(MALFORMED_PAYLOAD_PROBE.0, MALFORMED_PAYLOAD_PROBE.1)
        .with_concurrency(ctx.concurrency.min(4))
        .with_iterations(5);

    run_scenario(&spec, || async {
        let client = Arc::clone(&ctx.client);

        let probes: Vec<(&str, RequestSpec)> = vec![
            (
                "truncated-json",
                RequestSpec::new().raw_body("application/json", "{\"username\": \"x\""),
            ),
            (
                "mistyped-fields",
                RequestSpec::new().json(json!({ "username": 17, "password": [] })),
            ),
            (
                "missing-fields",
                RequestSpec::new().json(json!({ "username": "probe" })),
            ),
            ("empty-body", RequestSpec::new()),
            (
                "oversized-body",
                RequestSpec::new().raw_body(
                    "application/json",
                    format!(
                        r#"{{"username":"u","password":"{}"}}"#,
                        "x".repeat(64 * 1024)
                    ),
                ),
            ),
        ];

        let ops: Vec<_> = probes
            .into_iter()
            .map(|(_, request)| {
                let client = Arc::clone(&client);
                move || async move {
                    client
                        .request(Method::POST, "/auth/login", request)
                        .await
                }
            })
            .collect();
        let outcomes = run_all(ops, spec.concurrency).await;

        let mut checks = vec![CheckRecord::from_result(
            "rejected-in-vocabulary",
            check_statuses(&outcomes, &[400, 413, 422], &spec.id),
        )];
        checks.extend(sweep(&outcomes, &spec.id));
        Ok(checks)
    })
    .await
}

/// Request an export with a valid, a tampered, and a missing signature.
async fn signed_url_tamper(ctx: &SuiteCtx) -> ScenarioReport {
    let spec = ScenarioSpec::new(SIGNED_URL_TAMPER.0, SIGNED_URL_TAMPER.1)
        .with_concurrency(2)
        .with_iterations(3);

    run_scenario(&spec, || async {
        let identity = ctx.provisioner.isolated_token("sig-tamper");
        let session = login(&ctx.client, &identity).await?;

        let created = ctx
            .client
            .authed_request(
                &session.access_token,
                Method::POST,
                "/items",
                RequestSpec::new().json(json!({ "name": format!("signed-{}", session.user_id) })),
            )
            .await?;
        let item_id = created
            .safe_json()
            .and_then(|body| body.get("id").and_then(|v| v.as_u64()))
            .ok_or_else(|| HarnessError::Setup("item creation returned no id".to_string()))?;

        let url_response = ctx
            .client
            .authed_request(
                &session.access_token,
                Method::GET,
                &format!("/items/{item_id}/export_url"),
                RequestSpec::new(),
            )
            .await?;
        let signed_url = url_response
            .safe_json()
            .and_then(|body| body.get("url").and_then(|v| v.as_str().map(str::to_string)))
            .ok_or_else(|| HarnessError::Setup("export_url returned no url".to_string()))?;

        let valid = ctx.client.get(&signed_url).await?;
        let tampered = ctx.client.get(&format!("{signed_url}0")).await?;
        let unsigned = ctx.client.get(&format!("/items/{item_id}/export")).await?;

        let as_set = |outcome: HttpOutcome| vec![Outcome::Completed(outcome)];
        let mut checks = vec![
            CheckRecord::from_result(
                "valid-signature-accepted",
                check_statuses(&as_set(valid.clone()), &[200], &spec.id),
            ),
            CheckRecord::from_result(
                "tampered-signature-rejected",
                check_statuses(&as_set(tampered.clone()), &[403], &spec.id),
            ),
            CheckRecord::from_result(
                "missing-signature-rejected",
                check_statuses(&as_set(unsigned.clone()), &[403], &spec.id),
            ),
        ];
        let all = vec![
            Outcome::Completed(valid),
            Outcome::Completed(tampered),
            Outcome::Completed(unsigned),
        ];
        checks.extend(sweep(&all, &spec.id));
        Ok(checks)
    })
    .await
}

/// Drive routine error paths and scan every body for internals.
async fn leak_probe(ctx: &SuiteCtx) -> ScenarioReport {
    let spec = ScenarioSpec::new(LEAK_PROBE.0, LEAK_PROBE.1)
        .with_concurrency(ctx.concurrency.min(4))
        .with_iterations(5);

    run_scenario(&spec, || async {
        let identity = ctx.provisioner.isolated_token("leak-probe");
        let session = login(&ctx.client, &identity).await?;
        let token = session.access_token.clone();

        // Provoke the common 4xx families: bad credentials, missing
        // resource, duplicate name, invalid bearer, invalid input.
        let duplicate_name = format!("leak-dup-{}", session.user_id);
        let seed = ctx
            .client
            .authed_request(
                &token,
                Method::POST,
                "/items",
                RequestSpec::new().json(json!({ "name": duplicate_name })),
            )
            .await?;
        if !seed.is_success() {
            return Err(HarnessError::Setup(format!(
                "seeding duplicate item failed with status {}",
                seed.status
            )));
        }

        let wrong_password = ctx
            .client
            .post_json(
                "/auth/login",
                json!({ "username": identity.as_str(), "password": "wrong" }),
            )
            .await?;
        let missing_item = ctx.client.get("/items/999999").await?;
        let duplicate = ctx
            .client
            .authed_request(
                &token,
                Method::POST,
                "/items",
                RequestSpec::new().json(json!({ "name": duplicate_name })),
            )
            .await?;
        let bad_bearer = ctx
            .client
            .authed_request(
                "at-forged",
                Method::POST,
                "/tickets",
                RequestSpec::new(),
            )
            .await?;
        let invalid_input = ctx
            .client
            .post_json("/auth/login", json!({ "username": "" , "password": "" }))
            .await?;

        let probes = [
            ("wrong-password", wrong_password, 401u16),
            ("missing-item", missing_item, 404),
            ("duplicate-name", duplicate, 409),
            ("bad-bearer", bad_bearer, 401),
            ("invalid-input", invalid_input, 422),
        ];

        let mut checks = Vec::new();
        for (name, outcome, expected) in probes {
            let status_check: Result<(), Violation> = check_statuses(
                &[Outcome::Completed(outcome.clone())],
                &[expected],
                &spec.id,
            );
            checks.push(CheckRecord::from_result(
                format!("{name}-status"),
                status_check,
            ));
            checks.push(CheckRecord::from_result(
                format!("{name}-body-clean"),
                check_no_leak(&outcome, &spec.id),
            ));
        }
        Ok(checks)
    })
    .await
}

/// Every 429 outcome must carry a parseable `Retry-After` header.
fn check_retry_after(
    outcomes: &[Outcome<HttpOutcome>],
    label: &str,
) -> Result<(), Violation> {
    for (index, outcome) in outcomes.iter().enumerate() {
        if let Outcome::Completed(http) = outcome
            && http.status == 429
        {
            let has_retry_after = http
                .header("retry-after")
                .and_then(|v| v.parse::<u64>().ok())
                .is_some();
            if !has_retry_after {
                return Err(Violation::UnexpectedStatus {
                    label: format!("{label} #{index} (missing Retry-After)"),
                    status: http.status,
                    allowed: vec![429],
                    snippet: http.body.chars().take(120).collect(),
                });
            }
        }
    }
    Ok(())
}
