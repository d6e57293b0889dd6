//! Resource suite: create/delete/update races and one-time consumption.
//!
//! Every scenario here contends for a single consumable outcome, so the
//! policies are exact: one winner, losers drawn only from the declared set.

use std::sync::Arc;

use gauntlet_common::{
    ApiClient, CheckRecord, ContentionPolicy, HarnessError, Method, RequestSpec, ScenarioReport,
    ScenarioSpec, Session, check_contention, login, run_repeat, run_scenario,
};
use serde_json::json;

use super::{SuiteCtx, sweep};

const CREATE_NAME_RACE: (&str, &str) = (
    "resources.create-name-race",
    "Concurrent creates of one unique name produce exactly one 201 and otherwise 409",
);
const DELETE_RACE: (&str, &str) = (
    "resources.delete-race",
    "Concurrent deletes of one item produce exactly one 204 and otherwise 404",
);
const STALE_UPDATE_RACE: (&str, &str) = (
    "resources.stale-update-race",
    "Concurrent updates with one version produce exactly one winner and otherwise 409",
);
const TICKET_CONSUME_RACE: (&str, &str) = (
    "resources.ticket-consume-race",
    "Concurrent consumption of a one-time ticket has exactly one winner",
);

pub const SCENARIOS: &[(&str, &str)] = &[
    CREATE_NAME_RACE,
    DELETE_RACE,
    STALE_UPDATE_RACE,
    TICKET_CONSUME_RACE,
];

pub async fn run(ctx: &SuiteCtx) -> Vec<ScenarioReport> {
    vec![
        create_name_race(ctx).await,
        delete_race(ctx).await,
        stale_update_race(ctx).await,
        ticket_consume_race(ctx).await,
    ]
}

async fn create_name_race(ctx: &SuiteCtx) -> ScenarioReport {
    let spec = ScenarioSpec::new(CREATE_NAME_RACE.0, CREATE_NAME_RACE.1)
        .with_concurrency(ctx.concurrency)
        .with_iterations(ctx.iterations);

    run_scenario(&spec, || async {
        let identity = ctx.provisioner.isolated_token("create-race");
        let session = login(&ctx.client, &identity).await?;
        let client = Arc::clone(&ctx.client);
        let token = session.access_token.clone();
        // One contended name for the whole batch.
        let name = format!("raced-{}", identity.as_str());

        let outcomes = run_repeat(spec.iterations, spec.concurrency, move |_| {
            let client = Arc::clone(&client);
            let token = token.clone();
            let name = name.clone();
            async move {
                client
                    .authed_request(
                        &token,
                        Method::POST,
                        "/items",
                        RequestSpec::new().json(json!({ "name": name })),
                    )
                    .await
            }
        })
        .await;

        let mut checks = vec![CheckRecord::from_result(
            "single-creator",
            check_contention(
                &outcomes,
                &ContentionPolicy::ExactlyOneWinner { losers: vec![409] },
                &spec.id,
            ),
        )];
        checks.extend(sweep(&outcomes, &spec.id));
        Ok(checks)
    })
    .await
}

async fn delete_race(ctx: &SuiteCtx) -> ScenarioReport {
    let spec = ScenarioSpec::new(DELETE_RACE.0, DELETE_RACE.1)
        .with_concurrency(ctx.concurrency)
        .with_iterations(ctx.iterations);

    run_scenario(&spec, || async {
        let identity = ctx.provisioner.isolated_token("delete-race");
        let session = login(&ctx.client, &identity).await?;
        let item_id = create_item(&ctx.client, &session, "deletable").await?;
        let client = Arc::clone(&ctx.client);
        let token = session.access_token.clone();

        let outcomes = run_repeat(spec.iterations, spec.concurrency, move |_| {
            let client = Arc::clone(&client);
            let token = token.clone();
            async move {
                client
                    .authed_request(
                        &token,
                        Method::DELETE,
                        &format!("/items/{item_id}"),
                        RequestSpec::new(),
                    )
                    .await
            }
        })
        .await;

        let mut checks = vec![CheckRecord::from_result(
            "single-deleter",
            check_contention(
                &outcomes,
                &ContentionPolicy::ExactlyOneWinner { losers: vec![404] },
                &spec.id,
            ),
        )];
        checks.extend(sweep(&outcomes, &spec.id));
        Ok(checks)
    })
    .await
}

async fn stale_update_race(ctx: &SuiteCtx) -> ScenarioReport {
    let spec = ScenarioSpec::new(STALE_UPDATE_RACE.0, STALE_UPDATE_RACE.1)
        .with_concurrency(ctx.concurrency)
        .with_iterations(ctx.iterations);

    run_scenario(&spec, || async {
        let identity = ctx.provisioner.isolated_token("update-race");
        let session = login(&ctx.client, &identity).await?;
        let item_id = create_item(&ctx.client, &session, "updatable").await?;
        let client = Arc::clone(&ctx.client);
        let token = session.access_token.clone();

        // Every writer claims version 1; only one update can apply it.
        let outcomes = run_repeat(spec.iterations, spec.concurrency, move |i| {
            let client = Arc::clone(&client);
            let token = token.clone();
            async move {
                client
                    .authed_request(
                        &token,
                        Method::PUT,
                        &format!("/items/{item_id}"),
                        RequestSpec::new().json(json!({ "version": 1, "name": format!("writer-{i}") })),
                    )
                    .await
            }
        })
        .await;

        let mut checks = vec![CheckRecord::from_result(
            "single-writer",
            check_contention(
                &outcomes,
                &ContentionPolicy::ExactlyOneWinner { losers: vec![409] },
                &spec.id,
            ),
        )];
        checks.extend(sweep(&outcomes, &spec.id));
        Ok(checks)
    })
    .await
}

async fn ticket_consume_race(ctx: &SuiteCtx) -> ScenarioReport {
    let spec = ScenarioSpec::new(TICKET_CONSUME_RACE.0, TICKET_CONSUME_RACE.1)
        .with_concurrency(ctx.concurrency)
        .with_iterations(ctx.iterations);

    run_scenario(&spec, || async {
        let identity = ctx.provisioner.isolated_token("ticket-race");
        let session = login(&ctx.client, &identity).await?;

        let created = ctx
            .client
            .authed_request(
                &session.access_token,
                Method::POST,
                "/tickets",
                RequestSpec::new(),
            )
            .await?;
        let ticket_id = created
            .safe_json()
            .and_then(|body| body.get("id").and_then(|v| v.as_u64()))
            .ok_or_else(|| {
                HarnessError::Setup(format!(
                    "ticket creation returned status {} without an id",
                    created.status
                ))
            })?;

        let client = Arc::clone(&ctx.client);
        let token = session.access_token.clone();
        let outcomes = run_repeat(spec.iterations, spec.concurrency, move |_| {
            let client = Arc::clone(&client);
            let token = token.clone();
            async move {
                client
                    .authed_request(
                        &token,
                        Method::POST,
                        &format!("/tickets/{ticket_id}/consume"),
                        RequestSpec::new(),
                    )
                    .await
            }
        })
        .await;

        let mut checks = vec![CheckRecord::from_result(
            "single-consumer",
            check_contention(
                &outcomes,
                &ContentionPolicy::ExactlyOneWinner { losers: vec![409] },
                &spec.id,
            ),
        )];
        checks.extend(sweep(&outcomes, &spec.id));
        Ok(checks)
    })
    .await
}

/// Create one item under this session, unique per identity.
async fn create_item(
    client: &ApiClient,
    session: &Session,
    tag: &str,
) -> Result<u64, HarnessError> {
    let name = format!("{tag}-{}", session.user_id);
    let outcome = client
        .authed_request(
            &session.access_token,
            Method::POST,
            "/items",
            RequestSpec::new().json(json!({ "name": name })),
        )
        .await?;

    outcome
        .safe_json()
        .and_then(|body| body.get("id").and_then(|v| v.as_u64()))
        .ok_or_else(|| {
            HarnessError::Setup(format!(
                "item creation returned status {} without an id",
                outcome.status
            ))
        })
}
