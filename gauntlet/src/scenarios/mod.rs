//! Built-in scenario suites.
//!
//! Each suite composes the harness primitives — provision an isolated
//! identity, build operation closures, hand them to the runner, apply
//! invariant checks to the outcome set — against one family of backend
//! endpoints. A failed scenario is recorded and the suite continues.

pub mod auth;
pub mod hardening;
pub mod resources;

use std::sync::Arc;

use gauntlet_common::{
    ApiClient, CheckRecord, HttpOutcome, IdentityProvisioner, Outcome, SuiteReport, scan_outcomes,
};

/// Shared context handed to every scenario.
#[derive(Clone)]
pub struct SuiteCtx {
    pub client: Arc<ApiClient>,
    pub provisioner: IdentityProvisioner,
    /// Concurrency budget for storms.
    pub concurrency: usize,
    /// Operation count for storms.
    pub iterations: usize,
}

impl SuiteCtx {
    pub fn new(client: ApiClient, concurrency: usize, iterations: usize) -> Self {
        Self {
            client: Arc::new(client),
            provisioner: IdentityProvisioner::new(),
            concurrency,
            iterations,
        }
    }
}

/// All suite names, in run order.
pub const SUITE_NAMES: &[&str] = &["auth", "resources", "hardening"];

/// Run one suite by name. Unknown names return `None`.
pub async fn run_suite(name: &str, ctx: &SuiteCtx) -> Option<SuiteReport> {
    let mut report = SuiteReport::new(name);
    let scenarios = match name {
        "auth" => auth::run(ctx).await,
        "resources" => resources::run(ctx).await,
        "hardening" => hardening::run(ctx).await,
        _ => return None,
    };
    for scenario in scenarios {
        report.push(scenario);
    }
    Some(report)
}

/// Shared tail check applied by every scenario: no 5xx, no diagnostic
/// leak, no rejected operation anywhere in the outcome set.
pub(crate) fn sweep(outcomes: &[Outcome<HttpOutcome>], label: &str) -> Vec<CheckRecord> {
    let violations = scan_outcomes(outcomes, label);
    if violations.is_empty() {
        vec![CheckRecord::passed("no-5xx-no-leak")]
    } else {
        violations
            .into_iter()
            .map(|v| CheckRecord {
                name: "no-5xx-no-leak".to_string(),
                passed: false,
                detail: Some(v.to_string()),
            })
            .collect()
    }
}

/// Static catalog of (suite, scenario id, description) for `gauntlet list`.
pub fn catalog() -> Vec<(&'static str, &'static str, &'static str)> {
    let mut entries = Vec::new();
    for (id, description) in auth::SCENARIOS {
        entries.push(("auth", *id, *description));
    }
    for (id, description) in resources::SCENARIOS {
        entries.push(("resources", *id, *description));
    }
    for (id, description) in hardening::SCENARIOS {
        entries.push(("hardening", *id, *description));
    }
    entries
}
