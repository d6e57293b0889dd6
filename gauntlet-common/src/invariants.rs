//! Reusable invariant checks over HTTP outcomes.
//!
//! Every check is a pure function returning `Result<(), Violation>`, so the
//! no-5xx rule, the leak scan, and the contention policies are enforced the
//! same way at every call site instead of being re-derived per scenario.
//!
//! Classification happens here, after the runner has collected every
//! outcome; nothing upstream discards or swallows results.

use serde::{Deserialize, Serialize};

use crate::client::HttpOutcome;
use crate::runner::Outcome;

/// Bound on body excerpts embedded in violation messages.
const BODY_SNIPPET_LEN: usize = 200;

/// Substrings that mark internal diagnostics leaking into response bodies:
/// stack-trace markers, SQL fragments, ORM/driver exception names, absolute
/// filesystem paths. Matched case-insensitively. Intentionally loose; the
/// point is to catch unanticipated leakage, not to validate a schema.
pub const DIAGNOSTIC_DENYLIST: &[&str] = &[
    "traceback (most recent call last)",
    "stack backtrace:",
    "panicked at",
    "sqlalchemy",
    "psycopg2",
    "asyncpg",
    "integrityerror",
    "operationalerror",
    "programmingerror",
    "syntax error at or near",
    "violates unique constraint",
    "duplicate key value",
    "site-packages",
    ".py\", line",
    "uvicorn.error",
    "starlette.exceptions",
    "/usr/lib/",
    "/var/www/",
    "/home/",
    "/app/",
];

/// A failed invariant, carrying enough context to attribute the failure to
/// the specific operation that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("{label}: server error status {status}: {snippet}")]
    ServerError {
        label: String,
        status: u16,
        snippet: String,
    },

    #[error("{label}: unexpected status {status} (allowed: {allowed:?}): {snippet}")]
    UnexpectedStatus {
        label: String,
        status: u16,
        allowed: Vec<u16>,
        snippet: String,
    },

    /// Reported distinctly from a bad status: the status may have been
    /// correct while the body still leaked internals.
    #[error("{label}: diagnostic leak ({marker:?}) in status {status} body: {snippet}")]
    DiagnosticLeak {
        label: String,
        status: u16,
        marker: String,
        snippet: String,
    },

    #[error("{label}: expected {expected} success(es), observed {observed}")]
    SuccessCount {
        label: String,
        expected: String,
        observed: usize,
    },

    #[error("{label}: statuses not uniform under duplication: {statuses:?}")]
    MixedStatuses { label: String, statuses: Vec<u16> },

    #[error("{label}: operation #{index} rejected: {reason}")]
    RejectedOperation {
        label: String,
        index: usize,
        reason: String,
    },
}

/// How a set of racing operations is allowed to resolve.
///
/// Which policy applies is a property of the operation under test, declared
/// by the scenario rather than re-derived at each assertion site: consuming
/// a one-time resource wants exactly one winner, rotating a refresh token
/// tolerates idempotent retries, a rate-limit storm only has to stay safe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ContentionPolicy {
    /// Exactly one operation succeeds; all others land in `losers`.
    ExactlyOneWinner { losers: Vec<u16> },
    /// At least one operation succeeds; all others land in `losers`.
    AtLeastOneWinner { losers: Vec<u16> },
    /// Every operation returns the same `status`; a mix of success and
    /// conflict marks the operation as not actually idempotent.
    Idempotent { status: u16 },
    /// No winner required; every status must come from `allowed`.
    SafeOnly { allowed: Vec<u16> },
}

/// Status is never in the server-error range. Applied per outcome so a
/// single transient 500 amid many 200s is still caught and attributed.
pub fn check_no_server_error(outcome: &HttpOutcome, label: &str) -> Result<(), Violation> {
    if outcome.status >= 500 {
        return Err(Violation::ServerError {
            label: label.to_string(),
            status: outcome.status,
            snippet: snippet(&outcome.body),
        });
    }
    Ok(())
}

/// Response body carries none of the denylisted diagnostic markers.
pub fn check_no_leak(outcome: &HttpOutcome, label: &str) -> Result<(), Violation> {
    let lowered = outcome.body.to_lowercase();
    for marker in DIAGNOSTIC_DENYLIST {
        if lowered.contains(marker) {
            return Err(Violation::DiagnosticLeak {
                label: label.to_string(),
                status: outcome.status,
                marker: (*marker).to_string(),
                snippet: snippet(&outcome.body),
            });
        }
    }
    Ok(())
}

/// Every outcome completed with a status drawn from `allowed`, and none is
/// a server error. Rejections are violations: transport failures are not
/// assertable data.
pub fn check_statuses(
    outcomes: &[Outcome<HttpOutcome>],
    allowed: &[u16],
    label: &str,
) -> Result<(), Violation> {
    for (index, outcome) in outcomes.iter().enumerate() {
        let http = completed(outcome, index, label)?;
        check_no_server_error(http, label)?;
        if !allowed.contains(&http.status) {
            return Err(Violation::UnexpectedStatus {
                label: format!("{label} #{index}"),
                status: http.status,
                allowed: allowed.to_vec(),
                snippet: snippet(&http.body),
            });
        }
    }
    Ok(())
}

/// Classify an outcome set against a contention policy.
///
/// 5xx statuses are unconditional violations under every policy.
pub fn check_contention(
    outcomes: &[Outcome<HttpOutcome>],
    policy: &ContentionPolicy,
    label: &str,
) -> Result<(), Violation> {
    let mut successes = 0usize;
    let mut statuses = Vec::with_capacity(outcomes.len());

    for (index, outcome) in outcomes.iter().enumerate() {
        let http = completed(outcome, index, label)?;
        check_no_server_error(http, label)?;
        if http.is_success() {
            successes += 1;
        }
        statuses.push((index, http));
    }

    match policy {
        ContentionPolicy::ExactlyOneWinner { losers } => {
            if successes != 1 {
                return Err(Violation::SuccessCount {
                    label: label.to_string(),
                    expected: "exactly 1".to_string(),
                    observed: successes,
                });
            }
            check_losers(&statuses, losers, label)
        }
        ContentionPolicy::AtLeastOneWinner { losers } => {
            if successes == 0 {
                return Err(Violation::SuccessCount {
                    label: label.to_string(),
                    expected: "at least 1".to_string(),
                    observed: successes,
                });
            }
            check_losers(&statuses, losers, label)
        }
        ContentionPolicy::Idempotent { status } => {
            let observed: Vec<u16> = statuses.iter().map(|(_, h)| h.status).collect();
            if observed.iter().any(|s| s != status) {
                return Err(Violation::MixedStatuses {
                    label: label.to_string(),
                    statuses: observed,
                });
            }
            Ok(())
        }
        ContentionPolicy::SafeOnly { allowed } => {
            for (index, http) in &statuses {
                if !allowed.contains(&http.status) {
                    return Err(Violation::UnexpectedStatus {
                        label: format!("{label} #{index}"),
                        status: http.status,
                        allowed: allowed.clone(),
                        snippet: snippet(&http.body),
                    });
                }
            }
            Ok(())
        }
    }
}

/// Collect every violation in a set instead of stopping at the first.
/// Used by scenario reports, which record all failures for one run.
pub fn scan_outcomes(
    outcomes: &[Outcome<HttpOutcome>],
    label: &str,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (index, outcome) in outcomes.iter().enumerate() {
        match outcome {
            Outcome::Completed(http) => {
                let item_label = format!("{label} #{index}");
                if let Err(v) = check_no_server_error(http, &item_label) {
                    violations.push(v);
                }
                if let Err(v) = check_no_leak(http, &item_label) {
                    violations.push(v);
                }
            }
            Outcome::Rejected(rejection) => violations.push(Violation::RejectedOperation {
                label: label.to_string(),
                index,
                reason: rejection.to_string(),
            }),
        }
    }
    violations
}

fn completed<'a>(
    outcome: &'a Outcome<HttpOutcome>,
    index: usize,
    label: &str,
) -> Result<&'a HttpOutcome, Violation> {
    match outcome {
        Outcome::Completed(http) => Ok(http),
        Outcome::Rejected(rejection) => Err(Violation::RejectedOperation {
            label: label.to_string(),
            index,
            reason: rejection.to_string(),
        }),
    }
}

fn check_losers(
    statuses: &[(usize, &HttpOutcome)],
    losers: &[u16],
    label: &str,
) -> Result<(), Violation> {
    for (index, http) in statuses {
        if !http.is_success() && !losers.contains(&http.status) {
            return Err(Violation::UnexpectedStatus {
                label: format!("{label} #{index}"),
                status: http.status,
                allowed: losers.to_vec(),
                snippet: snippet(&http.body),
            });
        }
    }
    Ok(())
}

fn snippet(body: &str) -> String {
    if body.len() <= BODY_SNIPPET_LEN {
        return body.to_string();
    }
    let mut end = BODY_SNIPPET_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
