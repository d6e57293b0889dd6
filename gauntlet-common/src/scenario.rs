//! Scenario specs and machine-readable run reports.
//!
//! A scenario is one named composition of provisioner, runner, and
//! invariant checks. Reports are serializable so CI can archive and diff
//! them; the schema version gates consumers against silent shape drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::errors::HarnessError;
use crate::invariants::Violation;

/// Bumped whenever the report shape changes.
pub const REPORT_SCHEMA_VERSION: &str = "1";

/// Static description of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub id: String,
    pub description: String,
    /// Concurrency budget handed to the runner.
    pub concurrency: usize,
    /// Operation count for storm-style scenarios.
    pub iterations: usize,
}

impl ScenarioSpec {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            concurrency: 8,
            iterations: 20,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }
}

/// Terminal state of one scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    Skipped,
}

impl std::fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// One invariant application within a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckRecord {
    /// Record a check from its invariant result.
    pub fn from_result(name: impl Into<String>, result: Result<(), Violation>) -> Self {
        match result {
            Ok(()) => Self {
                name: name.into(),
                passed: true,
                detail: None,
            },
            Err(violation) => Self {
                name: name.into(),
                passed: false,
                detail: Some(violation.to_string()),
            },
        }
    }

    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: None,
        }
    }
}

/// Result of one scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub schema_version: String,
    pub id: String,
    pub status: ScenarioStatus,
    pub checks: Vec<CheckRecord>,
    /// Hard failures (transport, session setup) outside any single check.
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl ScenarioReport {
    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckRecord> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Aggregate of every scenario in one suite invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub schema_version: String,
    pub suite: String,
    pub started_at: DateTime<Utc>,
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            suite: suite.into(),
            started_at: Utc::now(),
            scenarios: Vec::new(),
        }
    }

    pub fn push(&mut self, report: ScenarioReport) {
        self.scenarios.push(report);
    }

    pub fn all_passed(&self) -> bool {
        self.scenarios
            .iter()
            .all(|s| s.status != ScenarioStatus::Failed)
    }

    pub fn failed_count(&self) -> usize {
        self.scenarios
            .iter()
            .filter(|s| s.status == ScenarioStatus::Failed)
            .count()
    }
}

/// Time a scenario body and classify its result.
///
/// The body returns its check records; a hard error (transport failure,
/// session setup) fails the scenario without discarding checks already
/// recorded elsewhere. A failed scenario never aborts the suite — the
/// caller decides what to do with the report.
pub async fn run_scenario<F, Fut>(spec: &ScenarioSpec, body: F) -> ScenarioReport
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<CheckRecord>, HarnessError>>,
{
    let started = Instant::now();
    let (status, checks, errors) = match body().await {
        Ok(checks) => {
            let status = if checks.iter().all(|c| c.passed) {
                ScenarioStatus::Passed
            } else {
                ScenarioStatus::Failed
            };
            (status, checks, Vec::new())
        }
        Err(error) => (ScenarioStatus::Failed, Vec::new(), vec![error.to_string()]),
    };

    ScenarioReport {
        schema_version: REPORT_SCHEMA_VERSION.to_string(),
        id: spec.id.clone(),
        status,
        checks,
        errors,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::Violation;

    fn spec() -> ScenarioSpec {
        ScenarioSpec::new("demo", "demo scenario")
            .with_concurrency(4)
            .with_iterations(10)
    }

    #[tokio::test]
    async fn test_all_checks_passing_yields_passed() {
        let report = run_scenario(&spec(), || async {
            Ok(vec![CheckRecord::passed("a"), CheckRecord::passed("b")])
        })
        .await;
        assert_eq!(report.status, ScenarioStatus::Passed);
        assert_eq!(report.checks.len(), 2);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_failed_check_yields_failed() {
        let violation = Violation::SuccessCount {
            label: "race".to_string(),
            expected: "exactly 1".to_string(),
            observed: 2,
        };
        let report = run_scenario(&spec(), || async {
            Ok(vec![CheckRecord::from_result("winner", Err(violation))])
        })
        .await;
        assert_eq!(report.status, ScenarioStatus::Failed);
        assert_eq!(report.failed_checks().count(), 1);
    }

    #[tokio::test]
    async fn test_hard_error_yields_failed_with_error() {
        let report = run_scenario(&spec(), || async {
            Err(HarnessError::Setup("backend unreachable".to_string()))
        })
        .await;
        assert_eq!(report.status, ScenarioStatus::Failed);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("backend unreachable"));
    }

    #[test]
    fn test_suite_report_aggregation() {
        let mut suite = SuiteReport::new("auth");
        suite.push(ScenarioReport {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            id: "a".to_string(),
            status: ScenarioStatus::Passed,
            checks: Vec::new(),
            errors: Vec::new(),
            duration_ms: 1,
        });
        assert!(suite.all_passed());
        suite.push(ScenarioReport {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            id: "b".to_string(),
            status: ScenarioStatus::Failed,
            checks: Vec::new(),
            errors: Vec::new(),
            duration_ms: 1,
        });
        assert!(!suite.all_passed());
        assert_eq!(suite.failed_count(), 1);
    }

    #[test]
    fn test_report_serialization_round_trip() {
        let report = ScenarioReport {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            id: "roundtrip".to_string(),
            status: ScenarioStatus::Skipped,
            checks: vec![CheckRecord::passed("x")],
            errors: Vec::new(),
            duration_ms: 7,
        };
        let json = serde_json::to_string(&report).expect("serialize");
        let back: ScenarioReport = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, report);
    }
}
