//! Reusable harness core for Gauntlet, a concurrent API invariant tester.
//!
//! The harness drives overlapping HTTP operations against a stateful REST
//! backend and verifies safety invariants over the collected outcomes:
//!
//! - [`client`] — HTTP adapter that treats every status as data
//! - [`identity`] — collision-free isolated login credentials
//! - [`session`] — health-gated login and session rotation helpers
//! - [`runner`] — semaphore-gated scatter-gather with ordered outcomes
//! - [`invariants`] — no-5xx, leak-scan, and contention-policy checks
//! - [`scenario`] — serializable scenario and suite reports
//! - [`config`] — layered file/env configuration with source tracking
//! - [`testing`] — JSONL test logging shared by the test binaries
//!
//! The backend is an opaque black box reached only over HTTP; the harness
//! holds no in-process shared mutable state between operations beyond
//! read-only session data.

pub mod client;
pub mod config;
pub mod errors;
pub mod identity;
pub mod invariants;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod testing;

pub use client::{ApiClient, ClientError, HttpOutcome, Method, RequestSpec};
pub use config::HarnessConfig;
pub use errors::{HarnessError, HarnessResult};
pub use identity::{IdentityProvisioner, IsolatedIdentity, MAX_IDENTITY_LEN};
pub use invariants::{
    ContentionPolicy, Violation, check_contention, check_no_leak, check_no_server_error,
    check_statuses, scan_outcomes,
};
pub use runner::{Outcome, Rejection, run_all, run_repeat};
pub use scenario::{
    CheckRecord, ScenarioReport, ScenarioSpec, ScenarioStatus, SuiteReport, run_scenario,
};
pub use session::{Session, SessionError, login, logout, refresh, wait_until_healthy};
