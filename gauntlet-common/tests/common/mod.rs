//! Shared helpers for harness E2E tests against the reference mock backend.

// Not every test binary uses every helper.
#![allow(dead_code)]

use gauntlet_common::ApiClient;
use gauntlet_mockapi::MockApiConfig;

/// Environment variable to override storm iteration counts.
///
/// Defaults are sized for smoke runs; nightly jobs can set this to a few
/// hundred for heavier contention.
pub const STORM_ITERATIONS_ENV: &str = "GAUNTLET_E2E_STORM_ITERATIONS";

const SMOKE_ITERATIONS: usize = 20;

#[ctor::ctor]
fn setup() {
    gauntlet_common::testing::init_global_test_logging();
}

/// Storm iteration count from the environment or the smoke default.
pub fn storm_iterations() -> usize {
    std::env::var(STORM_ITERATIONS_ENV)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(SMOKE_ITERATIONS)
}

/// Spawn a mock backend and return a client bound to it.
pub async fn spawn_backend(config: MockApiConfig) -> ApiClient {
    let (addr, _handle) = gauntlet_mockapi::spawn(config).await.expect("spawn mock");
    ApiClient::new(format!("http://{addr}")).expect("client")
}

/// Spawn a mock backend with default behavior.
pub async fn spawn_default_backend() -> ApiClient {
    spawn_backend(MockApiConfig::default()).await
}
