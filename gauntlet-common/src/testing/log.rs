//! Structured test logging for CI debugging.
//!
//! Provides JSONL output for test execution to make debugging failed
//! scenario runs easier. Call `init_global_test_logging()` once in your
//! test setup:
//!
//! ```ignore
//! #[ctor::ctor]
//! fn setup() {
//!     gauntlet_common::testing::init_global_test_logging();
//! }
//! ```
//!
//! Output goes to `target/test-logs/all_tests.jsonl` (override with
//! `GAUNTLET_TEST_LOG_FILE`) plus a human-readable stderr layer. The level
//! filter defaults to `info` (`GAUNTLET_TEST_LOG_LEVEL`).

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Mutex, Once};

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;

static GLOBAL_LOGGING_INIT: Once = Once::new();

/// Initialize global JSONL logging for all tests.
///
/// Safe to call multiple times - initialization only happens once.
pub fn init_global_test_logging() {
    GLOBAL_LOGGING_INIT.call_once(|| {
        let log_file = create_global_log_file();

        let file_layer = log_file.map(|file| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(Mutex::new(file))
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
        });

        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_level(true)
            .compact();

        let level =
            std::env::var("GAUNTLET_TEST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let filter = tracing_subscriber::EnvFilter::try_new(format!(
            "gauntlet={level},gauntlet_common={level},gauntlet_mockapi={level}"
        ))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let registry = tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer);

        // Ignore a failed init: another harness may already own the global
        // subscriber in this process.
        if let Some(file_layer) = file_layer {
            let _ = registry.with(file_layer).try_init();
        } else {
            let _ = registry.try_init();
        }
    });
}

fn create_global_log_file() -> Option<File> {
    let path = match std::env::var("GAUNTLET_TEST_LOG_FILE") {
        Ok(explicit) if !explicit.trim().is_empty() => PathBuf::from(explicit),
        _ => {
            let dir = PathBuf::from("target").join("test-logs");
            std::fs::create_dir_all(&dir).ok()?;
            dir.join("all_tests.jsonl")
        }
    };
    File::create(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_global_test_logging();
        init_global_test_logging();
        tracing::info!("logging initialized twice without panic");
    }
}
