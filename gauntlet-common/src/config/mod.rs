//! Configuration system for Gauntlet.
//!
//! Three layers, later layers winning: built-in defaults, an optional TOML
//! file, and `GAUNTLET_*` environment variables. Values carry their source
//! for diagnostics; parse errors accumulate and are reported together.

pub mod env;
pub mod file;
pub mod source;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use env::{EnvError, EnvParser};
pub use file::ConfigFile;
pub use source::{ConfigSource, Sourced};

/// Default backend base URL (the mock backend's default port).
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8900";

/// Default concurrency budget for scenario storms.
pub const DEFAULT_CONCURRENCY: u32 = 8;

/// Default iteration count for storm-style scenarios.
pub const DEFAULT_ITERATIONS: u32 = 20;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 60;
const DEFAULT_HEALTH_POLL_INTERVAL_MS: u64 = 250;

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("invalid environment configuration: {}", format_env_errors(.0))]
    Env(Vec<EnvError>),
}

fn format_env_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fully resolved harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub base_url: Sourced<String>,
    pub concurrency: Sourced<u32>,
    pub iterations: Sourced<u32>,
    pub request_timeout_secs: Sourced<u64>,
    pub health_timeout_secs: Sourced<u64>,
    pub health_poll_interval_ms: Sourced<u64>,
}

impl HarnessConfig {
    /// Load configuration: defaults, then the default config file when it
    /// exists, then environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let default_path = ConfigFile::default_path().filter(|p| p.exists());
        Self::load_with(default_path.as_deref())
    }

    /// Load configuration with an explicit file path. The file must exist
    /// when a path is given; `None` skips the file layer.
    pub fn load_with(file_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (file, file_origin) = match file_path {
            Some(path) => (ConfigFile::load(path)?, Some(path)),
            None => (ConfigFile::default(), None),
        };

        let from_file = |value: Option<String>, default: &str| match (value, file_origin) {
            (Some(v), Some(path)) => Sourced::from_file(v, path),
            _ => Sourced::default_value(default.to_string()),
        };
        let from_file_u32 = |value: Option<u32>, default: u32| match (value, file_origin) {
            (Some(v), Some(path)) => Sourced::from_file(v, path),
            _ => Sourced::default_value(default),
        };
        let from_file_u64 = |value: Option<u64>, default: u64| match (value, file_origin) {
            (Some(v), Some(path)) => Sourced::from_file(v, path),
            _ => Sourced::default_value(default),
        };

        let mut parser = EnvParser::new();
        let config = Self {
            base_url: parser.get_string(
                "BASE_URL",
                from_file(file.base_url, DEFAULT_BASE_URL),
            ),
            concurrency: parser.get_u32_range(
                "CONCURRENCY",
                from_file_u32(file.concurrency, DEFAULT_CONCURRENCY),
                1,
                512,
            ),
            iterations: parser.get_u32_range(
                "ITERATIONS",
                from_file_u32(file.iterations, DEFAULT_ITERATIONS),
                1,
                100_000,
            ),
            request_timeout_secs: parser.get_u64_range(
                "REQUEST_TIMEOUT_SECS",
                from_file_u64(file.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS),
                1,
                600,
            ),
            health_timeout_secs: parser.get_u64_range(
                "HEALTH_TIMEOUT_SECS",
                from_file_u64(file.health_timeout_secs, DEFAULT_HEALTH_TIMEOUT_SECS),
                1,
                600,
            ),
            health_poll_interval_ms: parser.get_u64_range(
                "HEALTH_POLL_INTERVAL_MS",
                from_file_u64(file.health_poll_interval_ms, DEFAULT_HEALTH_POLL_INTERVAL_MS),
                10,
                10_000,
            ),
        };

        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.value())
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs.value())
    }

    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms.value())
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_gauntlet_env() {
        for name in [
            "GAUNTLET_BASE_URL",
            "GAUNTLET_CONCURRENCY",
            "GAUNTLET_ITERATIONS",
            "GAUNTLET_REQUEST_TIMEOUT_SECS",
            "GAUNTLET_HEALTH_TIMEOUT_SECS",
            "GAUNTLET_HEALTH_POLL_INTERVAL_MS",
        ] {
            // SAFETY: Tests control env var lifecycle and run serially.
            unsafe { std::env::remove_var(name) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_file_or_env() {
        clear_gauntlet_env();
        let config = HarnessConfig::load_with(None).expect("load");
        assert_eq!(config.base_url.get(), DEFAULT_BASE_URL);
        assert_eq!(config.concurrency.value(), DEFAULT_CONCURRENCY);
        assert_eq!(config.iterations.value(), DEFAULT_ITERATIONS);
        assert_eq!(config.base_url.source(), ConfigSource::Default);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_file_layer_overrides_defaults() {
        clear_gauntlet_env();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(file, "base_url = \"http://backend:9000\"").expect("write");
        writeln!(file, "concurrency = 32").expect("write");

        let config = HarnessConfig::load_with(Some(&path)).expect("load");
        assert_eq!(config.base_url.get(), "http://backend:9000");
        assert_eq!(config.base_url.source(), ConfigSource::File);
        assert_eq!(config.concurrency.value(), 32);
        // Untouched fields stay defaults.
        assert_eq!(config.iterations.value(), DEFAULT_ITERATIONS);
        assert_eq!(config.iterations.source(), ConfigSource::Default);
    }

    #[test]
    #[serial]
    fn test_env_layer_overrides_file() {
        clear_gauntlet_env();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "concurrency = 32\n").expect("write");

        // SAFETY: Tests control env var lifecycle and run serially.
        unsafe { std::env::set_var("GAUNTLET_CONCURRENCY", "4") };
        let config = HarnessConfig::load_with(Some(&path)).expect("load");
        assert_eq!(config.concurrency.value(), 4);
        assert_eq!(config.concurrency.source(), ConfigSource::Env);
        clear_gauntlet_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_is_an_error() {
        clear_gauntlet_env();
        // SAFETY: Tests control env var lifecycle and run serially.
        unsafe { std::env::set_var("GAUNTLET_ITERATIONS", "lots") };
        let err = HarnessConfig::load_with(None).unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
        clear_gauntlet_env();
    }
}
