//! TOML configuration file support.
//!
//! The file layer sits between built-in defaults and environment variables.
//! Every field is optional; unknown keys are rejected so typos fail loudly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// On-disk configuration shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    pub concurrency: Option<u32>,
    pub iterations: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub health_timeout_secs: Option<u64>,
    pub health_poll_interval_ms: Option<u64>,
}

impl ConfigFile {
    /// Load and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// Default config location: `<config dir>/gauntlet/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gauntlet").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(contents.as_bytes()).expect("write");
        (dir, path)
    }

    #[test]
    fn test_load_full_config() {
        let (_dir, path) = write_config(
            r#"
base_url = "http://backend:9000"
concurrency = 32
iterations = 200
request_timeout_secs = 10
health_timeout_secs = 30
health_poll_interval_ms = 100
"#,
        );
        let config = ConfigFile::load(&path).expect("load");
        assert_eq!(config.base_url.as_deref(), Some("http://backend:9000"));
        assert_eq!(config.concurrency, Some(32));
        assert_eq!(config.iterations, Some(200));
        assert_eq!(config.request_timeout_secs, Some(10));
    }

    #[test]
    fn test_load_partial_config() {
        let (_dir, path) = write_config(r#"base_url = "http://backend:9000""#);
        let config = ConfigFile::load(&path).expect("load");
        assert!(config.concurrency.is_none());
        assert!(config.iterations.is_none());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let (_dir, path) = write_config("base_uri = \"typo\"\n");
        let err = ConfigFile::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ConfigFile::load(Path::new("/nonexistent/gauntlet.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
