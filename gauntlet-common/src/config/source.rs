//! Source tracking for configuration values.
//!
//! Every resolved value remembers where it came from so `gauntlet run
//! --verbose` and bug reports can show which layer won.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Which layer produced a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Built-in default.
    Default,
    /// TOML configuration file.
    File,
    /// Environment variable.
    Env,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::File => write!(f, "file"),
            Self::Env => write!(f, "env"),
        }
    }
}

/// A configuration value together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    value: T,
    source: ConfigSource,
    /// Variable name or file path that supplied the value, when not a default.
    origin: Option<String>,
}

impl<T> Sourced<T> {
    pub fn default_value(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::Default,
            origin: None,
        }
    }

    pub fn from_env(value: T, var: impl Into<String>) -> Self {
        Self {
            value,
            source: ConfigSource::Env,
            origin: Some(var.into()),
        }
    }

    pub fn from_file(value: T, path: &Path) -> Self {
        Self {
            value,
            source: ConfigSource::File,
            origin: Some(path.display().to_string()),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn source(&self) -> ConfigSource {
        self.source
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

impl<T: Copy> Sourced<T> {
    pub fn value(&self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_value_has_no_origin() {
        let sourced = Sourced::default_value(8u32);
        assert_eq!(sourced.value(), 8);
        assert_eq!(sourced.source(), ConfigSource::Default);
        assert!(sourced.origin().is_none());
    }

    #[test]
    fn test_env_value_tracks_variable() {
        let sourced = Sourced::from_env(16u32, "GAUNTLET_CONCURRENCY");
        assert_eq!(sourced.source(), ConfigSource::Env);
        assert_eq!(sourced.origin(), Some("GAUNTLET_CONCURRENCY"));
    }

    #[test]
    fn test_file_value_tracks_path() {
        let path = PathBuf::from("/etc/gauntlet/config.toml");
        let sourced = Sourced::from_file("http://x".to_string(), &path);
        assert_eq!(sourced.source(), ConfigSource::File);
        assert_eq!(sourced.origin(), Some("/etc/gauntlet/config.toml"));
    }

    #[test]
    fn test_source_display() {
        assert_eq!(ConfigSource::Default.to_string(), "default");
        assert_eq!(ConfigSource::File.to_string(), "file");
        assert_eq!(ConfigSource::Env.to_string(), "env");
    }
}
