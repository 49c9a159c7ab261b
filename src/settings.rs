//! Persisted operator preferences
//!
//! The last case id, worker count, and destination are remembered between
//! invocations in a small JSON file. Nothing in the pipeline depends on it;
//! a missing or unreadable file simply yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::clamp_concurrency;

/// Default preferences file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Operator preferences remembered between runs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Last used case id
    #[serde(rename = "case", default = "default_case_id")]
    pub case_id: String,

    /// Last used worker count
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Last used destination root
    #[serde(default = "default_destination")]
    pub destination: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            case_id: default_case_id(),
            threads: default_threads(),
            destination: default_destination(),
        }
    }
}

impl Settings {
    /// Load preferences, falling back to defaults on any failure
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                if path.exists() {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
                }
                Self::default()
            }
        }
    }

    /// Load preferences from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut settings: Settings = serde_json::from_str(&content)?;
        settings.threads = clamp_concurrency(settings.threads);
        Ok(settings)
    }

    /// Save preferences as pretty-printed JSON
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn default_case_id() -> String {
    "CASE001".to_string()
}

fn default_threads() -> usize {
    4
}

fn default_destination() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_or_default(&dir.path().join(SETTINGS_FILE));
        assert_eq!(settings.case_id, "CASE001");
        assert_eq!(settings.threads, 4);
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_or_default(&path), Settings::default());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let settings = Settings {
            case_id: "CASE007".into(),
            threads: 8,
            destination: PathBuf::from("/cases"),
        };
        settings.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""case": "CASE007""#));
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_defaults_and_clamps_threads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{ "case": "CASE2", "threads": 99 }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.case_id, "CASE2");
        assert_eq!(settings.threads, 32);
    }
}
