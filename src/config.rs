use crate::backend::{Latency, DEFAULT_FAILURE_RATE};
use crate::errors::AppResult;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LatencyConfig {
    pub load_ms: u64,
    pub update_ms: u64,
    pub convert_ms: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            load_ms: 800,
            update_ms: 1_000,
            convert_ms: 1_000,
        }
    }
}

impl From<&LatencyConfig> for Latency {
    fn from(value: &LatencyConfig) -> Self {
        Self {
            load: Duration::from_millis(value.load_ms),
            update: Duration::from_millis(value.update_ms),
            convert: Duration::from_millis(value.convert_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub fixture_path: PathBuf,
    /// In-memory preferences when unset.
    pub preferences_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub failure_rate: f64,
    pub latency: LatencyConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            fixture_path: PathBuf::from("leads.json"),
            preferences_path: None,
            log_dir: None,
            failure_rate: DEFAULT_FAILURE_RATE,
            latency: LatencyConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn from_yaml_str(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Self = serde_yaml::from_str(raw)?;
        config.failure_rate = normalize_failure_rate(config.failure_rate);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading store config {}", path.display()))?;
        Self::from_yaml_str(&raw)
    }

    pub fn latency(&self) -> Latency {
        Latency::from(&self.latency)
    }

    /// Explicit `logDir`, otherwise `logs/` next to the preferences database.
    /// `None` when both are unset, i.e. a fully in-memory setup.
    pub fn resolved_log_dir(&self) -> Option<PathBuf> {
        if let Some(log_dir) = &self.log_dir {
            return Some(log_dir.clone());
        }
        self.preferences_path
            .as_deref()
            .and_then(Path::parent)
            .map(|data_dir| data_dir.join("logs"))
    }
}

fn normalize_failure_rate(raw: f64) -> f64 {
    if raw.is_nan() {
        return DEFAULT_FAILURE_RATE;
    }
    raw.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::StoreConfig;
    use crate::errors::AppError;
    use std::path::PathBuf;
    use tokio::time::Duration;

    #[test]
    fn empty_document_uses_defaults() {
        let config = StoreConfig::from_yaml_str("").expect("config");
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.latency().load, Duration::from_millis(800));
        assert_eq!(config.failure_rate, 0.1);
    }

    #[test]
    fn partial_document_keeps_remaining_defaults() {
        let config = StoreConfig::from_yaml_str(
            "fixturePath: data/leads.json\nfailureRate: 3.5\nlatency:\n  loadMs: 0\n  updateMs: 5\n  convertMs: 5\n",
        )
        .expect("config");
        assert_eq!(config.fixture_path, PathBuf::from("data/leads.json"));
        assert_eq!(config.failure_rate, 1.0);
        assert_eq!(config.latency().update, Duration::from_millis(5));
        assert!(config.preferences_path.is_none());
    }

    #[test]
    fn log_dir_follows_preferences_location() {
        let mut config = StoreConfig::default();
        assert!(config.resolved_log_dir().is_none());

        config.preferences_path = Some(PathBuf::from("/var/lib/lead-desk/prefs.sqlite"));
        assert_eq!(
            config.resolved_log_dir(),
            Some(PathBuf::from("/var/lib/lead-desk/logs"))
        );

        config.log_dir = Some(PathBuf::from("/tmp/lead-desk-logs"));
        assert_eq!(config.resolved_log_dir(), Some(PathBuf::from("/tmp/lead-desk-logs")));
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = StoreConfig::from_file(&dir.path().join("absent.yaml")).expect_err("missing");
        assert!(matches!(err, AppError::Internal(ref message) if message.contains("absent.yaml")));
    }
}
