//! Configuration loading and store factory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examguard_core::clock::duration_millis;
use examguard_core::monitor::{MonitorConfig, DEFAULT_DEBOUNCE, DEFAULT_MAX_VIOLATIONS};
use examguard_core::session::SessionConfig;
use examguard_core::traits::AttemptSink;

use crate::json::JsonFileStore;
use crate::memory::MemoryStore;

/// `[proctoring]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctoringSection {
    /// Violations that force submission. Must be at least 1.
    pub max_violations: usize,
    /// Minimum spacing between two recorded violations.
    pub debounce_ms: u64,
    /// Pause between the threshold and the forced submission.
    pub forced_submit_delay_ms: u64,
    pub require_fullscreen: bool,
}

impl Default for ProctoringSection {
    fn default() -> Self {
        Self {
            max_violations: DEFAULT_MAX_VIOLATIONS,
            debounce_ms: duration_millis(DEFAULT_DEBOUNCE),
            forced_submit_delay_ms: 2000,
            require_fullscreen: true,
        }
    }
}

/// `[store]` section: where completed attempts go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Keep attempts in memory for the life of the process.
    Memory,
    /// One JSON file per attempt under `dir`.
    Json {
        #[serde(default = "default_store_dir")]
        dir: PathBuf,
    },
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./examguard-attempts")
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Json {
            dir: default_store_dir(),
        }
    }
}

/// Top-level examguard configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamguardConfig {
    #[serde(default)]
    pub proctoring: ProctoringSection,
    #[serde(default)]
    pub store: StoreConfig,
}

impl ExamguardConfig {
    /// Session settings described by the `[proctoring]` section.
    pub fn to_session_config(&self) -> SessionConfig {
        let p = &self.proctoring;
        SessionConfig {
            max_violations: p.max_violations,
            forced_submit_delay: Duration::from_millis(p.forced_submit_delay_ms),
            monitor: MonitorConfig {
                debounce: Duration::from_millis(p.debounce_ms),
                require_fullscreen: p.require_fullscreen,
            },
        }
    }

    /// Reject settings the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.proctoring.max_violations == 0 {
            anyhow::bail!("proctoring.max_violations must be at least 1");
        }
        Ok(())
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examguard.toml` in the current directory
/// 2. `~/.config/examguard/config.toml`
///
/// Environment variable overrides: `EXAMGUARD_MAX_VIOLATIONS`, `EXAMGUARD_STORE_DIR`.
pub fn load_config() -> Result<ExamguardConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamguardConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examguard.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamguardConfig::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;

    tracing::debug!(
        path = ?config_path,
        max_violations = config.proctoring.max_violations,
        store = ?config.store,
        "configuration loaded"
    );
    Ok(config)
}

/// Parse and resolve a config document without touching the filesystem.
pub fn parse_config(content: &str) -> Result<ExamguardConfig> {
    let mut config: ExamguardConfig = toml::from_str(content)?;
    if let StoreConfig::Json { dir } = &mut config.store {
        *dir = PathBuf::from(resolve_env_vars(&dir.to_string_lossy()));
    }
    Ok(config)
}

fn apply_overrides(
    config: &mut ExamguardConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(max) = lookup("EXAMGUARD_MAX_VIOLATIONS") {
        config.proctoring.max_violations = max
            .trim()
            .parse()
            .with_context(|| format!("invalid EXAMGUARD_MAX_VIOLATIONS: {max:?}"))?;
    }
    if let Some(dir) = lookup("EXAMGUARD_STORE_DIR") {
        config.store = StoreConfig::Json {
            dir: PathBuf::from(dir),
        };
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examguard"))
}

/// Create a store instance from its configuration.
pub fn create_store(config: &StoreConfig) -> Box<dyn AttemptSink> {
    match config {
        StoreConfig::Memory => Box::new(MemoryStore::new()),
        StoreConfig::Json { dir } => Box::new(JsonFileStore::new(dir)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_EXAMGUARD_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_EXAMGUARD_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_EXAMGUARD_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${unterminated"), "${unterminated");
        std::env::remove_var("_EXAMGUARD_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = ExamguardConfig::default();
        assert_eq!(config.proctoring.max_violations, 3);
        assert_eq!(config.proctoring.debounce_ms, 1000);
        assert_eq!(config.proctoring.forced_submit_delay_ms, 2000);
        assert!(config.proctoring.require_fullscreen);
        assert!(matches!(config.store, StoreConfig::Json { .. }));
        config.validate().unwrap();
    }

    #[test]
    fn parse_full_config() {
        let config = parse_config(
            r#"
[proctoring]
max_violations = 5
debounce_ms = 250
forced_submit_delay_ms = 0
require_fullscreen = false

[store]
kind = "memory"
"#,
        )
        .unwrap();
        assert_eq!(config.store, StoreConfig::Memory);

        let session = config.to_session_config();
        assert_eq!(session.max_violations, 5);
        assert_eq!(session.forced_submit_delay, Duration::ZERO);
        assert_eq!(session.monitor.debounce, Duration::from_millis(250));
        assert!(!session.monitor.require_fullscreen);
    }

    #[test]
    fn partial_sections_use_defaults() {
        let config =
            parse_config("[proctoring]\nmax_violations = 2\n\n[store]\nkind = \"json\"\n")
                .unwrap();
        assert_eq!(config.proctoring.max_violations, 2);
        assert_eq!(config.proctoring.debounce_ms, 1000);
        assert_eq!(
            config.store,
            StoreConfig::Json {
                dir: PathBuf::from("./examguard-attempts")
            }
        );
    }

    #[test]
    fn zero_max_violations_is_rejected() {
        let config = parse_config("[proctoring]\nmax_violations = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("EXAMGUARD_MAX_VIOLATIONS", "7"),
            ("EXAMGUARD_STORE_DIR", "/tmp/attempts"),
        ]
        .into_iter()
        .collect();
        let mut config = parse_config("[store]\nkind = \"memory\"\n").unwrap();
        apply_overrides(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.proctoring.max_violations, 7);
        assert_eq!(
            config.store,
            StoreConfig::Json {
                dir: PathBuf::from("/tmp/attempts")
            }
        );

        let mut config = ExamguardConfig::default();
        let bad = apply_overrides(&mut config, |k| {
            (k == "EXAMGUARD_MAX_VIOLATIONS").then(|| "many".to_string())
        });
        assert!(bad.is_err());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("examguard.toml");
        std::fs::write(&path, "[proctoring]\nforced_submit_delay_ms = 500\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.proctoring.forced_submit_delay_ms, 500);
    }

    #[test]
    fn create_store_names() {
        assert_eq!(create_store(&StoreConfig::Memory).name(), "memory");
        assert_eq!(create_store(&StoreConfig::default()).name(), "json");
    }
}
