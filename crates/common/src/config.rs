//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Harness configuration, loaded from `pageprobe.toml` when present
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the page under test
    pub base_url: String,

    /// Browser launch settings
    pub browser: BrowserSettings,

    /// Probe timing
    pub probe: ProbeSettings,

    /// Reachability check settings
    pub reach: ReachSettings,

    /// Where results and screenshots go
    pub output: OutputSettings,

    /// Optional static-site server to spawn before running
    pub server: Option<ServerSettings>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            browser: BrowserSettings::default(),
            probe: ProbeSettings::default(),
            reach: ReachSettings::default(),
            output: OutputSettings::default(),
            server: None,
        }
    }
}

/// How browser instances map onto scenarios
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// Fresh browser per scenario
    #[default]
    PerScenario,
    /// One browser for the run, fresh page per scenario
    Shared,
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,

    /// Pass `--no-sandbox` (needed in most containers)
    pub no_sandbox: bool,

    /// Explicit Chrome/Chromium executable
    pub chrome_path: Option<PathBuf>,

    pub window_width: u32,
    pub window_height: u32,

    pub isolation: Isolation,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            no_sandbox: true,
            chrome_path: None,
            window_width: 1280,
            window_height: 720,
            isolation: Isolation::PerScenario,
        }
    }
}

/// Probe timing, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Upper bound for a page navigation
    pub navigation_timeout_ms: u64,

    /// Upper bound for an interaction target to appear
    pub step_timeout_ms: u64,

    /// Interval between readiness checks
    pub poll_interval_ms: u64,

    /// Default upper bound for a readiness condition
    pub condition_timeout_ms: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            step_timeout_ms: 5_000,
            poll_interval_ms: 250,
            condition_timeout_ms: 20_000,
        }
    }
}

impl ProbeSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn condition_timeout(&self) -> Duration {
        Duration::from_millis(self.condition_timeout_ms)
    }
}

/// Reachability check settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachSettings {
    /// Per-request timeout
    pub timeout_ms: u64,
}

impl Default for ReachSettings {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl ReachSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory for `test-results.json` and screenshots
    pub dir: PathBuf,

    /// Save screenshots for scenarios that request them
    pub screenshots: bool,

    /// Write `test-results.json` after each run
    pub write_results: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("test-results"),
            screenshots: true,
            write_results: true,
        }
    }
}

impl OutputSettings {
    pub fn screenshot_dir(&self) -> PathBuf {
        self.dir.join("screenshots")
    }
}

/// Static-site server spawned for the page under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Program and arguments, e.g. `["python3", "-m", "http.server", "8000"]`
    pub command: Vec<String>,

    /// Working directory for the command
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Path polled until it answers with a success status
    #[serde(default = "default_health_path")]
    pub health_path: String,

    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
}

fn default_health_path() -> String {
    "/".to_string()
}

fn default_startup_timeout_ms() -> u64 {
    15_000
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "base_url must be http(s): {}",
                self.base_url
            )));
        }
        if self.probe.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("probe.poll_interval_ms must be > 0".to_string()));
        }
        if self.probe.poll_interval_ms > self.probe.condition_timeout_ms {
            return Err(Error::InvalidConfig(
                "probe.poll_interval_ms exceeds probe.condition_timeout_ms".to_string(),
            ));
        }
        if let Some(server) = &self.server {
            if server.command.is_empty() {
                return Err(Error::InvalidConfig("server.command is empty".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.probe.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.browser.isolation, Isolation::PerScenario);
        assert!(config.server.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.reach.timeout_ms, 10_000);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = HarnessConfig::from_toml(
            r#"
base_url = "http://127.0.0.1:8080"

[probe]
poll_interval_ms = 100

[browser]
isolation = "shared"

[server]
command = ["python3", "-m", "http.server", "8080"]
"#,
        )
        .unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.probe.poll_interval_ms, 100);
        assert_eq!(config.probe.step_timeout_ms, 5_000);
        assert_eq!(config.browser.isolation, Isolation::Shared);
        let server = config.server.unwrap();
        assert_eq!(server.health_path, "/");
        assert_eq!(server.startup_timeout_ms, 15_000);
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let err = HarnessConfig::from_toml("[probe]\npoll_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/pageprobe.toml");
        let mut config = HarnessConfig::default();
        config.output.screenshots = false;
        config.save(&path).unwrap();

        let loaded = HarnessConfig::load(&path).unwrap();
        assert!(!loaded.output.screenshots);
    }
}
