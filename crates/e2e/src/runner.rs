//! Scenario runner: resolves input, probes each scenario, checks content

use chrono::{DateTime, Utc};
use pageprobe_common::config::{HarnessConfig, Isolation};
use pageprobe_common::{FailureKind, Status, Tally};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::driver::{BrowserLauncher, BrowserSession, PageDriver};
use crate::error::E2eResult;
use crate::probe::{PageProbe, ProbeConfig, ProbeOutcome, ProbeRequest};
use crate::spec::ScenarioSpec;

/// Characters of page text kept in each result
const EXCERPT_CHARS: usize = 300;

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub status: Status,
    pub duration_ms: u64,

    /// Whether the probe reached its readiness condition
    pub reached: bool,

    pub matched: Vec<String>,
    pub missing: Vec<String>,
    pub forbidden_found: Vec<String>,

    /// Informational substrings seen and not seen; never affect the status
    #[serde(default)]
    pub notes_found: Vec<String>,
    #[serde(default)]
    pub notes_missing: Vec<String>,

    /// Matches needed under the scenario policy
    pub required: usize,
    pub total_checks: usize,

    pub failure: Option<FailureKind>,
    pub error: Option<String>,
    pub skip_reason: Option<String>,

    #[serde(default)]
    pub page_errors: Vec<String>,
    pub snapshot_excerpt: Option<String>,
    pub screenshot: Option<PathBuf>,
}

impl ScenarioResult {
    fn empty(spec: &ScenarioSpec, status: Status) -> Self {
        Self {
            name: spec.name.clone(),
            status,
            duration_ms: 0,
            reached: false,
            matched: Vec::new(),
            missing: Vec::new(),
            forbidden_found: Vec::new(),
            notes_found: Vec::new(),
            notes_missing: Vec::new(),
            required: spec.policy.required(spec.checks.len()),
            total_checks: spec.checks.len(),
            failure: None,
            error: None,
            skip_reason: None,
            page_errors: Vec::new(),
            snapshot_excerpt: None,
            screenshot: None,
        }
    }

    /// Scenario not run because its input is unavailable
    pub fn skipped(spec: &ScenarioSpec, reason: String) -> Self {
        Self {
            failure: Some(FailureKind::EnvironmentMissing),
            skip_reason: Some(reason),
            ..Self::empty(spec, Status::Skipped)
        }
    }

    fn harness_failure(spec: &ScenarioSpec, message: String, duration_ms: u64) -> Self {
        Self {
            duration_ms,
            failure: Some(FailureKind::Harness),
            error: Some(message),
            ..Self::empty(spec, Status::Failed)
        }
    }

    fn from_outcome(spec: &ScenarioSpec, outcome: ProbeOutcome, duration_ms: u64) -> Self {
        let text = outcome
            .snapshot
            .as_ref()
            .map(|s| s.text.as_str())
            .unwrap_or_default();
        let report = evaluate_checks(text, spec);
        report.log_missing(&spec.name);

        let mut result = Self {
            duration_ms,
            reached: outcome.reached,
            matched: report.matched.clone(),
            missing: report.missing.clone(),
            forbidden_found: report.forbidden_found.clone(),
            notes_found: report.notes_found.clone(),
            notes_missing: report.notes_missing.clone(),
            required: report.required,
            total_checks: report.total,
            page_errors: outcome
                .snapshot
                .as_ref()
                .map(|s| s.page_errors.clone())
                .unwrap_or_default(),
            snapshot_excerpt: outcome.snapshot.as_ref().map(|s| s.excerpt(EXCERPT_CHARS)),
            ..Self::empty(spec, Status::Passed)
        };

        if let Some(failure) = outcome.failure {
            result.status = Status::Failed;
            result.failure = Some(failure.kind());
            result.error = Some(failure.to_string());
        } else if !report.passed {
            result.status = Status::Failed;
            result.failure = Some(FailureKind::ContentMismatch);
            result.error = Some(report.summary());
        }

        result
    }

    pub fn passed(&self) -> bool {
        self.status == Status::Passed
    }
}

/// Result of running a list of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    #[serde(flatten)]
    pub tally: Tally,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn from_results(results: Vec<ScenarioResult>, duration_ms: u64) -> Self {
        let tally = results.iter().map(|r| r.status).collect();
        Self {
            tally,
            duration_ms,
            finished_at: Utc::now(),
            results,
        }
    }

    /// No failures and at least one scenario actually ran
    pub fn success(&self) -> bool {
        self.tally.success()
    }

    /// Scenarios that failed because the harness could not run them
    pub fn harness_failures(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.failure == Some(FailureKind::Harness))
            .count()
    }

    /// Write `test-results.json` into `dir`
    pub fn write_json(&self, dir: &Path) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join("test-results.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Outcome of matching expected substrings against page text
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    pub forbidden_found: Vec<String>,
    pub notes_found: Vec<String>,
    pub notes_missing: Vec<String>,
    pub required: usize,
    pub total: usize,
    pub passed: bool,
}

impl CheckReport {
    pub fn summary(&self) -> String {
        if !self.forbidden_found.is_empty() {
            format!("forbidden text present: {}", self.forbidden_found.join(", "))
        } else {
            format!(
                "matched {} of {} checks (need {}); missing: {}",
                self.matched.len(),
                self.total,
                self.required,
                self.missing.join(", ")
            )
        }
    }

    fn log_missing(&self, scenario: &str) {
        for text in &self.missing {
            warn!("{}: missing '{}'", scenario, text);
        }
        for text in &self.forbidden_found {
            warn!("{}: found forbidden '{}'", scenario, text);
        }
        for text in &self.notes_missing {
            info!("{}: not shown '{}'", scenario, text);
        }
    }
}

/// Match the scenario's checks and forbidden substrings against `text`
pub fn evaluate_checks(text: &str, spec: &ScenarioSpec) -> CheckReport {
    let (matched, missing): (Vec<_>, Vec<_>) =
        spec.checks.iter().partition(|check| text.contains(check.text.as_str()));

    for check in &matched {
        debug!("{}: found '{}'", spec.name, check.label());
    }

    let forbidden_found: Vec<String> = spec
        .forbidden
        .iter()
        .filter(|f| text.contains(f.as_str()))
        .cloned()
        .collect();

    let (notes_found, notes_missing): (Vec<_>, Vec<_>) =
        spec.notes.iter().partition(|note| text.contains(note.text.as_str()));

    let total = spec.checks.len();
    let required = spec.policy.required(total);
    let passed = matched.len() >= required && forbidden_found.is_empty();

    CheckReport {
        matched: matched.into_iter().map(|c| c.text.clone()).collect(),
        missing: missing.into_iter().map(|c| c.text.clone()).collect(),
        forbidden_found,
        notes_found: notes_found.into_iter().map(|c| c.text.clone()).collect(),
        notes_missing: notes_missing.into_iter().map(|c| c.text.clone()).collect(),
        required,
        total,
        passed,
    }
}

/// Configuration for the scenario runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: String,
    pub probe: ProbeConfig,
    pub isolation: Isolation,
    pub output_dir: PathBuf,

    /// Save screenshots for scenarios that name one
    pub screenshots: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from(&HarnessConfig::default())
    }
}

impl From<&HarnessConfig> for RunnerConfig {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            probe: ProbeConfig::from(&config.probe),
            isolation: config.browser.isolation,
            output_dir: config.output.dir.clone(),
            screenshots: config.output.screenshots,
        }
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Runs scenarios one after another against a browser
pub struct ScenarioRunner {
    launcher: Box<dyn BrowserLauncher>,
    config: RunnerConfig,
    probe: PageProbe,
    env: EnvLookup,
}

impl ScenarioRunner {
    pub fn new(launcher: Box<dyn BrowserLauncher>, config: RunnerConfig) -> Self {
        let probe = PageProbe::new(config.probe.clone());
        Self {
            launcher,
            config,
            probe,
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Replace the process environment as the source of scenario input
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Run scenarios in order. Every scenario yields a result; a browser
    /// that cannot launch fails that scenario with `FailureKind::Harness`.
    pub async fn run(&self, specs: &[ScenarioSpec]) -> SuiteResult {
        let start = Instant::now();
        let mut results = Vec::with_capacity(specs.len());
        let mut shared: Option<Box<dyn BrowserSession>> = None;

        info!("Running {} scenario(s) against {}", specs.len(), self.config.base_url);

        for spec in specs {
            let input = match spec.resolve_input(|key| (self.env)(key)) {
                Ok(input) => input,
                Err(var) => {
                    warn!("⊘ {} - skipped, {} is not set", spec.name, var);
                    results.push(ScenarioResult::skipped(spec, format!("{} is not set", var)));
                    continue;
                }
            };

            let started = Instant::now();
            let session = match shared.take() {
                Some(session) => Ok(session),
                None => self.launcher.launch().await,
            };

            let result = match session {
                Err(e) => ScenarioResult::harness_failure(
                    spec,
                    e.to_string(),
                    started.elapsed().as_millis() as u64,
                ),
                Ok(mut session) => {
                    let result = self.run_in_session(session.as_mut(), spec, input.as_deref()).await;
                    match self.config.isolation {
                        Isolation::Shared => shared = Some(session),
                        Isolation::PerScenario => {
                            if let Err(e) = session.close().await {
                                warn!("Error closing browser: {}", e);
                            }
                        }
                    }
                    result
                }
            };

            match result.status {
                Status::Passed => info!("✓ {} ({} ms)", result.name, result.duration_ms),
                _ => error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                ),
            }
            results.push(result);
        }

        close_shared(shared).await;

        let suite = SuiteResult::from_results(results, start.elapsed().as_millis() as u64);
        info!(
            "Results: {} passed, {} failed, {} skipped ({} ms)",
            suite.tally.passed, suite.tally.failed, suite.tally.skipped, suite.duration_ms
        );
        suite
    }

    async fn run_in_session(
        &self,
        session: &mut dyn BrowserSession,
        spec: &ScenarioSpec,
        input: Option<&str>,
    ) -> ScenarioResult {
        let start = Instant::now();
        debug!("Running scenario: {}", spec.name);

        let mut page = match session.new_page().await {
            Ok(page) => page,
            Err(e) => {
                return ScenarioResult::harness_failure(
                    spec,
                    format!("could not open page: {}", e),
                    start.elapsed().as_millis() as u64,
                )
            }
        };

        let request = ProbeRequest::from_spec(spec, &self.config.base_url, input);
        let outcome = self.probe.run(page.as_mut(), &request).await;
        let screenshot = self.capture(page.as_mut(), spec).await;

        if let Err(e) = page.close().await {
            debug!("Error closing page: {}", e);
        }

        let mut result =
            ScenarioResult::from_outcome(spec, outcome, start.elapsed().as_millis() as u64);
        result.screenshot = screenshot;
        result
    }

    async fn capture(&self, page: &mut dyn PageDriver, spec: &ScenarioSpec) -> Option<PathBuf> {
        if !self.config.screenshots {
            return None;
        }
        let name = spec.screenshot.as_ref()?;
        let path = self
            .config
            .output_dir
            .join("screenshots")
            .join(format!("{}.png", name));
        match page.screenshot(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Screenshot for {} failed: {}", spec.name, e);
                None
            }
        }
    }

    /// Write results to `test-results.json` in the output directory
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        results.write_json(&self.config.output_dir)
    }
}

async fn close_shared(session: Option<Box<dyn BrowserSession>>) {
    if let Some(mut session) = session {
        if let Err(e) = session.close().await {
            warn!("Error closing browser: {}", e);
        }
    }
}
