//! Page probe: navigate, interact, wait for readiness, snapshot

use pageprobe_common::config::ProbeSettings;
use pageprobe_common::{FailureKind, PageSnapshot};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::driver::{self, PageDriver};
use crate::error::{E2eError, E2eResult};
use crate::spec::{InteractionStep, Readiness, ScenarioSpec};

/// Probe timing
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub navigation_timeout: Duration,
    pub step_timeout: Duration,
    pub poll_interval: Duration,
    pub condition_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::from(&ProbeSettings::default())
    }
}

impl From<&ProbeSettings> for ProbeConfig {
    fn from(settings: &ProbeSettings) -> Self {
        Self {
            navigation_timeout: settings.navigation_timeout(),
            step_timeout: settings.step_timeout(),
            poll_interval: settings.poll_interval(),
            condition_timeout: settings.condition_timeout(),
        }
    }
}

/// What to probe
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    /// Absolute URL
    pub url: String,

    /// Must hold before the steps run
    pub ready: Option<Readiness>,

    pub steps: Vec<InteractionStep>,

    /// Must hold after the steps run
    pub settle: Option<Readiness>,

    /// Overrides the configured condition timeout
    pub timeout: Option<Duration>,

    pub content_selector: String,

    pub library_globals: Vec<String>,
}

impl ProbeRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ready: None,
            steps: Vec::new(),
            settle: None,
            timeout: None,
            content_selector: "#app".to_string(),
            library_globals: Vec::new(),
        }
    }

    /// Request for a scenario with its input already resolved
    pub fn from_spec(spec: &ScenarioSpec, base_url: &str, input: Option<&str>) -> Self {
        Self {
            url: spec.resolve_url(base_url),
            ready: spec.ready.clone(),
            steps: spec.resolved_steps(input),
            settle: spec.settle.clone(),
            timeout: spec.timeout(),
            content_selector: spec.content_selector.clone(),
            library_globals: spec.library_globals.clone(),
        }
    }

    pub fn with_settle(mut self, settle: Readiness) -> Self {
        self.settle = Some(settle);
        self
    }

    pub fn with_steps(mut self, steps: Vec<InteractionStep>) -> Self {
        self.steps = steps;
        self
    }
}

/// Why a probe did not reach its condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeFailure {
    NavigationTimeout { url: String, detail: String },
    ElementNotFound { selector: String },
    ConditionTimeout { condition: String },
    UnexpectedPageError { message: String },
}

impl ProbeFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProbeFailure::NavigationTimeout { .. } => FailureKind::NavigationTimeout,
            ProbeFailure::ElementNotFound { .. } => FailureKind::ElementNotFound,
            ProbeFailure::ConditionTimeout { .. } => FailureKind::ConditionTimeout,
            ProbeFailure::UnexpectedPageError { .. } => FailureKind::PageScriptError,
        }
    }
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeFailure::NavigationTimeout { url, detail } => {
                write!(f, "navigation to {} failed: {}", url, detail)
            }
            ProbeFailure::ElementNotFound { selector } => {
                write!(f, "element {} not found", selector)
            }
            ProbeFailure::ConditionTimeout { condition } => {
                write!(f, "timed out waiting for {}", condition)
            }
            ProbeFailure::UnexpectedPageError { message } => {
                write!(f, "page error: {}", message)
            }
        }
    }
}

/// Result of one probe. Unmet conditions are reported here, not as errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub reached: bool,
    pub elapsed_ms: u64,
    pub snapshot: Option<PageSnapshot>,
    pub failure: Option<ProbeFailure>,
}

/// Drives one page through a probe request
#[derive(Debug, Clone, Default)]
pub struct PageProbe {
    config: ProbeConfig,
}

impl PageProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Navigate, wait for `ready`, apply the steps, wait for `settle`, then
    /// snapshot. A snapshot is attached on failure whenever it can be read.
    pub async fn run(&self, driver: &mut dyn PageDriver, request: &ProbeRequest) -> ProbeOutcome {
        let start = Instant::now();
        let failure = self.drive(driver, request).await;
        let snapshot = self.try_snapshot(driver, request).await;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &failure {
            None => info!("Reached {} in {} ms", request.url, elapsed_ms),
            Some(f) => warn!("Probe of {} failed after {} ms: {}", request.url, elapsed_ms, f),
        }

        ProbeOutcome {
            reached: failure.is_none(),
            elapsed_ms,
            snapshot,
            failure,
        }
    }

    async fn drive(&self, driver: &mut dyn PageDriver, request: &ProbeRequest) -> Option<ProbeFailure> {
        debug!("Navigating to {}", request.url);
        match tokio::time::timeout(self.config.navigation_timeout, driver.goto(&request.url)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Some(ProbeFailure::NavigationTimeout {
                    url: request.url.clone(),
                    detail: e.to_string(),
                })
            }
            Err(_) => {
                return Some(ProbeFailure::NavigationTimeout {
                    url: request.url.clone(),
                    detail: format!(
                        "timed out after {} ms",
                        self.config.navigation_timeout.as_millis()
                    ),
                })
            }
        }

        let condition_timeout = request.timeout.unwrap_or(self.config.condition_timeout);

        if let Some(ready) = &request.ready {
            if let Some(failure) = self.await_condition(driver, ready, condition_timeout).await {
                return Some(failure);
            }
        }

        for step in &request.steps {
            if let Err(failure) = self.apply_step(driver, step).await {
                return Some(failure);
            }
        }

        if let Some(settle) = &request.settle {
            if let Some(failure) = self.await_condition(driver, settle, condition_timeout).await {
                return Some(failure);
            }
        }

        None
    }

    async fn await_condition(
        &self,
        driver: &mut dyn PageDriver,
        condition: &Readiness,
        timeout: Duration,
    ) -> Option<ProbeFailure> {
        debug!("Waiting for {}", condition.describe());
        if wait_until(driver, condition, timeout, self.config.poll_interval).await {
            return None;
        }

        match driver.page_errors().into_iter().next() {
            Some(message) => Some(ProbeFailure::UnexpectedPageError { message }),
            None => Some(ProbeFailure::ConditionTimeout {
                condition: condition.describe(),
            }),
        }
    }

    /// Wait for the step's target, then fill or click it
    pub async fn apply_step(
        &self,
        driver: &mut dyn PageDriver,
        step: &InteractionStep,
    ) -> Result<(), ProbeFailure> {
        let selector = step.selector();
        let not_found = || ProbeFailure::ElementNotFound {
            selector: selector.to_string(),
        };

        let present = wait_until(
            driver,
            &Readiness::selector(selector),
            self.config.step_timeout,
            self.config.poll_interval,
        )
        .await;
        if !present {
            return Err(not_found());
        }

        debug!("Applying {}", step.name());
        let applied = match step {
            InteractionStep::Fill { selector, value } => driver.fill(selector, value).await,
            InteractionStep::Click { selector } => driver.click(selector).await,
        };
        applied.map_err(|e| {
            warn!("{} failed: {}", step.name(), e);
            not_found()
        })
    }

    async fn try_snapshot(
        &self,
        driver: &mut dyn PageDriver,
        request: &ProbeRequest,
    ) -> Option<PageSnapshot> {
        let read = snapshot(driver, &request.content_selector, &request.library_globals);
        match tokio::time::timeout(self.config.step_timeout, read).await {
            Ok(Ok(snapshot)) => Some(snapshot),
            Ok(Err(e)) => {
                warn!("Could not read page snapshot: {}", e);
                None
            }
            Err(_) => {
                warn!("Timed out reading page snapshot");
                None
            }
        }
    }
}

/// Poll `condition` every `poll_interval` until it holds or `timeout`
/// elapses. Evaluation errors count as "not yet".
///
/// A fixed delay is reached once it has elapsed; a delay longer than
/// `timeout` sleeps only for `timeout` and is not reached.
pub async fn wait_until(
    driver: &mut dyn PageDriver,
    condition: &Readiness,
    timeout: Duration,
    poll_interval: Duration,
) -> bool {
    if let Readiness::Fixed { ms } = condition {
        let delay = Duration::from_millis(*ms);
        tokio::time::sleep(delay.min(timeout)).await;
        return delay <= timeout;
    }

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, condition_holds(driver, condition)).await {
            Ok(Ok(true)) => return true,
            Ok(Ok(false)) => {}
            Ok(Err(e)) => debug!("Condition check failed: {}", e),
            Err(_) => return false,
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }
        tokio::time::sleep(poll_interval.min(remaining)).await;
    }
}

async fn condition_holds(driver: &mut dyn PageDriver, condition: &Readiness) -> E2eResult<bool> {
    match condition {
        Readiness::TextContains { selector, any } => {
            let text = driver.text_of(selector).await?;
            Ok(match text {
                Some(text) if any.is_empty() => !text.trim().is_empty(),
                Some(text) => any.iter().any(|marker| text.contains(marker.as_str())),
                None => false,
            })
        }
        Readiness::Selector { selector } => driver.element_exists(selector).await,
        Readiness::Script { expression } => driver.eval_bool(expression).await,
        Readiness::Fixed { .. } => Ok(true),
    }
}

/// Capture the content text, title, library flags and collected page output
pub async fn snapshot(
    driver: &mut dyn PageDriver,
    content_selector: &str,
    library_globals: &[String],
) -> E2eResult<PageSnapshot> {
    let text = driver.text_of(content_selector).await?.unwrap_or_default();
    let mut snapshot = PageSnapshot::new(text);
    snapshot.title = driver.title().await.unwrap_or(None);

    for name in library_globals {
        let loaded = match driver.eval_bool(&driver::global_defined_script(name)).await {
            Ok(loaded) => loaded,
            Err(E2eError::Evaluate(e)) => {
                debug!("Library check for {} failed: {}", name, e);
                false
            }
            Err(e) => return Err(e),
        };
        snapshot.libraries.insert(name.clone(), loaded);
    }

    snapshot.page_errors = driver.page_errors();
    snapshot.console = driver.console_lines();
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        let nav = ProbeFailure::NavigationTimeout {
            url: "http://localhost:8000/".to_string(),
            detail: "timed out after 30000 ms".to_string(),
        };
        assert_eq!(nav.kind(), FailureKind::NavigationTimeout);
        assert_eq!(
            ProbeFailure::UnexpectedPageError {
                message: "ReferenceError".to_string()
            }
            .kind(),
            FailureKind::PageScriptError
        );
    }

    #[test]
    fn test_failure_serializes_tagged() {
        let failure = ProbeFailure::ElementNotFound {
            selector: "#fetch-wallet-data-button".to_string(),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "element_not_found");
        assert_eq!(json["selector"], "#fetch-wallet-data-button");
    }

    #[test]
    fn test_request_from_spec_substitutes_input() {
        let spec = ScenarioSpec::from_yaml(
            r#"
name: wallet
url: index.html
input:
  from: env
  var: WALLET_EMPTY
steps:
  - action: fill
    selector: '#wallet-address-input'
    value: '{{input}}'
timeout_ms: 1500
"#,
        )
        .unwrap();
        let request = ProbeRequest::from_spec(&spec, "http://127.0.0.1:8080/", Some("pb1abc"));
        assert_eq!(request.url, "http://127.0.0.1:8080/index.html");
        assert_eq!(request.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(
            request.steps[0],
            InteractionStep::Fill {
                selector: "#wallet-address-input".to_string(),
                value: "pb1abc".to_string(),
            }
        );
    }

    #[test]
    fn test_config_from_settings() {
        let config = ProbeConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.step_timeout, Duration::from_secs(5));
        assert_eq!(config.navigation_timeout, Duration::from_secs(30));
    }
}
