//! Live-site diagnostic: how far did the app get, and where did it stop

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::driver::{self, BrowserLauncher, PageDriver};
use crate::error::E2eResult;
use crate::probe::{wait_until, ProbeConfig};
use crate::spec::Readiness;

/// A console line that marks a point in the app's startup sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Substring searched for in console output
    pub marker: String,
    pub name: String,
}

impl Checkpoint {
    pub fn new(marker: &str, name: &str) -> Self {
        Self {
            marker: marker.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointStatus {
    pub name: String,
    pub marker: String,
    pub found: bool,
}

/// Which checkpoints appear anywhere in the console output, in checkpoint order
pub fn checkpoint_progress(console: &[String], checkpoints: &[Checkpoint]) -> Vec<CheckpointStatus> {
    checkpoints
        .iter()
        .map(|cp| CheckpointStatus {
            name: cp.name.clone(),
            marker: cp.marker.clone(),
            found: console.iter().any(|line| line.contains(cp.marker.as_str())),
        })
        .collect()
}

/// Last checkpoint, in sequence order, that was found
pub fn last_reached(progress: &[CheckpointStatus]) -> Option<&CheckpointStatus> {
    progress.iter().rev().find(|p| p.found)
}

/// Visible state of the page, read in one evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageState {
    pub title: Option<String>,
    pub app_version: Option<String>,
    pub loading_visible: bool,
    pub error_visible: bool,
    pub hash_card_visible: bool,
    pub price_visible: bool,
    pub libraries: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    /// Price and HASH card rendered
    Working,
    /// Still showing the loading message
    StuckLoading,
    /// Showing the error message
    Errored,
    Unknown,
}

impl std::fmt::Display for Conclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Conclusion::Working => "app is working",
            Conclusion::StuckLoading => "app is stuck loading",
            Conclusion::Errored => "app displayed an error",
            Conclusion::Unknown => "app state unknown",
        };
        write!(f, "{}", s)
    }
}

pub fn conclude(state: &PageState) -> Conclusion {
    if state.price_visible && state.hash_card_visible {
        Conclusion::Working
    } else if state.loading_visible {
        Conclusion::StuckLoading
    } else if state.error_visible {
        Conclusion::Errored
    } else {
        Conclusion::Unknown
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub url: String,
    pub navigation_error: Option<String>,
    pub settled: bool,
    #[serde(flatten)]
    pub state: PageState,
    pub console_count: usize,
    pub last_console: Option<String>,
    pub page_errors: Vec<String>,
    pub checkpoints: Vec<CheckpointStatus>,
    pub last_checkpoint: Option<String>,
    pub screenshot: Option<PathBuf>,
    pub conclusion: Conclusion,
}

impl DiagnosticReport {
    pub fn checkpoints_found(&self) -> usize {
        self.checkpoints.iter().filter(|c| c.found).count()
    }

    /// The first checkpoint that was never reached
    pub fn first_missing_checkpoint(&self) -> Option<&CheckpointStatus> {
        self.checkpoints.iter().find(|c| !c.found)
    }
}

/// Diagnostic settings
#[derive(Debug, Clone)]
pub struct DiagnoseConfig {
    pub probe: ProbeConfig,

    /// How long to wait for the price or the error to show up
    pub settle_timeout: Duration,

    pub checkpoints: Vec<Checkpoint>,
    pub library_globals: Vec<String>,

    /// Screenshot destination, none to skip
    pub screenshot: Option<PathBuf>,
}

/// Page-state script: text markers, HASH card, price pattern, library globals
pub fn page_state_script(library_globals: &[String]) -> String {
    let libraries = library_globals
        .iter()
        .map(|name| format!("{}: {}", driver::js_string(name), driver::global_defined_script(name)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"(() => {{
  const text = document.body ? document.body.innerText : '';
  const headings = Array.from(document.querySelectorAll('h2'));
  return {{
    title: document.title || null,
    app_version: typeof window.APP_VERSION !== 'undefined' ? String(window.APP_VERSION) : null,
    loading_visible: text.includes('Loading HASH price'),
    error_visible: text.includes('Error Loading Data'),
    hash_card_visible: headings.some(h => h.textContent.includes('HASH')),
    price_visible: /\$\d+\.\d+/.test(text),
    libraries: {{ {libraries} }}
  }};
}})()"#
    )
}

/// Expression that holds once the page shows a price or an error
pub const SETTLED_SCRIPT: &str = "(() => { const t = document.body ? document.body.innerText : ''; \
     return /\\$\\d+\\.\\d+/.test(t) || t.includes('Error Loading Data'); })()";

/// Runs the live-site diagnostic in a fresh browser
pub struct Diagnostician {
    launcher: Box<dyn BrowserLauncher>,
    config: DiagnoseConfig,
}

impl Diagnostician {
    pub fn new(launcher: Box<dyn BrowserLauncher>, config: DiagnoseConfig) -> Self {
        Self { launcher, config }
    }

    pub async fn run(&self, url: &str) -> E2eResult<DiagnosticReport> {
        let mut session = self.launcher.launch().await?;
        let report = match session.new_page().await {
            Ok(mut page) => {
                let report = diagnose_page(page.as_mut(), url, &self.config).await;
                if let Err(e) = page.close().await {
                    debug!("Error closing page: {}", e);
                }
                Ok(report)
            }
            Err(e) => Err(e),
        };
        if let Err(e) = session.close().await {
            warn!("Error closing browser: {}", e);
        }
        report
    }
}

/// Diagnose an already open page
pub async fn diagnose_page(
    driver: &mut dyn PageDriver,
    url: &str,
    config: &DiagnoseConfig,
) -> DiagnosticReport {
    info!("Diagnosing {}", url);

    let navigation_error =
        match tokio::time::timeout(config.probe.navigation_timeout, driver.goto(url)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "timed out after {} ms",
                config.probe.navigation_timeout.as_millis()
            )),
        };

    let settled = match &navigation_error {
        Some(e) => {
            warn!("Navigation failed: {}", e);
            false
        }
        None => {
            let condition = Readiness::Script {
                expression: SETTLED_SCRIPT.to_string(),
            };
            wait_until(driver, &condition, config.settle_timeout, config.probe.poll_interval).await
        }
    };
    if !settled {
        warn!("Page did not show a price or an error within {} ms", config.settle_timeout.as_millis());
    }

    let state = match driver.eval_json(&page_state_script(&config.library_globals)).await {
        Ok(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!("Unexpected page state shape: {}", e);
            PageState::default()
        }),
        Err(e) => {
            warn!("Could not read page state: {}", e);
            PageState::default()
        }
    };

    let console = driver.console_lines();
    let checkpoints = checkpoint_progress(&console, &config.checkpoints);
    let last_checkpoint = last_reached(&checkpoints).map(|c| c.name.clone());

    let screenshot = match &config.screenshot {
        Some(path) => match driver.screenshot(path).await {
            Ok(()) => Some(path.clone()),
            Err(e) => {
                warn!("Screenshot failed: {}", e);
                None
            }
        },
        None => None,
    };

    let conclusion = conclude(&state);
    info!("Conclusion: {}", conclusion);

    DiagnosticReport {
        url: url.to_string(),
        navigation_error,
        settled,
        state,
        console_count: console.len(),
        last_console: console.last().cloned(),
        page_errors: driver.page_errors(),
        checkpoints,
        last_checkpoint,
        screenshot,
        conclusion,
    }
}
