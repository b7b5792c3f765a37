//! Scripted browser used by the probe and runner tests

#![allow(dead_code)]

use async_trait::async_trait;
use pageprobe_e2e::driver::{BrowserLauncher, BrowserSession, PageDriver};
use pageprobe_e2e::{E2eError, E2eResult, ProbeConfig};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const APP: &str = "#app";
pub const INPUT: &str = "#wallet-address-input";
pub const BUTTON: &str = "#fetch-wallet-data-button";

/// How a fake page responds
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// `#app` text before anything is clicked
    pub initial_text: String,

    /// Selectors that exist (`#app` always does)
    pub elements: Vec<String>,

    /// Filled value -> `#app` text after the click
    pub responses: HashMap<String, String>,

    /// `#app` text after the click when no response matches
    pub default_response: Option<String>,

    /// Text reads that still show the old text after a click
    pub settle_after_polls: usize,

    pub page_errors: Vec<String>,
    pub console: Vec<String>,
    pub globals: HashMap<String, bool>,
    pub state_json: serde_json::Value,
    pub title: Option<String>,

    pub hang_navigation: bool,
    pub fail_navigation: Option<String>,
}

impl Behavior {
    /// The wallet form, answering every address with `response`
    pub fn wallet_form(response: &str) -> Self {
        Self {
            initial_text: "FM Wallet Info Fetch Wallet Data".to_string(),
            elements: vec![INPUT.to_string(), BUTTON.to_string()],
            default_response: Some(response.to_string()),
            title: Some("Figure Markets - HASH Price".to_string()),
            ..Default::default()
        }
    }

    pub fn respond(mut self, input: &str, text: &str) -> Self {
        self.responses.insert(input.to_string(), text.to_string());
        self
    }
}

/// What the fake browser was asked to do
#[derive(Debug, Default)]
pub struct Recorder {
    pub launch_attempts: usize,
    pub launches: usize,
    pub sessions_closed: usize,
    pub pages_opened: usize,
    pub pages_closed: usize,
    pub visited: Vec<String>,
    pub fills: Vec<(String, String)>,
    pub clicks: Vec<String>,
}

pub type SharedRecorder = Arc<Mutex<Recorder>>;

pub struct FakePage {
    behavior: Behavior,
    recorder: SharedRecorder,
    text: String,
    filled: Option<String>,
    pending: Option<(String, usize)>,
}

impl FakePage {
    pub fn new(behavior: Behavior) -> Self {
        Self::with_recorder(behavior, SharedRecorder::default())
    }

    pub fn with_recorder(behavior: Behavior, recorder: SharedRecorder) -> Self {
        Self {
            text: behavior.initial_text.clone(),
            behavior,
            recorder,
            filled: None,
            pending: None,
        }
    }

    pub fn recorder(&self) -> SharedRecorder {
        self.recorder.clone()
    }

    fn exists(&self, selector: &str) -> bool {
        selector == APP || self.behavior.elements.iter().any(|e| e == selector)
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        if self.behavior.hang_navigation {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some(reason) = &self.behavior.fail_navigation {
            return Err(E2eError::Navigation {
                url: url.to_string(),
                reason: reason.clone(),
            });
        }
        self.recorder.lock().unwrap().visited.push(url.to_string());
        Ok(())
    }

    async fn element_exists(&mut self, selector: &str) -> E2eResult<bool> {
        Ok(self.exists(selector))
    }

    async fn fill(&mut self, selector: &str, value: &str) -> E2eResult<()> {
        if !self.exists(selector) {
            return Err(E2eError::ElementNotFound(selector.to_string()));
        }
        self.recorder
            .lock()
            .unwrap()
            .fills
            .push((selector.to_string(), value.to_string()));
        self.filled = Some(value.to_string());
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> E2eResult<()> {
        if !self.exists(selector) {
            return Err(E2eError::ElementNotFound(selector.to_string()));
        }
        self.recorder.lock().unwrap().clicks.push(selector.to_string());
        let response = self
            .filled
            .as_ref()
            .and_then(|input| self.behavior.responses.get(input))
            .or(self.behavior.default_response.as_ref())
            .cloned();
        if let Some(text) = response {
            self.pending = Some((text, self.behavior.settle_after_polls));
        }
        Ok(())
    }

    async fn eval_bool(&mut self, expression: &str) -> E2eResult<bool> {
        for (name, loaded) in &self.behavior.globals {
            if expression.contains(&format!("window[\"{}\"]", name)) {
                return Ok(*loaded);
            }
        }
        Ok(false)
    }

    async fn eval_json(&mut self, _expression: &str) -> E2eResult<serde_json::Value> {
        Ok(self.behavior.state_json.clone())
    }

    async fn text_of(&mut self, selector: &str) -> E2eResult<Option<String>> {
        if !self.exists(selector) {
            return Ok(None);
        }
        if let Some((text, remaining)) = self.pending.take() {
            if remaining == 0 {
                self.text = text;
            } else {
                self.pending = Some((text, remaining - 1));
            }
        }
        Ok(Some(self.text.clone()))
    }

    async fn title(&mut self) -> E2eResult<Option<String>> {
        Ok(self.behavior.title.clone())
    }

    fn page_errors(&self) -> Vec<String> {
        self.behavior.page_errors.clone()
    }

    fn console_lines(&self) -> Vec<String> {
        self.behavior.console.clone()
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"\x89PNG")?;
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.recorder.lock().unwrap().pages_closed += 1;
        Ok(())
    }
}

pub struct FakeSession {
    behavior: Behavior,
    recorder: SharedRecorder,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn new_page(&mut self) -> E2eResult<Box<dyn PageDriver>> {
        self.recorder.lock().unwrap().pages_opened += 1;
        Ok(Box::new(FakePage::with_recorder(
            self.behavior.clone(),
            self.recorder.clone(),
        )))
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.recorder.lock().unwrap().sessions_closed += 1;
        Ok(())
    }
}

pub struct FakeLauncher {
    pub behavior: Behavior,
    pub recorder: SharedRecorder,
    /// Launches that fail before one succeeds
    pub fail_first: usize,
}

impl FakeLauncher {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            recorder: SharedRecorder::default(),
            fail_first: 0,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_first: usize::MAX,
            ..Self::new(Behavior::default())
        }
    }

    pub fn failing_first(behavior: Behavior, count: usize) -> Self {
        Self {
            fail_first: count,
            ..Self::new(behavior)
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserSession>> {
        let mut recorder = self.recorder.lock().unwrap();
        recorder.launch_attempts += 1;
        if recorder.launch_attempts <= self.fail_first {
            return Err(E2eError::BrowserLaunch("no chrome in test".to_string()));
        }
        recorder.launches += 1;
        drop(recorder);
        Ok(Box::new(FakeSession {
            behavior: self.behavior.clone(),
            recorder: self.recorder.clone(),
        }))
    }
}

/// Short timings so failing conditions time out quickly
pub fn fast_probe_config() -> ProbeConfig {
    ProbeConfig {
        navigation_timeout: Duration::from_millis(200),
        step_timeout: Duration::from_millis(100),
        poll_interval: Duration::from_millis(10),
        condition_timeout: Duration::from_millis(300),
    }
}

/// Environment lookup backed by a fixed list
pub fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}
