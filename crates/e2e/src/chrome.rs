//! Chrome automation via chromiumoxide

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown, RemoteObject,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use pageprobe_common::config::BrowserSettings;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::driver::{self, BrowserLauncher, BrowserSession, PageDriver};
use crate::error::{E2eError, E2eResult};

/// Launches headless (or headful) Chrome sessions
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    settings: BrowserSettings,
}

impl ChromeLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn build_config(&self, user_data_dir: &Path) -> E2eResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.settings.window_width, self.settings.window_height)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .user_data_dir(user_data_dir);

        if !self.settings.headless {
            builder = builder.with_head();
        }
        if self.settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = resolve_chrome_path(&self.settings) {
            info!("Using Chrome at {}", path.display());
            builder = builder.chrome_executable(path);
        }

        builder
            .build()
            .map_err(|e| E2eError::BrowserLaunch(format!("invalid browser config: {}", e)))
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserSession>> {
        let user_data_dir = unique_user_data_dir();
        let config = self.build_config(&user_data_dir)?;

        debug!("Launching Chrome (headless: {})", self.settings.headless);
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| E2eError::BrowserLaunch(e.to_string()))?;

        // Drives the CDP websocket; ends when the browser goes away
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
        });

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            handler_task,
            user_data_dir,
        }))
    }
}

/// A running Chrome process
pub struct ChromeSession {
    browser: Option<Browser>,
    handler_task: JoinHandle<()>,
    user_data_dir: PathBuf,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn new_page(&mut self) -> E2eResult<Box<dyn PageDriver>> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| E2eError::Browser("browser already closed".to_string()))?;
        let page = browser.new_page("about:blank").await?;
        Ok(Box::new(ChromePage::attach(page).await?))
    }

    async fn close(&mut self) -> E2eResult<()> {
        if let Some(mut browser) = self.browser.take() {
            debug!("Closing Chrome");
            if let Err(e) = browser.close().await {
                warn!("Error closing browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Error waiting for browser exit: {}", e);
            }
        }
        self.handler_task.abort();
        if self.user_data_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
                warn!(
                    "Failed to remove profile dir {}: {}",
                    self.user_data_dir.display(),
                    e
                );
            }
        }
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // chromiumoxide kills the child process when `Browser` drops
        self.handler_task.abort();
    }
}

/// A Chrome tab with its own page-error and console buffers
pub struct ChromePage {
    page: Option<Page>,
    errors: Arc<Mutex<Vec<String>>>,
    console: Arc<Mutex<Vec<String>>>,
    listeners: Vec<JoinHandle<()>>,
}

impl ChromePage {
    async fn attach(page: Page) -> E2eResult<Self> {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let console = Arc::new(Mutex::new(Vec::new()));

        let mut exceptions = page.event_listener::<EventExceptionThrown>().await?;
        let error_sink = errors.clone();
        let error_task = tokio::spawn(async move {
            while let Some(event) = exceptions.next().await {
                let details = &event.exception_details;
                let message = details
                    .exception
                    .as_ref()
                    .and_then(|e| e.description.clone())
                    .unwrap_or_else(|| details.text.clone());
                warn!("[page error] {}", message);
                error_sink.lock().push(message);
            }
        });

        let mut messages = page.event_listener::<EventConsoleApiCalled>().await?;
        let console_sink = console.clone();
        let console_task = tokio::spawn(async move {
            while let Some(event) = messages.next().await {
                let text = event
                    .args
                    .iter()
                    .map(remote_object_text)
                    .collect::<Vec<_>>()
                    .join(" ");
                if matches!(event.r#type, ConsoleApiCalledType::Error) {
                    warn!("[console] {}", text);
                } else {
                    debug!("[console] {}", text);
                }
                console_sink.lock().push(text);
            }
        });

        Ok(Self {
            page: Some(page),
            errors,
            console,
            listeners: vec![error_task, console_task],
        })
    }

    fn page(&self) -> E2eResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| E2eError::Browser("page already closed".to_string()))
    }

    async fn evaluate<T: serde::de::DeserializeOwned>(&self, expression: &str) -> E2eResult<T> {
        let result = self
            .page()?
            .evaluate(expression)
            .await
            .map_err(|e| E2eError::Evaluate(e.to_string()))?;
        // null and undefined come back without a value
        let value = result.value().cloned().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(value)
            .map_err(|e| E2eError::Evaluate(format!("unexpected result type: {}", e)))
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        debug!("Navigating to {}", url);
        self.page()?
            .goto(url)
            .await
            .map_err(|e| E2eError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn element_exists(&mut self, selector: &str) -> E2eResult<bool> {
        self.evaluate(&driver::exists_script(selector)).await
    }

    async fn fill(&mut self, selector: &str, value: &str) -> E2eResult<()> {
        let filled: bool = self.evaluate(&driver::fill_script(selector, value)).await?;
        if filled {
            Ok(())
        } else {
            Err(E2eError::ElementNotFound(selector.to_string()))
        }
    }

    async fn click(&mut self, selector: &str) -> E2eResult<()> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|_| E2eError::ElementNotFound(selector.to_string()))?;
        element.click().await?;
        Ok(())
    }

    async fn eval_bool(&mut self, expression: &str) -> E2eResult<bool> {
        self.evaluate(expression).await
    }

    async fn eval_json(&mut self, expression: &str) -> E2eResult<serde_json::Value> {
        self.evaluate(expression).await
    }

    async fn text_of(&mut self, selector: &str) -> E2eResult<Option<String>> {
        self.evaluate(&driver::text_script(selector)).await
    }

    async fn title(&mut self) -> E2eResult<Option<String>> {
        self.evaluate("document.title || null").await
    }

    fn page_errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    fn console_lines(&self) -> Vec<String> {
        self.console.lock().clone()
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        let bytes = self
            .page()?
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        info!("Screenshot saved: {}", path.display());
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        if let Some(page) = self.page.take() {
            page.close().await?;
        }
        for task in self.listeners.drain(..) {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        for task in &self.listeners {
            task.abort();
        }
    }
}

fn remote_object_text(arg: &RemoteObject) -> String {
    match &arg.value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => arg.description.clone().unwrap_or_default(),
    }
}

fn unique_user_data_dir() -> PathBuf {
    static LAUNCH_ID: AtomicU64 = AtomicU64::new(0);

    let launch_id = LAUNCH_ID.fetch_add(1, Ordering::SeqCst);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!(
        "pageprobe-{}-{}-{}",
        std::process::id(),
        launch_id,
        nanos
    ))
}

/// Chrome executable: explicit setting, then `CHROME_PATH`, then a
/// Chrome for Testing install under the Puppeteer cache. `None` lets
/// chromiumoxide auto-detect.
pub fn resolve_chrome_path(settings: &BrowserSettings) -> Option<PathBuf> {
    if let Some(path) = &settings.chrome_path {
        return Some(path.clone());
    }
    if let Some(path) = std::env::var_os("CHROME_PATH").map(PathBuf::from) {
        if path.exists() {
            return Some(path);
        }
    }
    find_chrome_for_testing()
}

fn find_chrome_for_testing() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    let cache = Path::new(&home).join(".cache/puppeteer/chrome");

    let mut versions: Vec<PathBuf> = std::fs::read_dir(&cache)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    versions.sort_by(|a, b| b.cmp(a));

    const CANDIDATES: [&str; 3] = [
        "chrome-linux64/chrome",
        "chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
        "chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
    ];

    versions
        .iter()
        .flat_map(|dir| CANDIDATES.iter().map(move |c| dir.join(c)))
        .find(|p| p.exists())
}
