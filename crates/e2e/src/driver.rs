//! Browser seam used by the probe
//!
//! The probe only talks to these traits. `chrome` provides the
//! chromiumoxide-backed implementation; tests provide scripted ones.

use async_trait::async_trait;
use std::path::Path;

use crate::error::E2eResult;

/// A single open page
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate and wait for the load event
    async fn goto(&mut self, url: &str) -> E2eResult<()>;

    async fn element_exists(&mut self, selector: &str) -> E2eResult<bool>;

    /// Set an input value and dispatch `input` and `change`
    async fn fill(&mut self, selector: &str, value: &str) -> E2eResult<()>;

    async fn click(&mut self, selector: &str) -> E2eResult<()>;

    async fn eval_bool(&mut self, expression: &str) -> E2eResult<bool>;

    async fn eval_json(&mut self, expression: &str) -> E2eResult<serde_json::Value>;

    /// `textContent` of the first match, `None` when nothing matches
    async fn text_of(&mut self, selector: &str) -> E2eResult<Option<String>>;

    async fn title(&mut self) -> E2eResult<Option<String>>;

    /// Uncaught script errors observed so far on this page
    fn page_errors(&self) -> Vec<String>;

    /// Console lines observed so far on this page
    fn console_lines(&self) -> Vec<String>;

    /// Save a full-page PNG screenshot
    async fn screenshot(&mut self, path: &Path) -> E2eResult<()>;

    async fn close(&mut self) -> E2eResult<()>;
}

/// A running browser instance
#[async_trait]
pub trait BrowserSession: Send {
    async fn new_page(&mut self) -> E2eResult<Box<dyn PageDriver>>;

    /// Shut the browser down; must be called on every exit path
    async fn close(&mut self) -> E2eResult<()>;
}

/// Starts browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserSession>>;
}

/// Quote a string as a JavaScript string literal
pub fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Expression: does `selector` match anything
pub fn exists_script(selector: &str) -> String {
    format!("document.querySelector({}) !== null", js_string(selector))
}

/// Expression: `textContent` of `selector`, or null
pub fn text_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); return el ? el.textContent : null; }})()",
        js_string(selector)
    )
}

/// Expression: set the value through the native setter so framework-managed
/// inputs see the change, then dispatch `input` and `change`. Yields false
/// when the element is missing.
pub fn fill_script(selector: &str, value: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return false;
  el.focus();
  const proto = Object.getPrototypeOf(el);
  const desc = Object.getOwnPropertyDescriptor(proto, 'value');
  if (desc && desc.set) {{ desc.set.call(el, {val}); }} else {{ el.value = {val}; }}
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})()"#,
        sel = js_string(selector),
        val = js_string(value),
    )
}

/// Expression: is the global `name` defined
pub fn global_defined_script(name: &str) -> String {
    format!("typeof window[{}] !== 'undefined'", js_string(name))
}
