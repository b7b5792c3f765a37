//! Core types for pageprobe

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rendered page state captured at one point after navigation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Text content of the content container (empty when it is absent)
    pub text: String,

    /// Document title, if one could be read
    #[serde(default)]
    pub title: Option<String>,

    /// Library global name -> loaded
    #[serde(default)]
    pub libraries: BTreeMap<String, bool>,

    /// Uncaught script errors raised by the page
    #[serde(default)]
    pub page_errors: Vec<String>,

    /// Console lines emitted by the page
    #[serde(default)]
    pub console: Vec<String>,

    pub captured_at: DateTime<Utc>,
}

impl PageSnapshot {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            captured_at: Utc::now(),
            ..Default::default()
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    /// First `max_chars` characters of the text, cut on a char boundary
    pub fn excerpt(&self, max_chars: usize) -> String {
        match self.text.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &self.text[..idx]),
            None => self.text.clone(),
        }
    }

    /// Names of libraries that were not loaded
    pub fn missing_libraries(&self) -> Vec<&str> {
        self.libraries
            .iter()
            .filter(|(_, loaded)| !**loaded)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Outcome of a single scenario or check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Passed => write!(f, "passed"),
            Status::Failed => write!(f, "failed"),
            Status::Skipped => write!(f, "skipped"),
        }
    }
}

/// Why a scenario or check did not pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The page never finished navigating
    NavigationTimeout,
    /// An interaction target never appeared
    ElementNotFound,
    /// The readiness condition never held
    ConditionTimeout,
    /// The page threw an uncaught script error
    PageScriptError,
    /// An HTTP request timed out
    NetworkTimeout,
    /// An HTTP request failed below the HTTP layer
    ConnectionFailed,
    /// An HTTP response carried an unacceptable status
    UnexpectedStatusCode,
    /// Expected substrings were absent (or forbidden ones present)
    ContentMismatch,
    /// Required scenario input was not provided
    EnvironmentMissing,
    /// The harness itself failed
    Harness,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::NavigationTimeout => "navigation timeout",
            FailureKind::ElementNotFound => "element not found",
            FailureKind::ConditionTimeout => "condition timeout",
            FailureKind::PageScriptError => "page script error",
            FailureKind::NetworkTimeout => "network timeout",
            FailureKind::ConnectionFailed => "connection failed",
            FailureKind::UnexpectedStatusCode => "unexpected status code",
            FailureKind::ContentMismatch => "content mismatch",
            FailureKind::EnvironmentMissing => "environment missing",
            FailureKind::Harness => "harness error",
        };
        write!(f, "{}", s)
    }
}

/// Aggregate counters for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn record(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Passed => self.passed += 1,
            Status::Failed => self.failed += 1,
            Status::Skipped => self.skipped += 1,
        }
    }

    /// No failures, and at least one thing was actually verified
    pub fn success(&self) -> bool {
        self.failed == 0 && self.skipped < self.total
    }

    pub fn all_skipped(&self) -> bool {
        self.skipped == self.total
    }

    /// Passed share of the non-skipped items, in percent
    pub fn pass_rate(&self) -> f64 {
        let verified = self.total - self.skipped;
        if verified == 0 {
            return 0.0;
        }
        (self.passed as f64 / verified as f64) * 100.0
    }
}

impl FromIterator<Status> for Tally {
    fn from_iter<I: IntoIterator<Item = Status>>(iter: I) -> Self {
        let mut tally = Tally::default();
        for status in iter {
            tally.record(status);
        }
        tally
    }
}
