//! Plain HTTP reachability checks, no browser involved

use pageprobe_common::FailureKind;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::error::E2eResult;

/// What a response must satisfy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum ReachCheck {
    /// 200, 301 or 302
    Status,

    /// 200 and every substring present in the body
    Content { expected: Vec<String> },

    /// 200 and a JSON body with a top-level `data` list
    Markets,
}

/// One URL to check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachTarget {
    pub url: String,
    pub description: String,
    #[serde(flatten)]
    pub check: ReachCheck,
}

impl ReachTarget {
    pub fn status(url: &str, description: &str) -> Self {
        Self {
            url: url.to_string(),
            description: description.to_string(),
            check: ReachCheck::Status,
        }
    }

    pub fn content(url: &str, description: &str, expected: &[&str]) -> Self {
        Self {
            url: url.to_string(),
            description: description.to_string(),
            check: ReachCheck::Content {
                expected: expected.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    pub fn markets(url: &str, description: &str) -> Self {
        Self {
            url: url.to_string(),
            description: description.to_string(),
            check: ReachCheck::Markets,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachResult {
    pub url: String,
    pub description: String,
    pub reachable: bool,

    /// HTTP status, when a response arrived
    pub status: Option<u16>,

    /// Transport error text or mismatch detail
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    pub elapsed_ms: u64,

    /// Expected substrings absent from the body
    #[serde(default)]
    pub missing: Vec<String>,

    /// Entries in the markets `data` list
    #[serde(default)]
    pub market_count: Option<usize>,
}

impl ReachResult {
    fn new(target: &ReachTarget) -> Self {
        Self {
            url: target.url.clone(),
            description: target.description.clone(),
            reachable: false,
            status: None,
            error: None,
            failure: None,
            elapsed_ms: 0,
            missing: Vec::new(),
            market_count: None,
        }
    }

    fn fail(mut self, kind: FailureKind, message: String) -> Self {
        self.reachable = false;
        self.failure = Some(kind);
        self.error = Some(message);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ReachResult>,
}

impl ReachSummary {
    pub fn from_results(results: Vec<ReachResult>) -> Self {
        let passed = results.iter().filter(|r| r.reachable).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.passed as f64 / self.total as f64) * 100.0
    }
}

/// Status classes counted as reachable for a plain status check
pub fn is_reachable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::OK | StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND
    )
}

/// Issues one GET per target; no retries and redirects are not followed
pub struct ReachabilityChecker {
    client: reqwest::Client,
}

impl ReachabilityChecker {
    pub fn new(timeout: Duration) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("pageprobe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub async fn check(&self, target: &ReachTarget) -> ReachResult {
        let start = Instant::now();
        let mut result = match &target.check {
            ReachCheck::Status => self.check_status(target).await,
            ReachCheck::Content { expected } => self.check_content(target, expected).await,
            ReachCheck::Markets => self.check_markets(target).await,
        };
        result.elapsed_ms = start.elapsed().as_millis() as u64;

        if result.reachable {
            info!("✓ {} ({})", target.description, status_label(result.status));
        } else {
            error!(
                "✗ {} - {}",
                target.description,
                result.error.as_deref().unwrap_or("unreachable")
            );
        }
        result
    }

    async fn check_status(&self, target: &ReachTarget) -> ReachResult {
        let result = ReachResult::new(target);
        let response = match self.get(&target.url).await {
            Ok(response) => response,
            Err(e) => return transport_failure(result, e),
        };

        let status = response.status();
        let mut result = ReachResult {
            status: Some(status.as_u16()),
            ..result
        };
        if is_reachable_status(status) {
            result.reachable = true;
            result
        } else {
            result.fail(
                FailureKind::UnexpectedStatusCode,
                format!("unexpected status {}", status.as_u16()),
            )
        }
    }

    /// 200 and every expected substring in the body
    pub async fn check_content(&self, target: &ReachTarget, expected: &[String]) -> ReachResult {
        let (result, body) = match self.fetch_ok_body(target).await {
            Ok(fetched) => fetched,
            Err(result) => return result,
        };

        let missing: Vec<String> = expected
            .iter()
            .filter(|needle| !body.contains(needle.as_str()))
            .cloned()
            .collect();
        for needle in &missing {
            debug!("{}: missing '{}'", target.description, needle);
        }

        if missing.is_empty() {
            ReachResult {
                reachable: true,
                ..result
            }
        } else {
            let message = format!("missing content: {}", missing.join(", "));
            ReachResult { missing, ..result }.fail(FailureKind::ContentMismatch, message)
        }
    }

    /// 200 and a JSON body holding a top-level `data` list
    pub async fn check_markets(&self, target: &ReachTarget) -> ReachResult {
        let (result, body) = match self.fetch_ok_body(target).await {
            Ok(fetched) => fetched,
            Err(result) => return result,
        };

        let count = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| value.get("data").and_then(|d| d.as_array()).map(Vec::len));

        match count {
            Some(count) => {
                debug!("{}: {} market(s)", target.description, count);
                ReachResult {
                    reachable: true,
                    market_count: Some(count),
                    ..result
                }
            }
            None => result.fail(
                FailureKind::ContentMismatch,
                "response has no top-level data list".to_string(),
            ),
        }
    }

    /// Check every target in order
    pub async fn run_all(&self, targets: &[ReachTarget]) -> ReachSummary {
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            results.push(self.check(target).await);
        }
        let summary = ReachSummary::from_results(results);
        info!(
            "Reachability: {}/{} passed ({:.1}%)",
            summary.passed,
            summary.total,
            summary.success_rate()
        );
        summary
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, reqwest::Error> {
        debug!("GET {}", url);
        self.client.get(url).send().await
    }

    async fn fetch_ok_body(&self, target: &ReachTarget) -> Result<(ReachResult, String), ReachResult> {
        let result = ReachResult::new(target);
        let response = self
            .get(&target.url)
            .await
            .map_err(|e| transport_failure(result.clone(), e))?;

        let status = response.status();
        let result = ReachResult {
            status: Some(status.as_u16()),
            ..result
        };
        if status != StatusCode::OK {
            return Err(result.fail(
                FailureKind::UnexpectedStatusCode,
                format!("expected 200, got {}", status.as_u16()),
            ));
        }

        match response.text().await {
            Ok(body) => Ok((result, body)),
            Err(e) => Err(transport_failure(result, e)),
        }
    }
}

fn transport_failure(result: ReachResult, e: reqwest::Error) -> ReachResult {
    let kind = if e.is_timeout() {
        FailureKind::NetworkTimeout
    } else {
        FailureKind::ConnectionFailed
    };
    result.fail(kind, e.to_string())
}

fn status_label(status: Option<u16>) -> String {
    status.map(|s| s.to_string()).unwrap_or_else(|| "no status".to_string())
}
