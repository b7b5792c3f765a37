//! pageprobe E2E harness
//!
//! Drives a real browser against a single-page app and reports what it saw:
//! - Probes a page: navigate, interact, poll a readiness condition, snapshot
//! - Runs named scenarios with expected-substring checks and thresholds
//! - Checks plain HTTP reachability of local paths, CDNs and APIs
//! - Diagnoses how far a live deployment got through its startup sequence
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ScenarioRunner (sequential)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioSpec (YAML or catalog)                             │
//! │    ├── input: env VAR | literal                             │
//! │    ├── ready / settle: Readiness                            │
//! │    ├── steps: [fill | click]                                │
//! │    └── checks, forbidden, policy                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PageProbe                                                  │
//! │    └── run(&mut dyn PageDriver, ProbeRequest) -> Outcome    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserLauncher -> BrowserSession -> PageDriver            │
//! │    └── ChromeLauncher (chromiumoxide)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod chrome;
pub mod diagnose;
pub mod driver;
pub mod error;
pub mod probe;
pub mod reach;
pub mod runner;
pub mod server;
pub mod spec;

pub use chrome::ChromeLauncher;
pub use diagnose::{Conclusion, DiagnosticReport, Diagnostician};
pub use driver::{BrowserLauncher, BrowserSession, PageDriver};
pub use error::{E2eError, E2eResult};
pub use probe::{PageProbe, ProbeConfig, ProbeFailure, ProbeOutcome, ProbeRequest};
pub use reach::{ReachCheck, ReachResult, ReachSummary, ReachTarget, ReachabilityChecker};
pub use runner::{evaluate_checks, CheckReport, RunnerConfig, ScenarioResult, ScenarioRunner, SuiteResult};
pub use server::{ServerConfig, ServerHandle};
pub use spec::{Check, InputSource, InteractionStep, MatchPolicy, Readiness, ScenarioSpec};
