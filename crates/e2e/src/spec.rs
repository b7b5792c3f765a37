//! Declarative YAML scenario definitions

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{E2eError, E2eResult};

/// Placeholder replaced by the resolved scenario input inside step values
pub const INPUT_PLACEHOLDER: &str = "{{input}}";

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Target URL, absolute or relative to the base URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Where the scenario input (a wallet address) comes from
    #[serde(default)]
    pub input: Option<InputSource>,

    /// Condition that must hold before interacting
    #[serde(default)]
    pub ready: Option<Readiness>,

    /// Interaction steps, applied in order
    #[serde(default)]
    pub steps: Vec<InteractionStep>,

    /// Condition that must hold after interacting
    #[serde(default)]
    pub settle: Option<Readiness>,

    /// Upper bound for each readiness condition
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Element whose text is checked
    #[serde(default = "default_content_selector")]
    pub content_selector: String,

    /// Substrings expected in the final snapshot
    #[serde(default)]
    pub checks: Vec<Check>,

    /// Substrings that must not appear in the final snapshot
    #[serde(default)]
    pub forbidden: Vec<String>,

    /// Substrings reported as shown or not shown, never counted by the policy
    #[serde(default)]
    pub notes: Vec<Check>,

    /// How many checks must match
    #[serde(default)]
    pub policy: MatchPolicy,

    /// Globals whose presence is recorded in the snapshot
    #[serde(default)]
    pub library_globals: Vec<String>,

    /// Screenshot name, saved after the probe when set
    #[serde(default)]
    pub screenshot: Option<String>,
}

fn default_url() -> String {
    "/".to_string()
}

fn default_content_selector() -> String {
    "#app".to_string()
}

/// Source of the scenario input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum InputSource {
    /// Read from an environment variable; unset means the scenario is skipped
    Env {
        var: String,
        #[serde(default)]
        default: Option<String>,
    },

    /// Fixed value
    Literal { value: String },
}

/// Condition evaluated repeatedly until it holds or times out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Readiness {
    /// Element text includes any of the markers
    TextContains { selector: String, any: Vec<String> },

    /// Element exists
    Selector { selector: String },

    /// JavaScript expression evaluates to true
    Script { expression: String },

    /// Fixed delay; only for pages without a stable DOM marker
    Fixed { ms: u64 },
}

impl Readiness {
    pub fn text_contains(selector: &str, any: &[&str]) -> Self {
        Readiness::TextContains {
            selector: selector.to_string(),
            any: any.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn selector(selector: &str) -> Self {
        Readiness::Selector {
            selector: selector.to_string(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Readiness::TextContains { selector, any } => {
                format!("text of {} contains any of {:?}", selector, any)
            }
            Readiness::Selector { selector } => format!("element {} present", selector),
            Readiness::Script { expression } => format!("script `{}`", expression),
            Readiness::Fixed { ms } => format!("fixed delay {}ms", ms),
        }
    }
}

/// A single interaction with the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InteractionStep {
    /// Set an input value and dispatch input/change events
    Fill { selector: String, value: String },

    /// Click an element
    Click { selector: String },
}

impl InteractionStep {
    pub fn selector(&self) -> &str {
        match self {
            InteractionStep::Fill { selector, .. } | InteractionStep::Click { selector } => selector,
        }
    }

    pub fn name(&self) -> String {
        match self {
            InteractionStep::Fill { selector, .. } => format!("fill:{}", selector),
            InteractionStep::Click { selector } => format!("click:{}", selector),
        }
    }

    /// Replace the input placeholder with `input`
    pub fn with_input(&self, input: Option<&str>) -> Self {
        match (self, input) {
            (InteractionStep::Fill { selector, value }, Some(input)) => InteractionStep::Fill {
                selector: selector.clone(),
                value: value.replace(INPUT_PLACEHOLDER, input),
            },
            _ => self.clone(),
        }
    }
}

/// One expected substring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Check {
    pub fn new(text: &str, description: &str) -> Self {
        Self {
            text: text.to_string(),
            description: Some(description.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.text)
    }
}

impl From<&str> for Check {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_string(),
            description: None,
        }
    }
}

/// How many checks must match for the scenario to pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Every check must match
    #[default]
    All,

    /// At least `count` checks must match
    AtLeast { count: usize },

    /// At least `ratio` (0.0 - 1.0) of the checks must match
    Fraction { ratio: f64 },
}

impl MatchPolicy {
    /// Number of matches required out of `total` checks
    pub fn required(&self, total: usize) -> usize {
        match self {
            MatchPolicy::All => total,
            MatchPolicy::AtLeast { count } => *count,
            MatchPolicy::Fraction { ratio } => {
                let ratio = ratio.clamp(0.0, 1.0);
                // absorb float error so 0.07 * 100 stays 7
                ((ratio * total as f64) - 1e-9).ceil().max(0.0) as usize
            }
        }
    }
}

impl ScenarioSpec {
    /// Minimal spec: a name and a URL
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            tags: Vec::new(),
            url: url.to_string(),
            input: None,
            ready: None,
            steps: Vec::new(),
            settle: None,
            timeout_ms: None,
            content_selector: default_content_selector(),
            checks: Vec::new(),
            forbidden: Vec::new(),
            notes: Vec::new(),
            policy: MatchPolicy::All,
            library_globals: Vec::new(),
            screenshot: None,
        }
    }

    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory tree, ordered by file name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }

        Ok(specs)
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("scenario name is empty".to_string()));
        }
        if let MatchPolicy::Fraction { ratio } = self.policy {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(E2eError::SpecParse(format!(
                    "{}: fraction ratio {} outside 0.0-1.0",
                    self.name, ratio
                )));
            }
        }
        let uses_input = self.steps.iter().any(|s| match s {
            InteractionStep::Fill { value, .. } => value.contains(INPUT_PLACEHOLDER),
            InteractionStep::Click { .. } => false,
        });
        if uses_input && self.input.is_none() {
            return Err(E2eError::SpecParse(format!(
                "{}: steps use {} but no input is declared",
                self.name, INPUT_PLACEHOLDER
            )));
        }
        Ok(())
    }

    /// Resolve the scenario input.
    ///
    /// `Ok(None)` means the scenario takes no input. `Err(var)` names the
    /// environment variable that is unset, which makes the scenario skipped.
    pub fn resolve_input<F>(&self, lookup: F) -> Result<Option<String>, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        match &self.input {
            None => Ok(None),
            Some(InputSource::Literal { value }) => Ok(Some(value.clone())),
            Some(InputSource::Env { var, default }) => {
                match lookup(var).filter(|v| !v.trim().is_empty()) {
                    Some(value) => Ok(Some(value)),
                    None => default.clone().map(Some).ok_or_else(|| var.clone()),
                }
            }
        }
    }

    /// Absolute URL for this scenario
    pub fn resolve_url(&self, base_url: &str) -> String {
        resolve_url(base_url, &self.url)
    }

    /// Steps with the input placeholder substituted
    pub fn resolved_steps(&self, input: Option<&str>) -> Vec<InteractionStep> {
        self.steps.iter().map(|s| s.with_input(input)).collect()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Join a possibly relative URL onto a base URL
pub fn resolve_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("about:") {
        url.to_string()
    } else {
        format!(
            "{}{}",
            base_url.trim_end_matches('/'),
            if url.starts_with('/') {
                url.to_string()
            } else {
                format!("/{}", url)
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_parse_wallet_spec() {
        let yaml = r##"
name: Empty Wallet
description: Wallet with no balances
tags:
  - wallet
  - smoke
input:
  from: env
  var: WALLET_EMPTY
ready:
  kind: selector
  selector: '#wallet-address-input'
steps:
  - action: fill
    selector: '#wallet-address-input'
    value: '{{input}}'
  - action: click
    selector: '#fetch-wallet-data-button'
settle:
  kind: text_contains
  selector: '#app'
  any: [Wallet Account Info, Error]
timeout_ms: 15000
checks:
  - text: Account Type
  - text: Is Vesting
    description: Vesting status field
forbidden: [Error]
policy:
  mode: at_least
  count: 1
"##;
        let spec = ScenarioSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.name, "Empty Wallet");
        assert_eq!(spec.url, "/");
        assert_eq!(spec.content_selector, "#app");
        assert_eq!(spec.steps.len(), 2);
        assert_eq!(spec.checks[1].label(), "Vesting status field");
        assert_eq!(spec.policy, MatchPolicy::AtLeast { count: 1 });
        assert_eq!(spec.timeout(), Some(Duration::from_secs(15)));
        assert!(matches!(spec.settle, Some(Readiness::TextContains { .. })));
    }

    #[test]
    fn test_placeholder_without_input_is_rejected() {
        let yaml = r#"
name: broken
steps:
  - action: fill
    selector: '#wallet-address-input'
    value: '{{input}}'
"#;
        assert!(matches!(
            ScenarioSpec::from_yaml(yaml),
            Err(E2eError::SpecParse(_))
        ));
    }

    #[test]
    fn test_resolve_input_from_env() {
        let mut spec = ScenarioSpec::new("s", "/");
        spec.input = Some(InputSource::Env {
            var: "WALLET_EMPTY".to_string(),
            default: None,
        });

        let found = spec.resolve_input(|k| (k == "WALLET_EMPTY").then(|| "pb1abc".to_string()));
        assert_eq!(found, Ok(Some("pb1abc".to_string())));

        let missing = spec.resolve_input(|_| None);
        assert_eq!(missing, Err("WALLET_EMPTY".to_string()));

        let blank = spec.resolve_input(|_| Some("  ".to_string()));
        assert_eq!(blank, Err("WALLET_EMPTY".to_string()));
    }

    #[test]
    fn test_resolve_input_env_default() {
        let mut spec = ScenarioSpec::new("s", "/");
        spec.input = Some(InputSource::Env {
            var: "WALLET_VESTING".to_string(),
            default: Some("pb1fallback".to_string()),
        });
        assert_eq!(spec.resolve_input(|_| None), Ok(Some("pb1fallback".to_string())));
    }

    #[test]
    fn test_resolved_steps_substitute_input() {
        let mut spec = ScenarioSpec::new("s", "/");
        spec.steps = vec![
            InteractionStep::Fill {
                selector: "#wallet-address-input".to_string(),
                value: INPUT_PLACEHOLDER.to_string(),
            },
            InteractionStep::Click {
                selector: "#fetch-wallet-data-button".to_string(),
            },
        ];
        let steps = spec.resolved_steps(Some("pb1xyz"));
        assert_eq!(
            steps[0],
            InteractionStep::Fill {
                selector: "#wallet-address-input".to_string(),
                value: "pb1xyz".to_string(),
            }
        );
        assert_eq!(steps[1].name(), "click:#fetch-wallet-data-button");
    }

    #[test_case(MatchPolicy::All, 9, 9)]
    #[test_case(MatchPolicy::AtLeast { count: 8 }, 9, 8)]
    #[test_case(MatchPolicy::AtLeast { count: 10 }, 11, 10)]
    #[test_case(MatchPolicy::Fraction { ratio: 0.5 }, 3, 2)]
    #[test_case(MatchPolicy::Fraction { ratio: 1.0 }, 4, 4)]
    #[test_case(MatchPolicy::Fraction { ratio: 0.07 }, 100, 7)]
    #[test_case(MatchPolicy::Fraction { ratio: 0.0 }, 5, 0)]
    fn test_policy_required(policy: MatchPolicy, total: usize, expected: usize) {
        assert_eq!(policy.required(total), expected);
    }

    #[test_case("http://localhost:8000", "/", "http://localhost:8000/")]
    #[test_case("http://localhost:8000/", "index-local.html", "http://localhost:8000/index-local.html")]
    #[test_case("http://localhost:8000", "https://franks42.github.io/fm-wallet-info/", "https://franks42.github.io/fm-wallet-info/")]
    fn test_resolve_url(base: &str, url: &str, expected: &str) {
        assert_eq!(resolve_url(base, url), expected);
    }

    #[test]
    fn test_load_all_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "name: second\n").unwrap();
        std::fs::write(dir.path().join("a.yml"), "name: first\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let specs = ScenarioSpec::load_all(dir.path()).unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
