//! Built-in scenarios and targets for the FM Wallet Info page

use std::path::PathBuf;
use std::time::Duration;

use crate::diagnose::{Checkpoint, DiagnoseConfig};
use crate::probe::ProbeConfig;
use crate::reach::ReachTarget;
use crate::spec::{Check, InputSource, InteractionStep, MatchPolicy, Readiness, ScenarioSpec, INPUT_PLACEHOLDER};

pub const WALLET_INPUT: &str = "#wallet-address-input";
pub const FETCH_BUTTON: &str = "#fetch-wallet-data-button";
pub const APP_CONTAINER: &str = "#app";

/// Published build of the page
pub const LIVE_URL: &str = "https://franks42.github.io/fm-wallet-info/";

pub const MARKETS_API: &str = "https://www.figuremarkets.com/service-hft-exchange/api/v1/markets";

/// Sample non-vesting account used when `WALLET_NO_VESTING` is unset
pub const SAMPLE_NO_VESTING: &str = "pb1dsuqw9wn7r0g8m9pm6em8es3fh0l52zrlequcwvnw5yjfkwrqp5scax55t";

/// Sample vesting account used when `WALLET_VESTING` is unset
pub const SAMPLE_VESTING: &str = "pb1c9rqwfefggk3s3y79rh8quwvp8rf8ayr7qvmk8";

/// Globals the page loads from CDNs
pub const LIBRARY_GLOBALS: [&str; 4] = ["React", "ReactDOM", "scittle", "tailwind"];

/// Default match thresholds for the wallet-data scenarios
pub const NO_VESTING_MIN: usize = 8;
pub const VESTING_MIN: usize = 10;

const WALLET_TIMEOUT_MS: u64 = 15_000;

fn library_globals() -> Vec<String> {
    LIBRARY_GLOBALS.iter().map(|s| s.to_string()).collect()
}

fn checks(items: &[(&str, &str)]) -> Vec<Check> {
    items.iter().map(|(text, desc)| Check::new(text, desc)).collect()
}

/// Enter the input into the wallet form and submit it
fn wallet_form_steps() -> Vec<InteractionStep> {
    vec![
        InteractionStep::Fill {
            selector: WALLET_INPUT.to_string(),
            value: INPUT_PLACEHOLDER.to_string(),
        },
        InteractionStep::Click {
            selector: FETCH_BUTTON.to_string(),
        },
    ]
}

fn wallet_scenario(name: &str, input: InputSource, settle_on: &str) -> ScenarioSpec {
    ScenarioSpec {
        input: Some(input),
        ready: Some(Readiness::selector(WALLET_INPUT)),
        steps: wallet_form_steps(),
        settle: Some(Readiness::text_contains(APP_CONTAINER, &[settle_on, "Error"])),
        timeout_ms: Some(WALLET_TIMEOUT_MS),
        tags: vec!["wallet".to_string()],
        ..ScenarioSpec::new(name, "/")
    }
}

fn env_input(var: &str) -> InputSource {
    InputSource::Env {
        var: var.to_string(),
        default: None,
    }
}

/// The four wallet-info scenarios, one per `WALLET_*` variable
pub fn wallet_scenarios() -> Vec<ScenarioSpec> {
    let info_notes = checks(&[
        ("Account Type", "Account type displayed"),
        ("Is Vesting", "Vesting status displayed"),
        ("Assets Under Management", "AUM displayed"),
    ]);

    let displayed = |name: &str, var: &str| ScenarioSpec {
        description: format!("Wallet info for the address in {}", var),
        checks: vec![Check::new("Wallet Account Info", "Wallet data displayed")],
        notes: info_notes.clone(),
        forbidden: vec!["Error".to_string()],
        ..wallet_scenario(name, env_input(var), "Wallet Account Info")
    };

    vec![
        displayed("Empty Wallet", "WALLET_EMPTY"),
        displayed("No Vesting Wallet", "WALLET_NO_VESTING"),
        displayed("Vesting Wallet", "WALLET_VESTING"),
        ScenarioSpec {
            description: "An invalid address shows the error state".to_string(),
            checks: vec![Check::new("Error", "Error state displayed")],
            ..wallet_scenario("Invalid Wallet", env_input("WALLET_INVALID"), "Wallet Account Info")
        },
    ]
}

/// Multi-endpoint balance and delegation checks, thresholded
pub fn wallet_data_scenarios(no_vesting_min: usize, vesting_min: usize) -> Vec<ScenarioSpec> {
    let balance_checks = checks(&[
        ("Account Balance", "Account Balance section"),
        ("Liquid", "Liquid field"),
        ("Committed", "Committed field"),
        ("Delegated", "Delegated field"),
        ("WALLET TOTAL", "Wallet total calculation"),
        ("Delegation Details", "Delegation details section"),
        ("TOTAL DELEGATED", "Total delegated sum"),
        ("Staked", "Staked amount"),
        ("Rewards", "Rewards amount"),
    ]);

    let mut vesting_checks = balance_checks.clone();
    vesting_checks.extend(checks(&[
        ("Unvested", "Unvested amount"),
        ("AVAILABLE", "Available amount"),
    ]));

    let scenario = |name: &str, var: &str, sample: &str, checks: Vec<Check>, count: usize| {
        let input = InputSource::Env {
            var: var.to_string(),
            default: Some(sample.to_string()),
        };
        ScenarioSpec {
            description: format!("Balances and delegations for {}", var),
            tags: vec!["wallet-data".to_string()],
            checks,
            policy: MatchPolicy::AtLeast { count },
            ..wallet_scenario(name, input, "Delegation Details")
        }
    };

    vec![
        scenario(
            "No Vesting Wallet Data",
            "WALLET_NO_VESTING",
            SAMPLE_NO_VESTING,
            balance_checks,
            no_vesting_min,
        ),
        scenario(
            "Vesting Wallet Data",
            "WALLET_VESTING",
            SAMPLE_VESTING,
            vesting_checks,
            vesting_min,
        ),
    ]
}

/// Account information and delegation summary sections
pub fn summary_scenario() -> ScenarioSpec {
    let input = InputSource::Env {
        var: "WALLET_NO_VESTING".to_string(),
        default: Some(SAMPLE_NO_VESTING.to_string()),
    };
    ScenarioSpec {
        description: "Comprehensive account summary".to_string(),
        tags: vec!["summary".to_string()],
        checks: checks(&[
            ("Account Information", "Account Information section"),
            ("Delegation Summary", "Delegation Summary section"),
            ("Account Type", "Account type field"),
            ("Is Vesting", "Vesting status field"),
            ("Assets Under Management", "AUM field"),
            ("Validators", "Validators count"),
            ("Staked", "Staked amount"),
            ("Rewards", "Rewards amount"),
            ("Total Delegated", "Total delegation"),
            ("HASH", "HASH currency formatting"),
        ]),
        ..wallet_scenario("Wallet Summary", input, "Delegation Summary")
    }
}

/// HASH price quote is rendered
pub fn price_scenario() -> ScenarioSpec {
    ScenarioSpec {
        description: "HASH price quote from the exchange API".to_string(),
        tags: vec!["price".to_string()],
        ready: Some(Readiness::selector(APP_CONTAINER)),
        settle: Some(Readiness::text_contains(APP_CONTAINER, &["$", "Error"])),
        timeout_ms: Some(WALLET_TIMEOUT_MS),
        checks: checks(&[("HASH Price", "Price heading"), ("$", "Dollar amount")]),
        library_globals: library_globals(),
        screenshot: Some("hash-price".to_string()),
        ..ScenarioSpec::new("HASH Price", "/")
    }
}

/// Minimal page used to confirm the in-browser script runtime starts
pub fn hello_scenario() -> ScenarioSpec {
    ScenarioSpec {
        description: "ClojureScript runtime renders into #app".to_string(),
        tags: vec!["smoke".to_string()],
        ready: Some(Readiness::selector(APP_CONTAINER)),
        settle: Some(Readiness::text_contains(
            APP_CONTAINER,
            &["Hello from ClojureScript", "Error"],
        )),
        timeout_ms: Some(10_000),
        checks: vec![Check::from("Hello from ClojureScript")],
        forbidden: vec!["Error".to_string()],
        ..ScenarioSpec::new("Hello", "/")
    }
}

/// Local pages, CDN dependencies and the exchange API
pub fn reach_targets(base_url: &str) -> Vec<ReachTarget> {
    let local = |path: &str| crate::spec::resolve_url(base_url, path);

    vec![
        ReachTarget::status(&local("/index.html"), "Local index.html"),
        ReachTarget::status(&local("/test-cdn.html"), "Local test-cdn.html"),
        ReachTarget::content(
            &local("/index.html"),
            "index.html content",
            &[
                "Figure Markets",
                "HASH Price",
                "v1.0.1",
                "cdn.tailwindcss.com",
                "cdn.jsdelivr.net",
                "unpkg.com",
                "scittle",
                "fm_wallet.cljs",
            ],
        ),
        ReachTarget::status(&local("/src/fm_wallet.cljs"), "ClojureScript source"),
        ReachTarget::status("https://cdn.tailwindcss.com/", "Tailwind CSS CDN"),
        ReachTarget::status(
            "https://cdn.jsdelivr.net/npm/scittle@0.7.28/dist/scittle.js",
            "Scittle CDN",
        ),
        ReachTarget::status(
            "https://unpkg.com/react@18/umd/react.production.min.js",
            "React CDN",
        ),
        ReachTarget::status("https://www.figuremarkets.com", "Figure Markets site"),
        ReachTarget::markets(MARKETS_API, "Figure Markets markets API"),
    ]
}

/// Startup sequence logged to the console by the live page
pub fn checkpoints() -> Vec<Checkpoint> {
    [
        ("FM Wallet Info v1.0.1", "App started"),
        ("Tailwind config applied", "Tailwind config applied"),
        ("Scittle core loaded", "Scittle core loaded"),
        ("React loaded", "React loaded"),
        ("ReactDOM loaded", "ReactDOM loaded"),
        ("Scittle Reagent loaded", "Scittle Reagent loaded"),
        ("Window load event fired", "Window load event fired"),
        ("CLJS: Namespace fm-wallet loading", "CLJS: Namespace fm-wallet loading"),
        ("CLJS: app-state created", "CLJS: app-state created"),
        ("CLJS: init function called", "CLJS: init function called"),
        ("CLJS: mount-root called", "CLJS: mount-root called"),
        ("CLJS: Reagent render complete", "CLJS: Reagent render complete"),
        ("CLJS: fetch-hash-price! called", "CLJS: fetch-hash-price! called"),
        ("CLJS: Got response", "CLJS: Got response"),
        ("CLJS: JSON parsed", "CLJS: JSON parsed"),
        ("CLJS: HASH-USD market", "CLJS: HASH-USD market"),
        ("CLJS: App state updated successfully", "CLJS: App state updated successfully"),
    ]
    .iter()
    .map(|(marker, name)| Checkpoint::new(marker, name))
    .collect()
}

/// Diagnostic settings for the live page
pub fn diagnose_config(probe: ProbeConfig, screenshot: Option<PathBuf>) -> DiagnoseConfig {
    DiagnoseConfig {
        probe,
        settle_timeout: Duration::from_secs(10),
        checkpoints: checkpoints(),
        library_globals: library_globals(),
        screenshot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_scenarios_are_env_driven() {
        let specs = wallet_scenarios();
        let vars: Vec<_> = specs
            .iter()
            .map(|s| match &s.input {
                Some(InputSource::Env { var, default: None }) => var.as_str(),
                other => panic!("unexpected input {:?}", other),
            })
            .collect();
        assert_eq!(
            vars,
            vec!["WALLET_EMPTY", "WALLET_NO_VESTING", "WALLET_VESTING", "WALLET_INVALID"]
        );
        for spec in &specs {
            spec.validate().unwrap();
        }
    }

    #[test]
    fn test_wallet_info_without_aum_passes() {
        let empty = &wallet_scenarios()[0];
        let report = crate::runner::evaluate_checks(
            "Wallet Account Info Account Type: BASE Is Vesting ❌ No",
            empty,
        );
        assert!(report.passed);
        assert!(report.missing.is_empty());
        assert_eq!(
            report.notes_missing,
            vec!["Assets Under Management".to_string()]
        );

        let errored = crate::runner::evaluate_checks("Wallet Account Info Error", empty);
        assert!(!errored.passed);
    }

    #[test]
    fn test_invalid_wallet_expects_error() {
        let invalid = wallet_scenarios().pop().unwrap();
        assert_eq!(invalid.name, "Invalid Wallet");
        assert_eq!(invalid.checks, vec![Check::new("Error", "Error state displayed")]);
        assert!(invalid.forbidden.is_empty());
    }

    #[test]
    fn test_wallet_data_thresholds() {
        let specs = wallet_data_scenarios(NO_VESTING_MIN, VESTING_MIN);
        assert_eq!(specs[0].checks.len(), 9);
        assert_eq!(specs[0].policy.required(9), 8);
        assert_eq!(specs[1].checks.len(), 11);
        assert_eq!(specs[1].policy.required(11), 10);

        let relaxed = wallet_data_scenarios(8, 9);
        assert_eq!(relaxed[1].policy, MatchPolicy::AtLeast { count: 9 });
    }

    #[test]
    fn test_reach_targets_resolve_against_base() {
        let targets = reach_targets("http://127.0.0.1:8080/");
        assert_eq!(targets[0].url, "http://127.0.0.1:8080/index.html");
        assert_eq!(targets.len(), 9);
        assert!(targets.iter().any(|t| t.url == MARKETS_API));
    }

    #[test]
    fn test_checkpoint_sequence() {
        let cps = checkpoints();
        assert_eq!(cps.len(), 17);
        assert_eq!(cps[0].name, "App started");
        assert_eq!(cps[16].marker, "CLJS: App state updated successfully");
    }
}
