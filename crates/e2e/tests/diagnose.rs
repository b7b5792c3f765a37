mod common;

use common::{fast_probe_config, Behavior, FakeLauncher, FakePage};
use pageprobe_e2e::catalog;
use pageprobe_e2e::diagnose::{diagnose_page, DiagnoseConfig};
use pageprobe_e2e::{Conclusion, Diagnostician};
use std::time::Duration;

fn config(screenshot: Option<std::path::PathBuf>) -> DiagnoseConfig {
    DiagnoseConfig {
        settle_timeout: Duration::from_millis(50),
        ..catalog::diagnose_config(fast_probe_config(), screenshot)
    }
}

fn live_behavior() -> Behavior {
    Behavior {
        console: vec![
            "🚀 FM Wallet Info v1.0.1".to_string(),
            "✅ Tailwind config applied".to_string(),
            "✅ Scittle core loaded".to_string(),
            "✅ React loaded".to_string(),
            "✅ ReactDOM loaded".to_string(),
        ],
        state_json: serde_json::json!({
            "title": "Figure Markets - HASH Price",
            "app_version": "1.0.1",
            "loading_visible": true,
            "error_visible": false,
            "hash_card_visible": false,
            "price_visible": false,
            "libraries": {"React": true, "ReactDOM": true, "scittle": true, "tailwind": true}
        }),
        ..Behavior::default()
    }
}

#[tokio::test]
async fn stuck_page_reports_last_checkpoint() {
    let mut page = FakePage::new(live_behavior());
    let report = diagnose_page(&mut page, catalog::LIVE_URL, &config(None)).await;

    assert!(report.navigation_error.is_none());
    assert!(!report.settled);
    assert_eq!(report.conclusion, Conclusion::StuckLoading);
    assert_eq!(report.state.app_version.as_deref(), Some("1.0.1"));
    assert_eq!(report.console_count, 5);
    assert_eq!(report.last_console.as_deref(), Some("✅ ReactDOM loaded"));
    assert_eq!(report.checkpoints_found(), 5);
    assert_eq!(report.last_checkpoint.as_deref(), Some("ReactDOM loaded"));
    assert_eq!(
        report.first_missing_checkpoint().map(|c| c.name.as_str()),
        Some("Scittle Reagent loaded")
    );
}

#[tokio::test]
async fn working_page_with_screenshot() {
    let mut behavior = live_behavior();
    behavior.state_json["loading_visible"] = serde_json::json!(false);
    behavior.state_json["hash_card_visible"] = serde_json::json!(true);
    behavior.state_json["price_visible"] = serde_json::json!(true);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("live-site.png");
    let launcher = FakeLauncher::new(behavior);
    let recorder = launcher.recorder.clone();

    let report = Diagnostician::new(Box::new(launcher), config(Some(path.clone())))
        .run(catalog::LIVE_URL)
        .await
        .unwrap();

    assert_eq!(report.conclusion, Conclusion::Working);
    assert_eq!(report.screenshot.as_deref(), Some(path.as_path()));
    assert!(path.exists());

    let recorder = recorder.lock().unwrap();
    assert_eq!(recorder.visited, vec![catalog::LIVE_URL.to_string()]);
    assert_eq!(recorder.sessions_closed, 1);
}

#[tokio::test]
async fn navigation_failure_is_reported() {
    let behavior = Behavior {
        fail_navigation: Some("net::ERR_NAME_NOT_RESOLVED".to_string()),
        ..Behavior::default()
    };
    let mut page = FakePage::new(behavior);
    let report = diagnose_page(&mut page, catalog::LIVE_URL, &config(None)).await;

    assert!(report.navigation_error.unwrap().contains("ERR_NAME_NOT_RESOLVED"));
    assert_eq!(report.conclusion, Conclusion::Unknown);
}
