//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pageprobe_common::Status;
use pageprobe_e2e::{DiagnosticReport, ProbeOutcome, ReachResult, ReachSummary, ScenarioResult, SuiteResult};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json | OutputFormat::Yaml => print_structured(items, format),
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print a value as JSON or YAML
pub fn print_structured<T: Serialize + ?Sized>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(value).unwrap_or_default()),
        _ => println!("{}", serde_json::to_string_pretty(value).unwrap_or_default()),
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}

fn status_mark(status: Status) -> String {
    match status {
        Status::Passed => "✓ passed".green().to_string(),
        Status::Failed => "✗ failed".red().to_string(),
        Status::Skipped => "⊘ skipped".yellow().to_string(),
    }
}

fn reach_mark(reachable: bool) -> String {
    if reachable {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

impl TableDisplay for ScenarioResult {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Status", "Checks", "Time", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        let checks = if self.total_checks == 0 {
            "-".to_string()
        } else {
            format!("{}/{} (need {})", self.matched.len(), self.total_checks, self.required)
        };
        let detail = self
            .skip_reason
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_default();
        vec![
            self.name.clone(),
            status_mark(self.status),
            checks,
            format!("{} ms", self.duration_ms),
            detail,
        ]
    }
}

impl TableDisplay for ReachResult {
    fn headers() -> Vec<&'static str> {
        vec!["", "Target", "URL", "Status", "Time", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            reach_mark(self.reachable),
            self.description.clone(),
            self.url.clone(),
            self.status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
            format!("{} ms", self.elapsed_ms),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

/// Scenario table followed by totals and the verdict
pub fn print_suite(suite: &SuiteResult, format: OutputFormat) {
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        print_structured(suite, format);
        return;
    }

    print_list(&suite.results, format);
    for result in suite.results.iter().filter(|r| !r.missing.is_empty()) {
        println!("  {} missing: {}", result.name.bold(), result.missing.join(", "));
    }
    for result in suite.results.iter().filter(|r| !r.notes_missing.is_empty()) {
        println!("  {} not shown: {}", result.name.bold(), result.notes_missing.join(", "));
    }

    let tally = &suite.tally;
    println!();
    println!(
        "Total: {}  {} {}  {} {}  {} {}",
        tally.total,
        "passed".green(),
        tally.passed,
        "failed".red(),
        tally.failed,
        "skipped".yellow(),
        tally.skipped
    );

    if tally.failed > 0 {
        print_error(&format!("{} scenario(s) failed", tally.failed));
    } else if tally.all_skipped() {
        print_warning("All scenarios skipped - no scenario input was provided");
    } else {
        print_success("All scenarios passed");
    }
}

pub fn print_reach(summary: &ReachSummary, format: OutputFormat) {
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        print_structured(summary, format);
        return;
    }

    print_list(&summary.results, format);
    println!();
    println!(
        "Total: {}  {} {}  {} {}  success rate {:.1}%",
        summary.total,
        "passed".green(),
        summary.passed,
        "failed".red(),
        summary.failed,
        summary.success_rate()
    );
}

pub fn print_diagnostic(report: &DiagnosticReport, format: OutputFormat) {
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        print_structured(report, format);
        return;
    }

    let yes_no = |b: bool| if b { "yes".green() } else { "no".red() };
    let state = &report.state;

    println!("{}", report.url.bold());
    if let Some(e) = &report.navigation_error {
        print_error(&format!("Navigation failed: {}", e));
    }
    println!("  Title:          {}", state.title.as_deref().unwrap_or("-"));
    println!("  APP_VERSION:    {}", state.app_version.as_deref().unwrap_or("-"));
    println!("  Loading shown:  {}", yes_no(state.loading_visible));
    println!("  Error shown:    {}", yes_no(state.error_visible));
    println!("  HASH card:      {}", yes_no(state.hash_card_visible));
    println!("  Price shown:    {}", yes_no(state.price_visible));

    println!("  Libraries:");
    for (name, loaded) in &state.libraries {
        println!("    {} {}", reach_mark(*loaded), name);
    }

    println!("  Console lines:  {}", report.console_count);
    if let Some(last) = &report.last_console {
        println!("  Last console:   {}", last);
    }
    for error in &report.page_errors {
        println!("  {} {}", "page error:".red(), error);
    }

    println!(
        "  Checkpoints:    {}/{}",
        report.checkpoints_found(),
        report.checkpoints.len()
    );
    for cp in &report.checkpoints {
        println!("    {} {}", reach_mark(cp.found), cp.name);
    }
    if let Some(missing) = report.first_missing_checkpoint() {
        println!("  Stopped before: {}", missing.name.yellow());
    }
    if let Some(path) = &report.screenshot {
        println!("  Screenshot:     {}", path.display());
    }

    println!();
    match report.conclusion {
        pageprobe_e2e::Conclusion::Working => print_success(&report.conclusion.to_string()),
        pageprobe_e2e::Conclusion::Unknown => print_warning(&report.conclusion.to_string()),
        _ => print_error(&report.conclusion.to_string()),
    }
}

pub fn print_probe(url: &str, outcome: &ProbeOutcome, format: OutputFormat) {
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        print_structured(outcome, format);
        return;
    }

    match &outcome.failure {
        None => print_success(&format!("Reached {} in {} ms", url, outcome.elapsed_ms)),
        Some(f) => print_error(&format!("{} ({}, {} ms)", f, f.kind(), outcome.elapsed_ms)),
    }
    if let Some(snapshot) = &outcome.snapshot {
        if let Some(title) = &snapshot.title {
            println!("  Title: {}", title);
        }
        println!("  Text:  {}", snapshot.excerpt(500));
        for error in &snapshot.page_errors {
            println!("  {} {}", "page error:".red(), error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageprobe_e2e::ScenarioSpec;

    #[test]
    fn test_skipped_row_shows_reason() {
        let spec = ScenarioSpec::new("Empty Wallet", "/");
        let result = ScenarioResult::skipped(&spec, "WALLET_EMPTY is not set".to_string());
        let row = result.row();
        assert_eq!(row.len(), ScenarioResult::headers().len());
        assert_eq!(row[0], "Empty Wallet");
        assert_eq!(row[2], "-");
        assert_eq!(row[4], "WALLET_EMPTY is not set");
    }
}
