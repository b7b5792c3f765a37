//! pageprobe CLI - Main Entry Point
//!
//! Browser-driven checks for the FM Wallet Info page: wallet scenarios,
//! price and hello pages, YAML scenario specs, plain HTTP reachability and
//! a live-site diagnostic.
//!
//! Exit status: 0 when every required check passed, 1 when something
//! failed or every scenario was skipped, 2 when the harness itself failed.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use pageprobe_common::{HarnessConfig, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;

mod commands;
mod output;

use commands::{config, diagnose, probe, reach, scenarios, Context};

/// pageprobe - browser-driven verification of the FM Wallet Info page
#[derive(Parser)]
#[command(name = "pageprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Base URL of the page under test
    #[arg(long, env = "PAGEPROBE_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Configuration file (optional)
    #[arg(long, env = "PAGEPROBE_CONFIG", default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Directory for results and screenshots
    #[arg(long, env = "PAGEPROBE_OUTPUT", global = true)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Show the browser window
    #[arg(long, global = true)]
    headful: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wallet info scenarios for WALLET_EMPTY, WALLET_NO_VESTING, WALLET_VESTING, WALLET_INVALID
    Wallet,

    /// Balance and delegation checks with match thresholds
    WalletData(scenarios::WalletDataArgs),

    /// Account information and delegation summary
    Summary,

    /// HASH price quote
    Price,

    /// Hello page
    Hello,

    /// Run scenarios from YAML specs
    Run(scenarios::RunArgs),

    /// Check plain HTTP reachability of pages, CDNs and the API
    Reach(reach::ReachArgs),

    /// Diagnose the deployed page
    Diagnose(diagnose::DiagnoseArgs),

    /// Probe a single page ad hoc
    Probe(probe::ProbeArgs),

    /// Configuration file
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Show version information
    Version,
}

impl Cli {
    /// Config file, then environment and flags on top
    fn harness_config(&self) -> anyhow::Result<HarnessConfig> {
        let mut config = HarnessConfig::load(&self.config)
            .with_context(|| format!("loading {}", self.config.display()))?;

        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(output) = &self.output {
            config.output.dir = output.clone();
        }
        if self.headful {
            config.browser.headless = false;
        }

        config.validate()?;
        Ok(config)
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let ctx = Context {
        config: cli.harness_config()?,
        format: cli.format,
    };

    match cli.command {
        Commands::Wallet => scenarios::wallet(&ctx).await,
        Commands::WalletData(args) => scenarios::wallet_data(&ctx, args).await,
        Commands::Summary => scenarios::summary(&ctx).await,
        Commands::Price => scenarios::price(&ctx).await,
        Commands::Hello => scenarios::hello(&ctx).await,
        Commands::Run(args) => scenarios::run(&ctx, args).await,
        Commands::Reach(args) => reach::execute(&ctx, args).await,
        Commands::Diagnose(args) => diagnose::execute(&ctx, args).await,
        Commands::Probe(args) => probe::execute(&ctx, args).await,
        Commands::Config(cmd) => config::execute(&ctx, cmd, &cli.config),
        Commands::Version => {
            println!("pageprobe v{}", pageprobe_common::VERSION);
            println!("Browser-driven verification harness for the FM Wallet Info page");
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let result = run(cli).await;
    if let Err(e) = &result {
        output::print_error(&format!("{:#}", e));
    }
    std::process::exit(exit_code(&result));
}

/// 0 passed, 1 failed or nothing ran, 2 the harness itself failed
fn exit_code(result: &anyhow::Result<bool>) -> i32 {
    match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(_) => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Ok(true)), 0);
        assert_eq!(exit_code(&Ok(false)), 1);
        assert_eq!(exit_code(&Err(anyhow::anyhow!("browser could not launch"))), 2);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pageprobe.toml");
        std::fs::write(&path, "base_url = \"http://127.0.0.1:8080\"\n[output]\nscreenshots = false\n")
            .unwrap();

        let cli = Cli::parse_from([
            "pageprobe",
            "--config",
            path.to_str().unwrap(),
            "--base-url",
            "http://localhost:9000",
            "--headful",
            "price",
        ]);
        let config = cli.harness_config().unwrap();
        assert_eq!(config.base_url, "http://localhost:9000");
        assert!(!config.browser.headless);
        assert!(!config.output.screenshots);
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let cli = Cli::parse_from([
            "pageprobe",
            "--config",
            "/nonexistent/pageprobe.toml",
            "wallet-data",
            "--vesting-min",
            "9",
        ]);
        let config = cli.harness_config().unwrap();
        assert!(config.browser.headless);
        match cli.command {
            Commands::WalletData(args) => assert_eq!(args.vesting_min, 9),
            _ => panic!("expected wallet-data"),
        }
    }
}
