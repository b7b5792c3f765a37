//! Live-site diagnostic

use anyhow::Result;
use clap::Args;
use pageprobe_e2e::{catalog, Conclusion, Diagnostician, ProbeConfig};
use std::path::PathBuf;

use super::Context;
use crate::output::print_diagnostic;

#[derive(Args)]
pub struct DiagnoseArgs {
    /// Deployed page to diagnose
    #[arg(long, env = "PAGEPROBE_LIVE_URL", default_value = catalog::LIVE_URL)]
    pub url: String,

    /// Screenshot path (defaults to the output screenshot directory)
    #[arg(long)]
    pub screenshot: Option<PathBuf>,

    /// Do not take a screenshot
    #[arg(long, conflicts_with = "screenshot")]
    pub no_screenshot: bool,
}

pub async fn execute(ctx: &Context, args: DiagnoseArgs) -> Result<bool> {
    let screenshot = if args.no_screenshot || !ctx.config.output.screenshots {
        None
    } else {
        Some(
            args.screenshot
                .unwrap_or_else(|| ctx.config.output.screenshot_dir().join("live-site.png")),
        )
    };

    let config = catalog::diagnose_config(ProbeConfig::from(&ctx.config.probe), screenshot);
    let report = Diagnostician::new(ctx.launcher(), config).run(&args.url).await?;

    print_diagnostic(&report, ctx.format);
    Ok(report.conclusion == Conclusion::Working)
}
