//! Plain HTTP reachability of local paths, CDNs and the exchange API

use anyhow::Result;
use clap::Args;
use pageprobe_e2e::catalog;
use pageprobe_e2e::ReachabilityChecker;

use super::{stop_server, Context};
use crate::output::print_reach;

#[derive(Args)]
pub struct ReachArgs {
    /// Local server to check instead of the base URL
    #[arg(long, env = "TEST_SERVER")]
    pub server: Option<String>,

    /// Skip the CDN and API targets
    #[arg(long)]
    pub local_only: bool,
}

pub async fn execute(ctx: &Context, args: ReachArgs) -> Result<bool> {
    let base_url = args.server.as_deref().unwrap_or(&ctx.config.base_url);
    let mut targets = catalog::reach_targets(base_url);
    if args.local_only {
        targets.retain(|t| t.url.starts_with(base_url));
    }

    let server = if args.server.is_some() {
        None
    } else {
        ctx.start_server().await?
    };

    let checker = ReachabilityChecker::new(ctx.config.reach.timeout())?;
    let summary = checker.run_all(&targets).await;
    stop_server(server).await;

    print_reach(&summary, ctx.format);
    Ok(summary.success())
}
