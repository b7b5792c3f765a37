//! Ad hoc single-page probe

use anyhow::Result;
use clap::Args;
use pageprobe_e2e::spec::resolve_url;
use pageprobe_e2e::{InteractionStep, PageProbe, ProbeConfig, ProbeRequest, Readiness};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use super::{stop_server, Context};
use crate::output::print_probe;

#[derive(Args)]
pub struct ProbeArgs {
    /// URL or path relative to the base URL
    #[arg(default_value = "/")]
    pub url: String,

    /// Fill an input, as SELECTOR=VALUE (repeatable, applied before clicks)
    #[arg(long, value_parser = parse_fill)]
    pub fill: Vec<(String, String)>,

    /// Click an element (repeatable)
    #[arg(long)]
    pub click: Vec<String>,

    /// Wait until the content text includes any of these markers
    #[arg(long)]
    pub wait_text: Vec<String>,

    /// Wait until this element exists
    #[arg(long, conflicts_with = "wait_text")]
    pub wait_selector: Option<String>,

    /// Wait until this JavaScript expression is true
    #[arg(long, conflicts_with_all = ["wait_text", "wait_selector"])]
    pub wait_script: Option<String>,

    /// Element whose text is captured
    #[arg(long, default_value = "#app")]
    pub selector: String,

    /// Condition timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Record whether these globals are defined
    #[arg(long)]
    pub global: Vec<String>,

    /// Save a screenshot here after probing
    #[arg(long)]
    pub screenshot: Option<PathBuf>,
}

fn parse_fill(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(selector, value)| (selector.to_string(), value.to_string()))
        .filter(|(selector, _)| !selector.is_empty())
        .ok_or_else(|| format!("expected SELECTOR=VALUE, got '{}'", s))
}

impl ProbeArgs {
    fn request(&self, base_url: &str) -> ProbeRequest {
        let mut steps: Vec<InteractionStep> = self
            .fill
            .iter()
            .map(|(selector, value)| InteractionStep::Fill {
                selector: selector.clone(),
                value: value.clone(),
            })
            .collect();
        steps.extend(self.click.iter().map(|selector| InteractionStep::Click {
            selector: selector.clone(),
        }));

        let settle = if !self.wait_text.is_empty() {
            Some(Readiness::TextContains {
                selector: self.selector.clone(),
                any: self.wait_text.clone(),
            })
        } else if let Some(selector) = &self.wait_selector {
            Some(Readiness::selector(selector))
        } else {
            self.wait_script.as_ref().map(|expression| Readiness::Script {
                expression: expression.clone(),
            })
        };

        ProbeRequest {
            url: resolve_url(base_url, &self.url),
            ready: None,
            steps,
            settle,
            timeout: self.timeout_ms.map(Duration::from_millis),
            content_selector: self.selector.clone(),
            library_globals: self.global.clone(),
        }
    }
}

pub async fn execute(ctx: &Context, args: ProbeArgs) -> Result<bool> {
    let request = args.request(&ctx.config.base_url);
    let server = ctx.start_server().await?;

    let mut session = ctx.launcher().launch().await?;
    let outcome = match session.new_page().await {
        Ok(mut page) => {
            let probe = PageProbe::new(ProbeConfig::from(&ctx.config.probe));
            let outcome = probe.run(page.as_mut(), &request).await;
            if let Some(path) = &args.screenshot {
                if let Err(e) = page.screenshot(path).await {
                    warn!("Screenshot failed: {}", e);
                }
            }
            if let Err(e) = page.close().await {
                warn!("Error closing page: {}", e);
            }
            Ok(outcome)
        }
        Err(e) => Err(e),
    };
    if let Err(e) = session.close().await {
        warn!("Error closing browser: {}", e);
    }
    stop_server(server).await;

    let outcome = outcome?;
    print_probe(&request.url, &outcome, ctx.format);
    Ok(outcome.reached)
}
