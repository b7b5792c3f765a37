//! CLI Commands

pub mod config;
pub mod diagnose;
pub mod probe;
pub mod reach;
pub mod scenarios;

use anyhow::{bail, Result};
use pageprobe_common::HarnessConfig;
use pageprobe_e2e::{
    BrowserLauncher, ChromeLauncher, RunnerConfig, ScenarioRunner, ScenarioSpec, ServerConfig,
    ServerHandle,
};
use tracing::debug;

use crate::output::{print_info, print_suite, print_warning, OutputFormat};

/// Settings shared by every command
pub struct Context {
    pub config: HarnessConfig,
    pub format: OutputFormat,
}

impl Context {
    pub fn launcher(&self) -> Box<dyn BrowserLauncher> {
        Box::new(ChromeLauncher::new(self.config.browser.clone()))
    }

    /// Spawn the configured static-site server, if there is one
    pub async fn start_server(&self) -> Result<Option<ServerHandle>> {
        match &self.config.server {
            Some(settings) => {
                print_info(&format!("Starting server: {}", settings.command.join(" ")));
                let config = ServerConfig::from_settings(settings, &self.config.base_url);
                Ok(Some(ServerHandle::spawn(config).await?))
            }
            None => Ok(None),
        }
    }

    /// Run scenarios with the configured browser; true when the suite passed.
    /// Scenarios the harness could not run make the whole command an error.
    pub async fn run_scenarios(&self, specs: &[ScenarioSpec]) -> Result<bool> {
        let server = self.start_server().await?;

        let runner = ScenarioRunner::new(self.launcher(), RunnerConfig::from(&self.config));
        let suite = runner.run(specs).await;
        stop_server(server).await;

        print_suite(&suite, self.format);
        if self.config.output.write_results {
            match runner.write_results(&suite) {
                Ok(path) => debug!("Wrote {}", path.display()),
                Err(e) => print_warning(&format!("Could not write results: {}", e)),
            }
        }

        let harness_failures = suite.harness_failures();
        if harness_failures > 0 {
            bail!("{} scenario(s) could not be run by the harness", harness_failures);
        }
        Ok(suite.success())
    }
}

/// Stop a server started by `Context::start_server`
pub async fn stop_server(server: Option<ServerHandle>) {
    if let Some(mut server) = server {
        server.stop().await;
    }
}
