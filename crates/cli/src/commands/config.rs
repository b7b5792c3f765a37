//! Configuration file commands

use anyhow::{bail, Result};
use clap::Subcommand;
use pageprobe_common::HarnessConfig;
use std::path::Path;

use super::Context;
use crate::output::{print_structured, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

pub fn execute(ctx: &Context, cmd: ConfigCommands, path: &Path) -> Result<bool> {
    match cmd {
        ConfigCommands::Show => match ctx.format {
            OutputFormat::Json | OutputFormat::Yaml => print_structured(&ctx.config, ctx.format),
            _ => println!("{}", ctx.config.to_toml()?),
        },
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            HarnessConfig::default().save(path)?;
            print_success(&format!("Wrote {}", path.display()));
        }
    }
    Ok(true)
}
