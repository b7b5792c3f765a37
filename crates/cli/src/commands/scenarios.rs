//! Scenario commands: built-in catalog runs and YAML specs

use anyhow::Result;
use clap::Args;
use pageprobe_e2e::catalog;
use pageprobe_e2e::{E2eError, ScenarioSpec};
use std::path::{Path, PathBuf};

use super::Context;

#[derive(Args)]
pub struct WalletDataArgs {
    /// Checks that must match for the non-vesting wallet
    #[arg(long, env = "PAGEPROBE_NO_VESTING_MIN", default_value_t = catalog::NO_VESTING_MIN)]
    pub no_vesting_min: usize,

    /// Checks that must match for the vesting wallet
    #[arg(long, env = "PAGEPROBE_VESTING_MIN", default_value_t = catalog::VESTING_MIN)]
    pub vesting_min: usize,
}

#[derive(Args)]
pub struct RunArgs {
    /// Scenario file or directory of `.yaml`/`.yml` files
    #[arg(short, long, env = "PAGEPROBE_SPECS", default_value = "specs")]
    pub specs: PathBuf,

    /// Run only scenarios with this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Run only the scenario with this name
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Four wallet scenarios driven by `WALLET_*` variables
pub async fn wallet(ctx: &Context) -> Result<bool> {
    ctx.run_scenarios(&catalog::wallet_scenarios()).await
}

pub async fn wallet_data(ctx: &Context, args: WalletDataArgs) -> Result<bool> {
    let specs = catalog::wallet_data_scenarios(args.no_vesting_min, args.vesting_min);
    ctx.run_scenarios(&specs).await
}

pub async fn summary(ctx: &Context) -> Result<bool> {
    ctx.run_scenarios(&[catalog::summary_scenario()]).await
}

pub async fn price(ctx: &Context) -> Result<bool> {
    ctx.run_scenarios(&[catalog::price_scenario()]).await
}

pub async fn hello(ctx: &Context) -> Result<bool> {
    ctx.run_scenarios(&[catalog::hello_scenario()]).await
}

pub async fn run(ctx: &Context, args: RunArgs) -> Result<bool> {
    let specs = select(load_specs(&args.specs)?, args.tag.as_deref(), args.name.as_deref())?;
    ctx.run_scenarios(&specs).await
}

fn load_specs(path: &Path) -> Result<Vec<ScenarioSpec>, E2eError> {
    if path.is_file() {
        Ok(vec![ScenarioSpec::from_file(path)?])
    } else {
        ScenarioSpec::load_all(path)
    }
}

fn select(
    specs: Vec<ScenarioSpec>,
    tag: Option<&str>,
    name: Option<&str>,
) -> Result<Vec<ScenarioSpec>, E2eError> {
    let specs = match tag {
        Some(tag) => ScenarioSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect(),
        None => specs,
    };

    match name {
        Some(name) => specs
            .into_iter()
            .find(|s| s.name == name)
            .map(|s| vec![s])
            .ok_or_else(|| E2eError::ScenarioNotFound(name.to_string())),
        None => Ok(specs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<ScenarioSpec> {
        let mut a = ScenarioSpec::new("Hello", "/");
        a.tags = vec!["smoke".to_string()];
        let mut b = ScenarioSpec::new("HASH Price", "/");
        b.tags = vec!["price".to_string(), "smoke".to_string()];
        vec![a, b, ScenarioSpec::new("Other", "/")]
    }

    #[test]
    fn test_select_by_tag_and_name() {
        let smoke = select(specs(), Some("smoke"), None).unwrap();
        assert_eq!(smoke.len(), 2);

        let one = select(specs(), Some("smoke"), Some("HASH Price")).unwrap();
        assert_eq!(one[0].name, "HASH Price");

        assert!(matches!(
            select(specs(), None, Some("Missing")),
            Err(E2eError::ScenarioNotFound(_))
        ));
    }

    #[test]
    fn test_load_specs_from_file_or_dir() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hello.yaml");
        std::fs::write(&file, "name: Hello\nchecks:\n  - text: Hello from ClojureScript\n").unwrap();

        assert_eq!(load_specs(&file).unwrap()[0].name, "Hello");
        assert_eq!(load_specs(dir.path()).unwrap().len(), 1);
    }
}
