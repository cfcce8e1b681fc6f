use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use commitpaint_core::config::{Config, WarnLevel};
use commitpaint_core::git::GitRepo;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,

    /// Add or change the git remote that --push publishes to
    Remote {
        /// Remote URL, e.g. git@github.com:me/art.git
        url: String,
        /// Remote name (default: push.remote from the config, else origin)
        #[arg(long)]
        name: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    match subcmd {
        ConfigSubcommand::Show => show(&config, json),
        ConfigSubcommand::Validate => validate(&config, json),
        ConfigSubcommand::Remote { url, name } => remote(root, &config, &url, name, json),
    }
}

fn show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(config);
    }
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

fn validate(config: &Config, json: bool) -> anyhow::Result<()> {
    let warnings = config.validate();
    let errors = warnings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .count();

    if json {
        print_json(&serde_json::json!({ "valid": errors == 0, "findings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config OK");
    } else {
        for w in &warnings {
            let tag = match w.level {
                WarnLevel::Error => "error",
                WarnLevel::Warning => "warning",
            };
            println!("{tag}: {}", w.message);
        }
    }

    if errors > 0 {
        anyhow::bail!("config has {errors} error(s)");
    }
    Ok(())
}

fn remote(
    root: &Path,
    config: &Config,
    url: &str,
    name: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let name = name.unwrap_or_else(|| {
        config
            .push
            .as_ref()
            .map(|p| p.remote.clone())
            .unwrap_or_else(|| "origin".to_string())
    });
    let repo = GitRepo::open(root, config).context("cannot open repository")?;
    let changed = repo
        .set_remote(&name, url)
        .with_context(|| format!("cannot set remote '{name}'"))?;

    if json {
        print_json(&serde_json::json!({ "name": name, "url": url, "changed": changed }))?;
    } else if changed {
        println!("Changed remote '{name}' to {url}");
    } else {
        println!("Added remote '{name}': {url}");
    }
    Ok(())
}
