pub mod config;
pub mod generate;
pub mod init;
pub mod pattern;
pub mod plan;

use anyhow::Context;
use commitpaint_core::config::{Config, Jitter};
use commitpaint_core::types::FailurePolicy;
use std::path::Path;

/// Per-invocation settings that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub branch: Option<String>,
    pub on_failure: Option<String>,
    pub seed: Option<u64>,
}

impl Overrides {
    pub fn seed(seed: Option<u64>) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}

/// Load `.commitpaint/config.yaml` and apply command-line overrides.
pub fn load_config(root: &Path, overrides: Overrides) -> anyhow::Result<Config> {
    let mut config = Config::load(root).context("failed to load config")?;
    if let Some(branch) = overrides.branch {
        config.branch = branch;
    }
    if let Some(policy) = overrides.on_failure {
        config.on_failure = policy
            .parse::<FailurePolicy>()
            .context("invalid --on-failure")?;
    }
    if let Some(seed) = overrides.seed {
        config.jitter = Jitter::Seeded { seed };
    }
    Ok(config)
}
