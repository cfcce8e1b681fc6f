use crate::cmd::{load_config, Overrides};
use crate::output::print_json;
use anyhow::Context;
use commitpaint_core::{
    git::GitRepo,
    run::{ScheduleResult, Scheduler},
    slot,
    types::RunPhase,
};
use std::path::Path;

// ---------------------------------------------------------------------------
// GenerateExit: typed non-zero outcome of an aborted run
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct GenerateExit {
    pub succeeded: usize,
    pub planned: usize,
}

impl std::fmt::Display for GenerateExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "run aborted after {} of {} commits",
            self.succeeded, self.planned
        )
    }
}

impl std::error::Error for GenerateExit {}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    slot_name: &str,
    overrides: Overrides,
    push: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(root, overrides)?;
    let pattern =
        slot::load(root, slot_name).with_context(|| format!("cannot load slot '{slot_name}'"))?;
    let mut repo = GitRepo::open(root, &config).context("cannot open repository")?;

    let mut scheduler = Scheduler::new(&config);
    let result = scheduler
        .run(&pattern, &mut repo)
        .context("generation failed before any commit was made")?;

    let remote = match (&config.push, push) {
        (Some(p), _) => Some(p.remote.clone()),
        (None, true) => Some("origin".to_string()),
        (None, false) => None,
    };
    let pushed = match remote {
        Some(remote) if result.is_clean() => {
            repo.push(&remote, &result.branch)
                .with_context(|| format!("commits were made but pushing to '{remote}' failed (set it with: commitpaint config remote <URL>)"))?;
            Some(remote)
        }
        _ => None,
    };

    if json {
        print_json(&serde_json::json!({
            "slot": slot_name,
            "result": result,
            "pushed_to": pushed,
        }))?;
    } else {
        print_result(&result);
        if let Some(remote) = &pushed {
            println!("Pushed '{}' to {remote}", result.branch);
        }
    }

    if result.phase == RunPhase::Aborted {
        return Err(GenerateExit {
            succeeded: result.succeeded,
            planned: result.planned,
        }
        .into());
    }
    Ok(())
}

fn print_result(result: &ScheduleResult) {
    println!("Branch:     {}", result.branch);
    println!("Planned:    {}", result.planned);
    println!("Attempted:  {}", result.attempted);
    println!("Succeeded:  {}", result.succeeded);
    println!("Failed:     {}", result.failed);
    println!("Outcome:    {}", result.phase);
    if let Some(failure) = &result.first_failure {
        println!(
            "\nFirst failure at {}:\n  {}",
            failure.timestamp.to_rfc3339(),
            failure.reason
        );
    }
}
