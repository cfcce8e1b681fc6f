use crate::cmd::{load_config, Overrides};
use crate::output::{print_json, print_table};
use anyhow::Context;
use commitpaint_core::{schedule, slot};
use std::path::Path;

pub fn run(
    root: &Path,
    slot_name: &str,
    seed: Option<u64>,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(root, Overrides::seed(seed))?;
    let pattern =
        slot::load(root, slot_name).with_context(|| format!("cannot load slot '{slot_name}'"))?;
    let directives = schedule::plan(&pattern, &config).context("cannot plan commits")?;
    let summary = schedule::summarize(&directives);
    let shown = if limit == 0 {
        &directives[..]
    } else {
        &directives[..limit.min(directives.len())]
    };

    if json {
        return print_json(&serde_json::json!({
            "slot": slot_name,
            "branch": config.branch,
            "summary": summary,
            "directives": shown,
        }));
    }

    let rows = shown
        .iter()
        .map(|d| {
            vec![
                d.git_date(),
                d.intensity.to_string(),
                d.sequence.to_string(),
                d.message.clone(),
            ]
        })
        .collect();
    print_table(&["TIMESTAMP", "LEVEL", "SEQ", "MESSAGE"], rows);
    if shown.len() < directives.len() {
        println!("... {} more", directives.len() - shown.len());
    }
    println!(
        "\n{} commits over {} days on branch '{}'",
        summary.commits, summary.days, config.branch
    );
    Ok(())
}
