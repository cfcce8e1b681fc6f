use crate::output::print_json;
use anyhow::Context;
use commitpaint_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config_path = paths::config_path(root);
    let wrote_config = if config_path.exists() {
        false
    } else {
        Config::default()
            .save(root)
            .context("failed to write default config")?;
        true
    };
    std::fs::create_dir_all(paths::saves_dir(root)).context("failed to create saves directory")?;
    let ignored = io::ensure_gitignore_entry(root, &format!("{}/", paths::PAINT_DIR))
        .context("failed to update .gitignore")?;
    let is_repo = paths::git_dir(root).is_dir();

    if json {
        return print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "config_written": wrote_config,
            "gitignore_updated": ignored,
            "git_repository": is_repo,
        }));
    }

    if wrote_config {
        println!("Wrote {}", config_path.display());
    } else {
        println!("Config already present: {}", config_path.display());
    }
    if ignored {
        println!("Added {}/ to .gitignore", paths::PAINT_DIR);
    }
    if !is_repo {
        println!("\nNot a git repository yet. Run: git init");
    }
    println!("\nNext: commitpaint pattern new <name>");
    Ok(())
}
