use crate::error::{PaintError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const PAINT_DIR: &str = ".commitpaint";
pub const SAVES_DIR: &str = ".commitpaint/saves";
pub const CONFIG_FILE: &str = ".commitpaint/config.yaml";

pub const GIT_DIR: &str = ".git";
pub const LOCK_FILE: &str = "commitpaint.lock";

pub const SLOT_EXT: &str = "yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn paint_dir(root: &Path) -> PathBuf {
    root.join(PAINT_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn saves_dir(root: &Path) -> PathBuf {
    root.join(SAVES_DIR)
}

pub fn slot_path(root: &Path, name: &str) -> PathBuf {
    saves_dir(root).join(format!("{name}.{SLOT_EXT}"))
}

pub fn git_dir(root: &Path) -> PathBuf {
    root.join(GIT_DIR)
}

pub fn lock_path(root: &Path) -> PathBuf {
    git_dir(root).join(LOCK_FILE)
}

// ---------------------------------------------------------------------------
// Slot name validation
// ---------------------------------------------------------------------------

static SLOT_RE: OnceLock<Regex> = OnceLock::new();

fn slot_re() -> &'static Regex {
    SLOT_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_slot_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !slot_re().is_match(name) {
        return Err(PaintError::InvalidSlotName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
