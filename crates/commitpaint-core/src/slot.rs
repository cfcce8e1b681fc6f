use crate::error::{PaintError, Result};
use crate::io::atomic_write;
use crate::paths;
use crate::pattern::Pattern;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Most save slots kept side by side.
pub const MAX_SLOTS: usize = 5;

/// On-disk form of a saved pattern: 7 day-rows of intensities, one entry
/// per week, starting at `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPattern {
    #[serde(default = "default_version")]
    pub version: u32,
    pub start: NaiveDate,
    pub rows: Vec<Vec<u8>>,
}

fn default_version() -> u32 {
    1
}

impl SavedPattern {
    pub fn from_pattern(pattern: &Pattern) -> Result<Self> {
        let start = pattern
            .start()
            .ok_or_else(|| PaintError::Validation("pattern has no cells".to_string()))?;
        Ok(Self {
            version: default_version(),
            start,
            rows: pattern.rows(),
        })
    }

    pub fn into_pattern(self) -> Result<Pattern> {
        Pattern::from_rows(self.start, &self.rows)
    }
}

pub fn exists(root: &Path, name: &str) -> bool {
    paths::slot_path(root, name).exists()
}

/// Write `pattern` to slot `name`. Overwriting an existing slot is always
/// allowed; a new slot fails once [`MAX_SLOTS`] are in use.
pub fn save(root: &Path, name: &str, pattern: &Pattern) -> Result<()> {
    paths::validate_slot_name(name)?;
    pattern.validate()?;
    if !exists(root, name) && list(root)?.len() >= MAX_SLOTS {
        return Err(PaintError::SlotLimit(MAX_SLOTS));
    }
    let data = serde_yaml::to_string(&SavedPattern::from_pattern(pattern)?)?;
    atomic_write(&paths::slot_path(root, name), data.as_bytes())
}

pub fn load(root: &Path, name: &str) -> Result<Pattern> {
    paths::validate_slot_name(name)?;
    let path = paths::slot_path(root, name);
    if !path.exists() {
        return Err(PaintError::SlotNotFound(name.to_string()));
    }
    let data = std::fs::read_to_string(&path)?;
    let saved: SavedPattern = serde_yaml::from_str(&data)?;
    saved.into_pattern()
}

/// Slot names, sorted.
pub fn list(root: &Path) -> Result<Vec<String>> {
    let dir = paths::saves_dir(root);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(paths::SLOT_EXT) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

pub fn delete(root: &Path, name: &str) -> Result<()> {
    paths::validate_slot_name(name)?;
    let path = paths::slot_path(root, name);
    if !path.exists() {
        return Err(PaintError::SlotNotFound(name.to_string()));
    }
    std::fs::remove_file(path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
