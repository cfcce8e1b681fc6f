use crate::error::{PaintError, Result};
use crate::paths;
use crate::types::{FailurePolicy, Intensity};
use chrono::{FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// WorkingHours
// ---------------------------------------------------------------------------

/// Time-of-day window that generated commits are spread across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    #[serde(default = "default_start")]
    pub start: NaiveTime,
    #[serde(default = "default_end")]
    pub end: NaiveTime,
}

fn default_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_end() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
        }
    }
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Length of the window in whole seconds; zero or negative when inverted.
    pub fn seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }

    /// Largest per-day commit count that still leaves every commit a distinct
    /// second strictly inside the window.
    pub fn max_commits(&self) -> u32 {
        u32::try_from(self.seconds().max(0) / 2).unwrap_or(u32::MAX)
    }
}

// ---------------------------------------------------------------------------
// CommitCountMap
// ---------------------------------------------------------------------------

/// Pure mapping from cell intensity to the number of commits made that day.
///
/// Levels missing from the map produce no commits. Intensity 0 never commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitCountMap(BTreeMap<u8, u32>);

impl Default for CommitCountMap {
    /// Midpoints of the contribution-graph shading buckets
    /// (1-3, 4-9, 10-19, 20+).
    fn default() -> Self {
        Self(BTreeMap::from([(1, 2), (2, 6), (3, 15), (4, 25)]))
    }
}

impl CommitCountMap {
    pub fn new(map: BTreeMap<u8, u32>) -> Self {
        Self(map)
    }

    /// One commit per intensity level.
    pub fn identity() -> Self {
        Self((1..Intensity::LEVELS).map(|l| (l, u32::from(l))).collect())
    }

    pub fn commits_for(&self, intensity: Intensity) -> u32 {
        if intensity.is_none() {
            return 0;
        }
        self.0.get(&intensity.level()).copied().unwrap_or(0)
    }

    pub fn entries(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn max_count(&self) -> u32 {
        self.0.values().copied().max().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Jitter
// ---------------------------------------------------------------------------

/// How a commit is placed inside its slot of the working-hours window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Jitter {
    /// Middle of the slot.
    #[default]
    Centered,
    /// Pseudo-random offset, reproducible for the same seed and day.
    Seeded { seed: u64 },
}

// ---------------------------------------------------------------------------
// Author / Push
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default = "default_remote")]
    pub remote: String,
}

fn default_remote() -> String {
    "origin".to_string()
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub working_hours: WorkingHours,
    #[serde(default)]
    pub intensity_commits: CommitCountMap,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    #[serde(default)]
    pub jitter: Jitter,
    /// Fixed `+HH:MM` offset for commit dates; the machine's local zone when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset: Option<String>,
    #[serde(default = "default_commit_file")]
    pub commit_file: String,
    #[serde(default = "default_message_template")]
    pub message_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<PushConfig>,
}

fn default_version() -> u32 {
    1
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_commit_file() -> String {
    "commit.txt".to_string()
}

fn default_message_template() -> String {
    "Commit #{n} on {date}".to_string()
}

/// Placeholders understood by `message_template`.
pub const TEMPLATE_PLACEHOLDERS: &[&str] = &["n", "date", "timestamp", "intensity"];

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            working_hours: WorkingHours::default(),
            intensity_commits: CommitCountMap::default(),
            branch: default_branch(),
            on_failure: FailurePolicy::default(),
            jitter: Jitter::default(),
            utc_offset: None,
            commit_file: default_commit_file(),
            message_template: default_message_template(),
            author: None,
            push: None,
        }
    }
}

impl Config {
    /// Load `.commitpaint/config.yaml`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Resolve the UTC offset to stamp on a commit made at local time `at`.
    pub fn offset_at(&self, at: NaiveDateTime) -> Result<FixedOffset> {
        if let Some(raw) = &self.utc_offset {
            return parse_offset(raw);
        }
        let offset = match Local.offset_from_local_datetime(&at).earliest() {
            Some(o) => o.fix(),
            // Inside a DST gap: fall back to the offset in force at that instant in UTC.
            None => Local.offset_from_utc_datetime(&at).fix(),
        };
        Ok(offset)
    }

    /// The one offset every commit on `date` is stamped with: the offset in
    /// force when that day's working hours open. A single offset per day
    /// keeps a day's commits strictly ordered across a DST transition.
    pub fn day_offset(&self, date: NaiveDate) -> Result<FixedOffset> {
        self.offset_at(date.and_time(self.working_hours.start))
    }

    /// Render the commit message for the `n`th commit of a day.
    pub fn render_message(&self, n: u32, timestamp: &str, date: &str, intensity: Intensity) -> String {
        self.message_template
            .replace("{n}", &n.to_string())
            .replace("{timestamp}", timestamp)
            .replace("{date}", date)
            .replace("{intensity}", &intensity.to_string())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let error = |message: String| ConfigWarning {
            level: WarnLevel::Error,
            message,
        };

        // 1. Working hours must form a forward window within one day
        if self.working_hours.seconds() <= 0 {
            warnings.push(error(format!(
                "working_hours.end ({}) must be after working_hours.start ({})",
                self.working_hours.end, self.working_hours.start
            )));
        }

        // 2. Intensity map: valid keys, zero stays zero, counts never decrease
        let mut previous = 0u32;
        for (level, count) in self.intensity_commits.entries() {
            if level >= Intensity::LEVELS {
                warnings.push(error(format!(
                    "intensity_commits has level {level}; levels run 0-4"
                )));
                continue;
            }
            if level == 0 && count != 0 {
                warnings.push(error(format!(
                    "intensity 0 must map to 0 commits, not {count}"
                )));
            }
            if count < previous {
                warnings.push(error(format!(
                    "intensity_commits must not decrease: level {level} maps to {count}, below {previous}"
                )));
            }
            previous = previous.max(count);
        }

        // 3. Every commit of the busiest day needs its own second in the window
        let max = self.intensity_commits.max_count();
        if self.working_hours.seconds() > 0 && max > self.working_hours.max_commits() {
            warnings.push(error(format!(
                "{max} commits per day do not fit between {} and {}",
                self.working_hours.start, self.working_hours.end
            )));
        }

        // 4. Branch
        if self.branch.trim().is_empty() {
            warnings.push(error("branch must not be empty".to_string()));
        }

        // 5. Offset
        if let Some(raw) = &self.utc_offset {
            if parse_offset(raw).is_err() {
                warnings.push(error(format!(
                    "utc_offset '{raw}' is not of the form +HH:MM"
                )));
            }
        }

        // 6. Commit file must be a plain relative path
        if self.commit_file.trim().is_empty()
            || Path::new(&self.commit_file).is_absolute()
            || self.commit_file.contains("..")
        {
            warnings.push(error(format!(
                "commit_file '{}' must be a relative path inside the repository",
                self.commit_file
            )));
        }

        // 7. Template placeholders
        for cap in placeholder_re().captures_iter(&self.message_template) {
            let name = &cap[1];
            if !TEMPLATE_PLACEHOLDERS.contains(&name) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("unknown placeholder '{{{name}}}' in message_template"),
                });
            }
        }

        warnings
    }

    /// Fail on the first error-level finding from [`Config::validate`].
    pub fn ensure_valid(&self) -> Result<()> {
        match self
            .validate()
            .into_iter()
            .find(|w| w.level == WarnLevel::Error)
        {
            Some(w) => Err(PaintError::InvalidConfig(w.message)),
            None => Ok(()),
        }
    }
}

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").unwrap())
}

static OFFSET_RE: OnceLock<Regex> = OnceLock::new();

fn offset_re() -> &'static Regex {
    OFFSET_RE.get_or_init(|| Regex::new(r"^([+-])(\d{2}):?(\d{2})$").unwrap())
}

/// Parse `+HH:MM`, `-HHMM` or `Z`.
pub fn parse_offset(raw: &str) -> Result<FixedOffset> {
    let invalid = || PaintError::InvalidConfig(format!("invalid utc offset '{raw}'"));
    if raw == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }
    let caps = offset_re().captures(raw).ok_or_else(invalid)?;
    let hours: i32 = caps[2].parse().map_err(|_| invalid())?;
    let minutes: i32 = caps[3].parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }
    let secs = hours * 3600 + minutes * 60;
    let secs = if &caps[1] == "-" { -secs } else { secs };
    FixedOffset::east_opt(secs).ok_or_else(invalid)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn errors(cfg: &Config) -> Vec<String> {
        cfg.validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
        assert_eq!(cfg.working_hours.seconds(), 8 * 3600);
        assert_eq!(cfg.branch, "main");
        assert_eq!(cfg.on_failure, FailurePolicy::Abort);
    }

    #[test]
    fn default_commit_counts() {
        let map = CommitCountMap::default();
        let counts: Vec<u32> = (0..5)
            .map(|l| map.commits_for(Intensity::new(l).unwrap()))
            .collect();
        assert_eq!(counts, vec![0, 2, 6, 15, 25]);
    }

    #[test]
    fn identity_and_sparse_maps() {
        let id = CommitCountMap::identity();
        assert_eq!(id.commits_for(Intensity::new(3).unwrap()), 3);

        let sparse = CommitCountMap::new(BTreeMap::from([(2, 2)]));
        assert_eq!(sparse.commits_for(Intensity::new(2).unwrap()), 2);
        assert_eq!(sparse.commits_for(Intensity::new(4).unwrap()), 0);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.branch = "art".to_string();
        cfg.jitter = Jitter::Seeded { seed: 7 };
        cfg.on_failure = FailurePolicy::Continue;
        cfg.save(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), cfg);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "branch: paint\nworking_hours:\n  start: '10:30:00'\nintensity_commits:\n  1: 1\n  2: 2\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.branch, "paint");
        assert_eq!(cfg.working_hours.start, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
        assert_eq!(cfg.working_hours.end, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        assert_eq!(cfg.intensity_commits.max_count(), 2);
        assert_eq!(cfg.commit_file, "commit.txt");
    }

    #[test]
    fn seeded_jitter_yaml_shape() {
        let cfg: Config =
            serde_yaml::from_str("jitter:\n  type: seeded\n  seed: 99\n").unwrap();
        assert_eq!(cfg.jitter, Jitter::Seeded { seed: 99 });
        let cfg: Config = serde_yaml::from_str("jitter:\n  type: centered\n").unwrap();
        assert_eq!(cfg.jitter, Jitter::Centered);
    }

    #[test]
    fn inverted_hours_rejected() {
        let mut cfg = Config::default();
        cfg.working_hours = WorkingHours::new(
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        );
        assert!(errors(&cfg)[0].contains("must be after"));
        assert!(matches!(cfg.ensure_valid(), Err(PaintError::InvalidConfig(_))));
    }

    #[test]
    fn decreasing_map_rejected() {
        let mut cfg = Config::default();
        cfg.intensity_commits = CommitCountMap::new(BTreeMap::from([(1, 5), (2, 3)]));
        assert!(errors(&cfg).iter().any(|m| m.contains("must not decrease")));
    }

    #[test]
    fn bad_level_and_nonzero_zero_rejected() {
        let mut cfg = Config::default();
        cfg.intensity_commits = CommitCountMap::new(BTreeMap::from([(0, 1), (9, 9)]));
        let errs = errors(&cfg);
        assert!(errs.iter().any(|m| m.contains("intensity 0")));
        assert!(errs.iter().any(|m| m.contains("level 9")));
    }

    #[test]
    fn overcrowded_window_rejected() {
        let mut cfg = Config::default();
        cfg.working_hours = WorkingHours::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 10).unwrap(),
        );
        assert_eq!(cfg.working_hours.max_commits(), 5);
        assert!(errors(&cfg).iter().any(|m| m.contains("do not fit")));
    }

    #[test]
    fn unknown_placeholder_is_a_warning() {
        let mut cfg = Config::default();
        cfg.message_template = "paint {n} {colour}".to_string();
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
        cfg.ensure_valid().unwrap();
    }

    #[test]
    fn commit_file_must_stay_inside_repo() {
        let mut cfg = Config::default();
        cfg.commit_file = "../escape.txt".to_string();
        assert!(!errors(&cfg).is_empty());
    }

    #[test]
    fn message_rendering() {
        let cfg = Config::default();
        let msg = cfg.render_message(3, "2024-01-02T10:00:00+00:00", "2024-01-02", Intensity::MAX);
        assert_eq!(msg, "Commit #3 on 2024-01-02");
    }

    #[test]
    fn offsets_parse() {
        assert_eq!(parse_offset("+02:00").unwrap().local_minus_utc(), 7200);
        assert_eq!(parse_offset("-0530").unwrap().local_minus_utc(), -19800);
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("two").is_err());
        assert!(parse_offset("+01:75").is_err());
    }

    #[test]
    fn fixed_offset_overrides_local() {
        let mut cfg = Config::default();
        cfg.utc_offset = Some("+09:00".to_string());
        let at = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(cfg.offset_at(at).unwrap().local_minus_utc(), 9 * 3600);
    }
}
