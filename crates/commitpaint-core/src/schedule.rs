use crate::config::{Config, Jitter, WorkingHours};
use crate::error::{PaintError, Result};
use crate::pattern::Pattern;
use crate::types::Intensity;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Format git prints for author dates; used for the `{timestamp}` placeholder.
const GIT_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y %z";

// ---------------------------------------------------------------------------
// CommitDirective
// ---------------------------------------------------------------------------

/// One planned, not yet applied, commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDirective {
    #[serde(serialize_with = "serialize_git_date")]
    pub timestamp: DateTime<FixedOffset>,
    pub branch: String,
    pub message: String,
    /// Calendar day of the cell this commit paints.
    pub date: NaiveDate,
    /// 1-based position among the commits of `date`.
    pub sequence: u32,
    pub intensity: Intensity,
}

impl CommitDirective {
    /// ISO 8601 form passed to git as author and committer date.
    pub fn git_date(&self) -> String {
        self.timestamp.to_rfc3339()
    }

    pub fn local_time(&self) -> NaiveDateTime {
        self.timestamp.naive_local()
    }
}

/// Serialize as [`CommitDirective::git_date`] prints it, `+00:00` rather than `Z`.
fn serialize_git_date<S>(timestamp: &DateTime<FixedOffset>, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&timestamp.to_rfc3339())
}

// ---------------------------------------------------------------------------
// PlanSummary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub days: usize,
    pub commits: usize,
    pub first: Option<DateTime<FixedOffset>>,
    pub last: Option<DateTime<FixedOffset>>,
}

pub fn summarize(directives: &[CommitDirective]) -> PlanSummary {
    let mut days: Vec<NaiveDate> = directives.iter().map(|d| d.date).collect();
    days.dedup();
    PlanSummary {
        days: days.len(),
        commits: directives.len(),
        first: directives.first().map(|d| d.timestamp),
        last: directives.last().map(|d| d.timestamp),
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Turn a pattern into commit directives in strictly ascending timestamp order.
///
/// Validates both the pattern and the configuration first; nothing is
/// planned for an invalid input.
pub fn plan(pattern: &Pattern, config: &Config) -> Result<Vec<CommitDirective>> {
    pattern.validate()?;
    config.ensure_valid()?;
    plan_validated(pattern, config)
}

pub(crate) fn plan_validated(pattern: &Pattern, config: &Config) -> Result<Vec<CommitDirective>> {
    let mut directives = Vec::new();
    for cell in pattern.cells_with_intensity_above(Intensity::NONE) {
        let count = config.intensity_commits.commits_for(cell.intensity);
        let times = spread(&config.working_hours, count, config.jitter, cell.date);
        if times.is_empty() {
            continue;
        }
        let offset = config.day_offset(cell.date)?;
        for (i, time) in times.into_iter().enumerate() {
            let local = cell.date.and_time(time);
            let timestamp = attach_offset(offset, local)?;
            let sequence = i as u32 + 1;
            let message = config.render_message(
                sequence,
                &timestamp.format(GIT_DATE_FORMAT).to_string(),
                &cell.date.to_string(),
                cell.intensity,
            );
            directives.push(CommitDirective {
                timestamp,
                branch: config.branch.clone(),
                message,
                date: cell.date,
                sequence,
                intensity: cell.intensity,
            });
        }
    }
    directives.sort_by_key(|d| d.timestamp);
    verify_order(&directives)?;
    tracing::debug!(commits = directives.len(), "planned directives");
    Ok(directives)
}

/// Times of day for `count` commits spread evenly across `hours`.
///
/// The window is split into `count` equal slots of `w` seconds and each
/// commit lands at an offset in `[1, w - 1]` inside its own slot, so every
/// time is strictly inside the window and strictly later than the previous.
pub fn spread(hours: &WorkingHours, count: u32, jitter: Jitter, date: NaiveDate) -> Vec<NaiveTime> {
    if count == 0 {
        return Vec::new();
    }
    let slot = hours.seconds() / i64::from(count);
    if slot < 2 {
        return Vec::new();
    }
    let mut rng = match jitter {
        Jitter::Centered => None,
        Jitter::Seeded { seed } => Some(StdRng::seed_from_u64(day_seed(seed, date))),
    };
    (0..i64::from(count))
        .map(|i| {
            let offset = match rng.as_mut() {
                Some(rng) => rng.gen_range(1..slot),
                None => slot / 2,
            };
            hours.start + Duration::seconds(i * slot + offset)
        })
        .collect()
}

/// Fail if any directive does not come strictly after its predecessor.
pub fn verify_order(directives: &[CommitDirective]) -> Result<()> {
    for pair in directives.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(PaintError::TimestampOrdering {
                earlier: pair[0].git_date(),
                later: pair[1].git_date(),
            });
        }
    }
    Ok(())
}

fn day_seed(seed: u64, date: NaiveDate) -> u64 {
    let ordinal = u64::try_from(date.num_days_from_ce()).unwrap_or_default();
    seed ^ ordinal.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn attach_offset(offset: FixedOffset, local: NaiveDateTime) -> Result<DateTime<FixedOffset>> {
    offset
        .from_local_datetime(&local)
        .single()
        .ok_or_else(|| PaintError::InvalidConfig(format!("cannot place {local} at offset {offset}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
