use crate::output::{print_json, print_table};
use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::Subcommand;
use commitpaint_core::{
    pattern::{Pattern, DAYS_PER_WEEK, WEEKS},
    slot,
    types::Intensity,
};
use std::path::Path;

const DAY_LABELS: [&str; DAYS_PER_WEEK] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Subcommand)]
pub enum PatternSubcommand {
    /// Create a blank slot whose last column is the current week
    New {
        name: String,
        /// Last day the graph must include (default: today)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Number of week columns
        #[arg(long, default_value_t = WEEKS)]
        weeks: usize,
        /// Replace an existing slot of the same name
        #[arg(long)]
        force: bool,
    },
    /// Render a slot as a grid
    Show { name: String },
    /// List save slots
    List,
    /// Set one cell to an intensity, addressed by date or by grid position
    Paint {
        name: String,
        /// Calendar day of the cell (YYYY-MM-DD)
        #[arg(long, conflicts_with_all = ["week", "day"])]
        date: Option<NaiveDate>,
        /// Week column, 0-based from the left
        #[arg(long, requires = "day")]
        week: Option<usize>,
        /// Day row, 0 = Sunday
        #[arg(long, requires = "week")]
        day: Option<usize>,
        /// Intensity 0-4
        #[arg(long)]
        level: u8,
    },
    /// Advance a cell to the next intensity (4 wraps to 0)
    Cycle { name: String, date: NaiveDate },
    /// Erase one cell, or every cell with --all
    Clear {
        name: String,
        date: Option<NaiveDate>,
        #[arg(long, conflicts_with = "date")]
        all: bool,
    },
    /// Fill every cell with a weighted random intensity
    Randomize {
        name: String,
        /// Seed (default: derived from the clock, printed for reuse)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Delete a slot
    Delete { name: String },
}

pub fn run(root: &Path, subcmd: PatternSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        PatternSubcommand::New {
            name,
            end,
            weeks,
            force,
        } => new(root, &name, end, weeks, force, json),
        PatternSubcommand::Show { name } => show(root, &name, json),
        PatternSubcommand::List => list(root, json),
        PatternSubcommand::Paint {
            name,
            date,
            week,
            day,
            level,
        } => paint(root, &name, date, week.zip(day), level, json),
        PatternSubcommand::Cycle { name, date } => cycle(root, &name, date, json),
        PatternSubcommand::Clear { name, date, all } => clear(root, &name, date, all, json),
        PatternSubcommand::Randomize { name, seed } => randomize(root, &name, seed, json),
        PatternSubcommand::Delete { name } => delete(root, &name, json),
    }
}

fn load(root: &Path, name: &str) -> anyhow::Result<Pattern> {
    slot::load(root, name).with_context(|| format!("cannot load slot '{name}'"))
}

fn store(root: &Path, name: &str, pattern: &Pattern) -> anyhow::Result<()> {
    slot::save(root, name, pattern).with_context(|| format!("cannot save slot '{name}'"))
}

fn new(
    root: &Path,
    name: &str,
    end: Option<NaiveDate>,
    weeks: usize,
    force: bool,
    json: bool,
) -> anyhow::Result<()> {
    if weeks == 0 {
        bail!("--weeks must be at least 1");
    }
    if slot::exists(root, name) && !force {
        bail!("slot '{name}' already exists (use --force to replace it)");
    }
    let end = end.unwrap_or_else(|| Local::now().date_naive());
    let pattern = Pattern::ending_at(end, weeks);
    store(root, name, &pattern)?;

    if json {
        print_json(&serde_json::json!({
            "name": name,
            "start": pattern.start(),
            "end": pattern.end(),
            "weeks": pattern.weeks(),
        }))?;
    } else if let (Some(start), Some(last)) = (pattern.start(), pattern.end()) {
        println!("Created slot '{name}': {start} to {last} ({} weeks)", pattern.weeks());
    }
    Ok(())
}

fn show(root: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    let pattern = load(root, name)?;
    if json {
        return print_json(&serde_json::json!({
            "name": name,
            "start": pattern.start(),
            "end": pattern.end(),
            "weeks": pattern.weeks(),
            "active_days": pattern.active_days(),
            "rows": pattern.rows(),
        }));
    }
    if let (Some(start), Some(end)) = (pattern.start(), pattern.end()) {
        println!("Slot: {name} ({start} to {end})");
    }
    print!("{}", render_grid(&pattern));
    println!("Active days: {}", pattern.active_days());
    Ok(())
}

/// One line per weekday, one glyph per week.
fn render_grid(pattern: &Pattern) -> String {
    let mut out = String::new();
    for (day, label) in DAY_LABELS.iter().enumerate() {
        out.push_str(label);
        out.push(' ');
        for week in 0..pattern.weeks() {
            let glyph = pattern
                .cell_at(week, day)
                .map(|c| c.intensity.glyph())
                .unwrap_or(' ');
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let names = slot::list(root).context("cannot list save slots")?;
    let mut rows = Vec::with_capacity(names.len());
    for name in &names {
        let pattern = load(root, name)?;
        rows.push((name.clone(), pattern));
    }

    if json {
        let items: Vec<_> = rows
            .iter()
            .map(|(name, p)| {
                serde_json::json!({
                    "name": name,
                    "start": p.start(),
                    "weeks": p.weeks(),
                    "active_days": p.active_days(),
                })
            })
            .collect();
        return print_json(&items);
    }

    if rows.is_empty() {
        println!("No save slots. Run: commitpaint pattern new <name>");
        return Ok(());
    }
    let table = rows
        .iter()
        .map(|(name, p)| {
            vec![
                name.clone(),
                p.start().map(|d| d.to_string()).unwrap_or_default(),
                p.weeks().to_string(),
                p.active_days().to_string(),
            ]
        })
        .collect();
    print_table(&["NAME", "START", "WEEKS", "ACTIVE"], table);
    Ok(())
}

fn paint(
    root: &Path,
    name: &str,
    date: Option<NaiveDate>,
    position: Option<(usize, usize)>,
    level: u8,
    json: bool,
) -> anyhow::Result<()> {
    let intensity = Intensity::new(level)?;
    let mut pattern = load(root, name)?;
    let date = match (date, position) {
        (Some(date), _) => date,
        (None, Some((week, day))) => {
            pattern
                .cell_at(week, day)
                .with_context(|| format!("cell (week {week}, day {day}) is outside the grid"))?
                .date
        }
        (None, None) => bail!("give either --date or --week and --day"),
    };
    pattern.set(date, intensity)?;
    store(root, name, &pattern)?;

    if json {
        print_json(&serde_json::json!({ "name": name, "date": date, "level": level }))?;
    } else {
        println!("Painted {date} at level {intensity}");
    }
    Ok(())
}

fn cycle(root: &Path, name: &str, date: NaiveDate, json: bool) -> anyhow::Result<()> {
    let mut pattern = load(root, name)?;
    let next = pattern.cycle(date)?;
    store(root, name, &pattern)?;

    if json {
        print_json(&serde_json::json!({ "name": name, "date": date, "level": next.level() }))?;
    } else {
        println!("{date} is now level {next}");
    }
    Ok(())
}

fn clear(
    root: &Path,
    name: &str,
    date: Option<NaiveDate>,
    all: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut pattern = load(root, name)?;
    match (date, all) {
        (_, true) => pattern.clear_all(),
        (Some(date), false) => pattern.clear(date)?,
        (None, false) => bail!("give a date to clear, or --all"),
    }
    store(root, name, &pattern)?;

    if json {
        print_json(&serde_json::json!({ "name": name, "active_days": pattern.active_days() }))?;
    } else if all {
        println!("Cleared every cell in '{name}'");
    } else if let Some(date) = date {
        println!("Cleared {date}");
    }
    Ok(())
}

fn randomize(root: &Path, name: &str, seed: Option<u64>, json: bool) -> anyhow::Result<()> {
    let seed = seed.unwrap_or_else(clock_seed);
    let mut pattern = load(root, name)?;
    pattern.randomize(seed)?;
    store(root, name, &pattern)?;

    if json {
        print_json(&serde_json::json!({ "name": name, "seed": seed }))?;
    } else {
        println!("Randomized '{name}' (seed {seed})");
    }
    Ok(())
}

fn delete(root: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    slot::delete(root, name).with_context(|| format!("cannot delete slot '{name}'"))?;
    if json {
        print_json(&serde_json::json!({ "name": name, "deleted": true }))?;
    } else {
        println!("Deleted slot '{name}'");
    }
    Ok(())
}

fn clock_seed() -> u64 {
    let now = chrono::Utc::now();
    now.timestamp_nanos_opt()
        .map(|n| n as u64)
        .unwrap_or_else(|| now.timestamp() as u64)
}
