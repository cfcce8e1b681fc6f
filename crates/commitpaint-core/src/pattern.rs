use crate::error::{PaintError, Result};
use crate::types::Intensity;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Number of weeks shown on a contribution graph.
pub const WEEKS: usize = 52;
pub const DAYS_PER_WEEK: usize = 7;
/// Contribution-graph columns start on Sunday.
pub const WEEK_START: Weekday = Weekday::Sun;

/// Relative weights of intensities 1..=4 when randomizing.
const RANDOM_WEIGHTS: [u32; 4] = [50, 30, 15, 5];

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub date: NaiveDate,
    pub intensity: Intensity,
}

impl Cell {
    pub fn new(date: NaiveDate, intensity: Intensity) -> Self {
        Self { date, intensity }
    }
}

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

/// A painted contribution graph: one cell per day, in ascending date order.
///
/// Cells are laid out column-major, one column per week, so the cell for
/// `(week, day)` sits at index `week * 7 + day` once the pattern validates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    cells: Vec<Cell>,
}

impl Pattern {
    /// An all-zero pattern of `weeks` full weeks beginning on `start`.
    pub fn blank(start: NaiveDate, weeks: usize) -> Self {
        let cells = start
            .iter_days()
            .take(weeks * DAYS_PER_WEEK)
            .map(|date| Cell::new(date, Intensity::NONE))
            .collect();
        Self { cells }
    }

    /// An all-zero pattern whose last column is the week containing `today`.
    pub fn ending_at(today: NaiveDate, weeks: usize) -> Self {
        Self::blank(window_start(today, weeks), weeks)
    }

    /// Build a pattern from arbitrary cells. Cells are sorted by date but
    /// otherwise taken as given; call [`Pattern::validate`] before use.
    pub fn from_cells(mut cells: Vec<Cell>) -> Self {
        cells.sort_by_key(|c| c.date);
        Self { cells }
    }

    /// Build a pattern from 7 day-rows of raw intensities, one entry per week.
    pub fn from_rows(start: NaiveDate, rows: &[Vec<u8>]) -> Result<Self> {
        if rows.len() != DAYS_PER_WEEK {
            return Err(PaintError::Validation(format!(
                "expected {DAYS_PER_WEEK} day rows, found {}",
                rows.len()
            )));
        }
        let weeks = rows[0].len();
        if let Some((day, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != weeks) {
            return Err(PaintError::Validation(format!(
                "day row {day} has {} weeks, expected {weeks}",
                row.len()
            )));
        }
        let mut pattern = Self::blank(start, weeks);
        for (day, row) in rows.iter().enumerate() {
            for (week, &level) in row.iter().enumerate() {
                pattern.set_at(week, day, Intensity::new(level)?)?;
            }
        }
        Ok(pattern)
    }

    /// The 7 day-rows of raw intensities, the inverse of [`Pattern::from_rows`].
    pub fn rows(&self) -> Vec<Vec<u8>> {
        let mut rows = vec![Vec::with_capacity(self.weeks()); DAYS_PER_WEEK];
        for (i, cell) in self.cells.iter().enumerate() {
            rows[i % DAYS_PER_WEEK].push(cell.intensity.level());
        }
        rows
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn weeks(&self) -> usize {
        self.cells.len() / DAYS_PER_WEEK
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.cells.first().map(|c| c.date)
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.cells.last().map(|c| c.date)
    }

    pub fn get_cell(&self, date: NaiveDate) -> Result<Cell> {
        self.index_of(date).map(|i| self.cells[i])
    }

    pub fn cell_at(&self, week: usize, day: usize) -> Option<Cell> {
        if day >= DAYS_PER_WEEK {
            return None;
        }
        self.cells.get(week * DAYS_PER_WEEK + day).copied()
    }

    /// Cells whose intensity is strictly greater than `threshold`, ascending
    /// by date. The iterator is `Clone`, so a caller can walk it more than once.
    pub fn cells_with_intensity_above(
        &self,
        threshold: Intensity,
    ) -> impl Iterator<Item = Cell> + Clone + '_ {
        self.cells
            .iter()
            .copied()
            .filter(move |c| c.intensity > threshold)
    }

    /// Number of days that will receive at least one commit.
    pub fn active_days(&self) -> usize {
        self.cells_with_intensity_above(Intensity::NONE).count()
    }

    /// Check contiguous coverage and contribution-graph alignment.
    pub fn validate(&self) -> Result<()> {
        let Some(first) = self.cells.first() else {
            return Err(PaintError::Validation("pattern has no cells".to_string()));
        };
        if first.date.weekday() != WEEK_START {
            return Err(PaintError::Validation(format!(
                "pattern starts on {} ({}), expected {WEEK_START:?}",
                first.date,
                first.date.weekday()
            )));
        }
        for pair in self.cells.windows(2) {
            let (prev, next) = (pair[0].date, pair[1].date);
            if next == prev {
                return Err(PaintError::Validation(format!("duplicate date {next}")));
            }
            if prev.succ_opt() != Some(next) {
                return Err(PaintError::Validation(format!(
                    "gap in coverage between {prev} and {next}"
                )));
            }
        }
        if self.cells.len() % DAYS_PER_WEEK != 0 {
            return Err(PaintError::Validation(format!(
                "{} cells do not fill whole weeks",
                self.cells.len()
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Painting
    // -----------------------------------------------------------------------

    pub fn set(&mut self, date: NaiveDate, intensity: Intensity) -> Result<()> {
        let i = self.index_of(date)?;
        self.cells[i].intensity = intensity;
        Ok(())
    }

    pub fn set_at(&mut self, week: usize, day: usize, intensity: Intensity) -> Result<()> {
        let date = self
            .cell_at(week, day)
            .ok_or_else(|| {
                PaintError::Validation(format!("cell (week {week}, day {day}) is outside the grid"))
            })?
            .date;
        self.set(date, intensity)
    }

    /// Advance a cell to the next intensity, wrapping 4 back to 0.
    pub fn cycle(&mut self, date: NaiveDate) -> Result<Intensity> {
        let i = self.index_of(date)?;
        let next = self.cells[i].intensity.cycled();
        self.cells[i].intensity = next;
        Ok(next)
    }

    pub fn clear(&mut self, date: NaiveDate) -> Result<()> {
        self.set(date, Intensity::NONE)
    }

    pub fn clear_all(&mut self) {
        for cell in &mut self.cells {
            cell.intensity = Intensity::NONE;
        }
    }

    /// Fill every cell with a weighted random intensity between 1 and 4.
    /// The same seed always paints the same picture.
    pub fn randomize(&mut self, seed: u64) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(seed);
        let dist = WeightedIndex::new(RANDOM_WEIGHTS)
            .map_err(|e| PaintError::Validation(format!("random weights: {e}")))?;
        for cell in &mut self.cells {
            let level = dist.sample(&mut rng) as u8 + 1;
            cell.intensity = Intensity::new(level)?;
        }
        Ok(())
    }

    fn index_of(&self, date: NaiveDate) -> Result<usize> {
        self.cells
            .binary_search_by_key(&date, |c| c.date)
            .map_err(|_| PaintError::OutOfRange(date))
    }
}

/// First day of a `weeks`-wide window whose last column contains `today`.
pub fn window_start(today: NaiveDate, weeks: usize) -> NaiveDate {
    let back = u64::from(today.weekday().num_days_from_sunday());
    let this_week = today - Days::new(back);
    this_week - Days::new(7 * weeks.saturating_sub(1) as u64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
