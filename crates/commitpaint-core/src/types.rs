use crate::error::PaintError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Intensity
// ---------------------------------------------------------------------------

/// Desired activity level for one day: 0 (none) through 4 (darkest cell).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Intensity(u8);

impl Intensity {
    pub const NONE: Intensity = Intensity(0);
    pub const MAX: Intensity = Intensity(4);
    pub const LEVELS: u8 = 5;

    pub fn new(level: u8) -> Result<Self, PaintError> {
        if level < Self::LEVELS {
            Ok(Intensity(level))
        } else {
            Err(PaintError::InvalidIntensity(level))
        }
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The next level, wrapping from 4 back to 0.
    pub fn cycled(self) -> Intensity {
        Intensity((self.0 + 1) % Self::LEVELS)
    }

    /// Block glyph used by the terminal preview.
    pub fn glyph(self) -> char {
        match self.0 {
            0 => '·',
            1 => '░',
            2 => '▒',
            3 => '▓',
            _ => '█',
        }
    }
}

impl TryFrom<u8> for Intensity {
    type Error = PaintError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Intensity::new(level)
    }
}

impl From<Intensity> for u8 {
    fn from(i: Intensity) -> u8 {
        i.0
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// FailurePolicy
// ---------------------------------------------------------------------------

/// What a run does when a single commit operation fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failed commit.
    #[default]
    Abort,
    /// Record the failure and keep applying the remaining directives.
    Continue,
}

impl FailurePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            FailurePolicy::Abort => "abort",
            FailurePolicy::Continue => "continue",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = PaintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" => Ok(FailurePolicy::Abort),
            "continue" => Ok(FailurePolicy::Continue),
            _ => Err(PaintError::InvalidConfig(format!(
                "unknown failure policy '{s}': expected abort or continue"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// RunPhase
// ---------------------------------------------------------------------------

/// Lifecycle of one generation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Validating,
    Scheduling,
    Applying,
    Completed,
    Aborted,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Validating => "validating",
            RunPhase::Scheduling => "scheduling",
            RunPhase::Applying => "applying",
            RunPhase::Completed => "completed",
            RunPhase::Aborted => "aborted",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Aborted)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Scheduling)
                | (Validating, Aborted)
                | (Scheduling, Applying)
                | (Scheduling, Aborted)
                | (Applying, Completed)
                | (Applying, Aborted)
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
