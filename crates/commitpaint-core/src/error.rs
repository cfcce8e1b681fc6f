use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaintError {
    #[error("invalid pattern: {0}")]
    Validation(String),

    #[error("date {0} is outside the pattern window")]
    OutOfRange(chrono::NaiveDate),

    #[error("invalid intensity {0}: must be between 0 and 4")]
    InvalidIntensity(u8),

    #[error("invalid branch '{branch}': {reason}")]
    InvalidBranch { branch: String, reason: String },

    /// Internal defect: the planner emitted a non-ascending timestamp.
    #[error("timestamp ordering violated: {later} does not follow {earlier}")]
    TimestampOrdering { earlier: String, later: String },

    #[error("commit at {timestamp} failed: {reason}")]
    CommitFailed { timestamp: String, reason: String },

    #[error("git is not installed or not found in PATH")]
    GitNotFound,

    #[error("not a git repository: {0}")]
    NotARepository(String),

    #[error("repository is locked by another run: remove {0} if no run is active")]
    RepositoryLocked(String),

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("save slot not found: {0}")]
    SlotNotFound(String),

    #[error("invalid slot name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlotName(String),

    #[error("maximum of {0} save slots reached: delete or overwrite an existing slot")]
    SlotLimit(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PaintError>;
