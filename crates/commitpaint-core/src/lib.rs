pub mod config;
pub mod error;
pub mod git;
pub mod io;
pub mod paths;
pub mod pattern;
pub mod run;
pub mod schedule;
pub mod slot;
pub mod types;

pub use error::{PaintError, Result};
