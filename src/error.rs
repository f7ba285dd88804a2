//! Error types for the localization core

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the localization core
#[derive(Debug, Error)]
pub enum LocalizationError {
    #[error("cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: usize,
        height: usize,
    },

    #[error("the map has no free cells to place the agent or particles in")]
    NoValidPositions,

    #[error("lookup table not found at {}", path.display())]
    LookupTableMissing { path: PathBuf },

    #[error("lookup table shape {found:?} does not match the grid, expected {expected:?}")]
    LookupTableShapeMismatch {
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },

    #[error("lookup table is corrupt: {0}")]
    LookupTableCorrupt(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid map: {0}")]
    InvalidMap(String),

    #[error("{0} is not active")]
    NotActive(String),

    #[error("operation interrupted")]
    Interrupted,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, LocalizationError>;
