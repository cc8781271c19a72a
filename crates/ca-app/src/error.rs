//! Error types for the ca-app service layer.

use std::path::PathBuf;

use ca_chem::ChemError;
use ca_core::CoreError;
use ca_solution::{SolutionError, UnitError};

/// Application error type wrapping the calculator crates' errors plus the
/// config and history file handling done here.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Chem(#[from] ChemError),

    #[error(transparent)]
    Solution(#[from] SolutionError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Failed to read config file: {path}")]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file: {path}")]
    ConfigFileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Failed to read history file: {path}")]
    HistoryFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write history file: {path}")]
    HistoryFileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown calculation: {0}")]
    UnknownCalculation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for ca-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<UnitError> for AppError {
    fn from(err: UnitError) -> Self {
        AppError::Solution(SolutionError::Unit(err))
    }
}
