use thiserror::Error;

use crate::units::UnitError;

pub type SolutionResult<T> = Result<T, SolutionError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolutionError {
    /// Wrong number of missing slots, or a non-positive magnitude.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Values that cannot describe a dilution.
    #[error("Inconsistent dilution: {0}")]
    Inconsistency(String),

    #[error(transparent)]
    Unit(#[from] UnitError),
}
