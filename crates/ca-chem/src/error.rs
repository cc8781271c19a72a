//! Chemistry parsing and balancing errors.

use thiserror::Error;

/// Result type for chemistry operations.
pub type ChemResult<T> = Result<T, ChemError>;

/// Errors raised while reading species or balancing reactions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChemError {
    /// A token could be read neither as a formula nor as SMILES.
    #[error("Invalid formula or SMILES: {token}")]
    InvalidSpecies { token: String },

    /// Formula text that does not parse.
    #[error("Invalid formula '{formula}': {reason}")]
    Formula { formula: String, reason: String },

    /// SMILES text that does not decode.
    #[error("Invalid SMILES at position {position}: {reason}")]
    Smiles { position: usize, reason: String },

    /// Stoichiometric balancing failed.
    #[error("Cannot balance reaction: {0}")]
    Balance(String),

    /// Separator pattern supplied by configuration does not compile.
    #[error("Invalid separator pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl ChemError {
    pub(crate) fn formula(formula: &str, reason: impl Into<String>) -> Self {
        ChemError::Formula {
            formula: formula.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn smiles(position: usize, reason: impl Into<String>) -> Self {
        ChemError::Smiles {
            position,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ChemError::InvalidSpecies {
            token: "Xq9".into(),
        };
        assert_eq!(err.to_string(), "Invalid formula or SMILES: Xq9");

        let err = ChemError::smiles(3, "unclosed ring 1");
        assert!(err.to_string().contains("position 3"));
    }
}
