//! Shared application service layer for ChemicAlly.
//!
//! Ties the calculators to configuration and per-session history so a
//! front end only has to build a `CalculationInput`, call `calculate`,
//! and record the returned species.

pub mod calculation;
pub mod config;
pub mod error;
pub mod history;

pub use calculation::{
    Calculation, CalculationInput, CalculationKind, CalculationOutput, SpeciesWeight,
};
pub use config::{AppConfig, UnitConfig, load_config, save_config};
pub use error::{AppError, AppResult};
pub use history::{DEFAULT_CAPACITY, HistoryLog, HistoryStore};
