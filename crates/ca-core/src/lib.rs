//! ca-core: shared foundation for the ChemicAlly calculators.
//!
//! Contains:
//! - units (uom SI types + constructors for volumes, concentrations, masses)
//! - numeric (Real + tolerances + float checks)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod units;

pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use units::*;
