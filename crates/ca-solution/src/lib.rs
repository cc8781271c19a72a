//! ca-solution: unit-aware dilution calculations (`c1·v1 = c2·v2`).
//!
//! Provides:
//! - Concentration and volume units with their SI conversions
//! - An explicit, immutable unit registry (parsing + compact display)
//! - The dilution solver, including the optional solute mass
//!
//! # Example
//!
//! ```
//! use ca_solution::{DilutionSolver, DilutionState, Quantity, Slot, Unit};
//!
//! let state = DilutionState::default()
//!     .with(Slot::C1, Quantity::new(1.0, Unit::MOL_PER_L))
//!     .with(Slot::C2, Quantity::new(0.5, Unit::MOL_PER_L))
//!     .with(Slot::V2, Quantity::new(2.0, Unit::LITER));
//!
//! let result = DilutionSolver::default().solve(&state, None, None).unwrap();
//! assert_eq!(result.missing, Slot::V1);
//! assert_eq!(result.value.unit, Unit::LITER);
//! ```

pub mod dilution;
pub mod error;
pub mod units;

pub use dilution::{DilutionResult, DilutionSolver, DilutionState, Slot};
pub use error::{SolutionError, SolutionResult};
pub use units::{Quantity, QuantityKind, Scale, Unit, UnitError, UnitRegistry};
