//! ca-chem: species parsing, molar masses and reaction balancing.
//!
//! Provides:
//! - Periodic table with standard atomic weights
//! - Formula parser (groups, hydrates, charges) and canonical formulas
//! - SMILES decoder producing molecular formulas
//! - Normalizer turning free-form species text into formula lists
//! - Integer stoichiometric balancer with LaTeX rendering
//!
//! # Example
//!
//! ```
//! use ca_chem::{balance, molar_mass, normalize};
//!
//! let species = normalize("CCO, H2O").unwrap();
//! assert_eq!(species, ["C2H6O", "H2O"]);
//!
//! let mw = molar_mass("H2O").unwrap();
//! assert!((mw - 18.015).abs() < 1e-3);
//!
//! let reaction = balance(&["H2", "O2"], &["H2O"]).unwrap();
//! assert_eq!(reaction.coefficient("H2O"), Some(2));
//! ```

pub mod balance;
pub mod element;
pub mod error;
pub mod formula;
pub mod normalize;
pub mod smiles;

pub use balance::{BalancedReaction, Term, balance, balance_formulas, split_equation};
pub use element::{ELEMENTS, Element, element_by_number, element_by_symbol, is_element_symbol};
pub use error::{ChemError, ChemResult};
pub use formula::{Composition, Formula, canonical_formula, charge_suffix, molar_mass};
pub use normalize::{
    DEFAULT_SEPARATORS, FormulaToken, Normalizer, SpeciesList, TokenKind, normalize,
};
pub use smiles::{Atom, Bond, BondOrder, Molecule, parse_smiles, smiles_to_formula};
