//! Calculation registry.
//!
//! The three calculators sit behind one `calculate(input)` call; the
//! input's variant selects the calculator and `CalculationKind` is the
//! lookup key used by front ends.

use std::fmt;
use std::str::FromStr;

use ca_chem::{BalancedReaction, Normalizer, balance_formulas, split_equation};
use ca_solution::{DilutionResult, DilutionSolver, DilutionState};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalculationKind {
    #[serde(rename = "molecular_weight")]
    MolecularWeight,
    #[serde(rename = "reaction_balancer")]
    ReactionBalance,
    #[serde(rename = "dilution")]
    Dilution,
}

impl CalculationKind {
    pub const ALL: [CalculationKind; 3] = [
        CalculationKind::MolecularWeight,
        CalculationKind::ReactionBalance,
        CalculationKind::Dilution,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::MolecularWeight => "molecular_weight",
            Self::ReactionBalance => "reaction_balancer",
            Self::Dilution => "dilution",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::MolecularWeight => {
                "Calculates molecular weights for one or more formulas or SMILES strings."
            }
            Self::ReactionBalance => {
                "Balances a chemical reaction given reactants and products."
            }
            Self::Dilution => {
                "Performs dilution calculations (C1V1 = C2V2): given three values, computes the fourth."
            }
        }
    }
}

impl fmt::Display for CalculationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CalculationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s.trim())
            .ok_or_else(|| AppError::UnknownCalculation(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculationInput {
    MolecularWeight {
        species: String,
    },
    /// `products` may be empty when `reactants` holds the whole equation.
    ReactionBalance {
        reactants: String,
        #[serde(default)]
        products: String,
        #[serde(default)]
        reversible: bool,
    },
    Dilution {
        state: DilutionState,
        #[serde(default)]
        molecular_weight: Option<f64>,
        #[serde(default)]
        solute: Option<String>,
    },
}

impl CalculationInput {
    pub fn kind(&self) -> CalculationKind {
        match self {
            Self::MolecularWeight { .. } => CalculationKind::MolecularWeight,
            Self::ReactionBalance { .. } => CalculationKind::ReactionBalance,
            Self::Dilution { .. } => CalculationKind::Dilution,
        }
    }
}

/// Molar mass of one resolved species [g/mol].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesWeight {
    pub formula: String,
    pub molar_mass: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculationOutput {
    MolecularWeight {
        weights: Vec<SpeciesWeight>,
    },
    ReactionBalance {
        reaction: BalancedReaction,
        latex: String,
    },
    Dilution {
        result: DilutionResult,
        /// Resolved solute formula, when one was given and resolved.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        solute: Option<String>,
    },
}

impl CalculationOutput {
    /// Species this calculation touched, for the history log.
    pub fn species(&self) -> Vec<String> {
        match self {
            Self::MolecularWeight { weights } => {
                weights.iter().map(|w| w.formula.clone()).collect()
            }
            Self::ReactionBalance { reaction, .. } => reaction
                .reactants
                .iter()
                .chain(&reaction.products)
                .map(|t| t.species.clone())
                .collect(),
            Self::Dilution { solute, .. } => solute.iter().cloned().collect(),
        }
    }
}

/// Dispatches inputs to the calculators. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Calculation {
    normalizer: Normalizer,
    solver: DilutionSolver,
}

impl Calculation {
    pub fn new(normalizer: Normalizer, solver: DilutionSolver) -> Self {
        Self { normalizer, solver }
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Ok(Self::new(config.normalizer()?, config.dilution_solver()?))
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn solver(&self) -> &DilutionSolver {
        &self.solver
    }

    pub fn calculate(&self, input: &CalculationInput) -> AppResult<CalculationOutput> {
        let kind = input.kind();
        let output = match input {
            CalculationInput::MolecularWeight { species } => self.molecular_weight(species),
            CalculationInput::ReactionBalance {
                reactants,
                products,
                reversible,
            } => self.balance(reactants, products, *reversible),
            CalculationInput::Dilution {
                state,
                molecular_weight,
                solute,
            } => self.dilution(state, *molecular_weight, solute.as_deref()),
        }?;
        info!(%kind, "calculation finished");
        Ok(output)
    }

    /// Every species must resolve; the first bad token is reported.
    fn molecular_weight(&self, species: &str) -> AppResult<CalculationOutput> {
        let formulas = self.normalizer.formulas(species)?;
        if formulas.is_empty() {
            return Err(AppError::InvalidInput("no species given".to_string()));
        }

        let weights = formulas
            .iter()
            .map(|formula| SpeciesWeight {
                formula: formula.text().to_string(),
                molar_mass: formula.molar_mass(),
            })
            .collect();
        Ok(CalculationOutput::MolecularWeight { weights })
    }

    fn balance(
        &self,
        reactants: &str,
        products: &str,
        reversible: bool,
    ) -> AppResult<CalculationOutput> {
        let (reactants, products) = if products.trim().is_empty() {
            split_equation(reactants).unwrap_or((reactants, products))
        } else {
            (reactants, products)
        };

        let reactants = self.normalizer.formulas(reactants)?;
        let products = self.normalizer.formulas(products)?;
        let reaction = balance_formulas(&reactants, &products)?;
        let latex = reaction.to_latex(reversible);
        Ok(CalculationOutput::ReactionBalance { reaction, latex })
    }

    fn dilution(
        &self,
        state: &DilutionState,
        molecular_weight: Option<f64>,
        solute: Option<&str>,
    ) -> AppResult<CalculationOutput> {
        let result = self.solver.solve(state, molecular_weight, solute)?;
        let solute = solute
            .and_then(|s| self.normalizer.formulas(s).ok())
            .and_then(|formulas| formulas.into_iter().next())
            .map(|formula| formula.text().to_string());
        Ok(CalculationOutput::Dilution { result, solute })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_chem::ChemError;
    use ca_solution::{Quantity, Slot, Unit};

    #[test]
    fn registry_lookup() {
        for kind in CalculationKind::ALL {
            assert_eq!(kind.name().parse::<CalculationKind>().unwrap(), kind);
            assert!(!kind.description().is_empty());
        }
        assert!(matches!(
            "titration".parse::<CalculationKind>(),
            Err(AppError::UnknownCalculation(_))
        ));
    }

    #[test]
    fn molecular_weight_of_formulas_and_smiles() {
        let calc = Calculation::default();
        let out = calc
            .calculate(&CalculationInput::MolecularWeight {
                species: "H2O CCO [O-]S(=O)(=O)[O-]".into(),
            })
            .unwrap();
        let CalculationOutput::MolecularWeight { weights } = &out else {
            panic!("unexpected output {out:?}");
        };
        assert_eq!(weights.len(), 3);
        assert!((weights[0].molar_mass - 18.015).abs() < 1e-3);
        assert_eq!(weights[1].formula, "C2H6O");
        assert_eq!(weights[2].formula, "O4S2-");
        assert!((weights[2].molar_mass - 96.06).abs() < 0.02);
        assert_eq!(out.species(), ["H2O", "C2H6O", "O4S2-"]);
    }

    #[test]
    fn molecular_weight_rejects_bad_species() {
        let calc = Calculation::default();
        let err = calc
            .calculate(&CalculationInput::MolecularWeight {
                species: "H2O Qq CCO".into(),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Chem(ChemError::InvalidSpecies { ref token }) if token == "Qq"
        ));

        assert!(matches!(
            calc.calculate(&CalculationInput::MolecularWeight {
                species: "  ".into()
            }),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn balance_smiles_ions() {
        let out = Calculation::default()
            .calculate(&CalculationInput::ReactionBalance {
                reactants: "[Ba+2] [O-]S(=O)(=O)[O-]".into(),
                products: "BaSO4".into(),
                reversible: false,
            })
            .unwrap();
        let CalculationOutput::ReactionBalance { reaction, .. } = &out else {
            panic!("unexpected output {out:?}");
        };
        assert_eq!(reaction.to_string(), "Ba2+ + O4S2- = BaSO4");
    }

    #[test]
    fn balance_from_whole_equation() {
        let out = Calculation::default()
            .calculate(&CalculationInput::ReactionBalance {
                reactants: "H2 + O2 = H2O".into(),
                products: String::new(),
                reversible: false,
            })
            .unwrap();
        let CalculationOutput::ReactionBalance { reaction, latex } = &out else {
            panic!("unexpected output {out:?}");
        };
        assert_eq!(reaction.coefficient("H2"), Some(2));
        assert_eq!(latex, "$$ \\ce{2H2 + O2 \\rightarrow 2H2O} $$");
        assert_eq!(out.species(), ["H2", "O2", "H2O"]);
    }

    #[test]
    fn dilution_reports_solute() {
        let state = DilutionState::default()
            .with(Slot::V1, Quantity::new(1.0, Unit::LITER))
            .with(Slot::C2, Quantity::new(0.5, Unit::MOL_PER_L))
            .with(Slot::V2, Quantity::new(2.0, Unit::LITER));
        let out = Calculation::default()
            .calculate(&CalculationInput::Dilution {
                state,
                molecular_weight: None,
                solute: Some("NaCl".into()),
            })
            .unwrap();
        let CalculationOutput::Dilution { result, solute } = &out else {
            panic!("unexpected output {out:?}");
        };
        assert!(result.mass_g.is_some());
        assert_eq!(solute.as_deref(), Some("NaCl"));
    }

    #[test]
    fn input_kind_matches_variant() {
        let input: CalculationInput = serde_json::from_str(
            r#"{"kind":"reaction_balance","reactants":"N2 H2","products":"NH3"}"#,
        )
        .unwrap();
        assert_eq!(input.kind(), CalculationKind::ReactionBalance);
    }
}
