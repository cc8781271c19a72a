//! Dilution solver: three of {c1, v1, c2, v2} in, the fourth out.

use std::fmt;
use std::str::FromStr;

use ca_chem::Normalizer;
use ca_core::numeric::ensure_positive;
use ca_core::units::{
    Amount, Concentration, Volume, g_per_mol, in_grams, in_liters, in_moles, mol_per_l,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SolutionError, SolutionResult};
use crate::units::{Quantity, QuantityKind, UnitRegistry};

/// One of the four dilution variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    C1,
    V1,
    C2,
    V2,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::C1, Slot::V1, Slot::C2, Slot::V2];

    pub fn name(self) -> &'static str {
        match self {
            Slot::C1 => "c1",
            Slot::V1 => "v1",
            Slot::C2 => "c2",
            Slot::V2 => "v2",
        }
    }

    pub fn kind(self) -> QuantityKind {
        match self {
            Slot::C1 | Slot::C2 => QuantityKind::Concentration,
            Slot::V1 | Slot::V2 => QuantityKind::Volume,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Slot {
    type Err = SolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slot::ALL
            .into_iter()
            .find(|slot| slot.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SolutionError::InvalidInput(format!("unknown slot '{s}'")))
    }
}

/// Entered values; `None` marks the slot to solve for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DilutionState {
    pub c1: Option<Quantity>,
    pub v1: Option<Quantity>,
    pub c2: Option<Quantity>,
    pub v2: Option<Quantity>,
}

impl DilutionState {
    pub fn with(mut self, slot: Slot, quantity: Quantity) -> Self {
        *self.slot_mut(slot) = Some(quantity);
        self
    }

    pub fn get(&self, slot: Slot) -> Option<Quantity> {
        match slot {
            Slot::C1 => self.c1,
            Slot::V1 => self.v1,
            Slot::C2 => self.c2,
            Slot::V2 => self.v2,
        }
    }

    pub fn set(&mut self, slot: Slot, quantity: Option<Quantity>) {
        *self.slot_mut(slot) = quantity;
    }

    pub fn missing(&self) -> Vec<Slot> {
        Slot::ALL
            .into_iter()
            .filter(|&slot| self.get(slot).is_none())
            .collect()
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<Quantity> {
        match slot {
            Slot::C1 => &mut self.c1,
            Slot::V1 => &mut self.v1,
            Slot::C2 => &mut self.c2,
            Slot::V2 => &mut self.v2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DilutionResult {
    pub missing: Slot,
    /// In the most compact unit of its kind.
    pub value: Quantity,
    /// Solute mass in c2·v2, when a molar mass was available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass_g: Option<f64>,
}

/// Solves `c1·v1 = c2·v2` with a fixed unit registry.
#[derive(Debug, Clone, Default)]
pub struct DilutionSolver {
    units: UnitRegistry,
    normalizer: Normalizer,
}

impl DilutionSolver {
    pub fn new(units: UnitRegistry) -> Self {
        Self {
            units,
            normalizer: Normalizer::default(),
        }
    }

    /// Resolve solute text (formula or SMILES) with `normalizer`.
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    /// Compute the single missing slot.
    ///
    /// The solute mass is reported only when c2 and v2 were entered; the
    /// molar mass comes from `molecular_weight` [g/mol] or else from the
    /// solute's formula.
    pub fn solve(
        &self,
        state: &DilutionState,
        molecular_weight: Option<f64>,
        solute: Option<&str>,
    ) -> SolutionResult<DilutionResult> {
        let missing = match state.missing().as_slice() {
            [slot] => *slot,
            slots => {
                return Err(SolutionError::InvalidInput(format!(
                    "exactly one of c1, v1, c2, v2 must be missing, got {}",
                    slots.len()
                )));
            }
        };

        let c1 = concentration(state, Slot::C1)?;
        let v1 = volume(state, Slot::V1)?;
        let c2 = concentration(state, Slot::C2)?;
        let v2 = volume(state, Slot::V2)?;

        if let (Some(v1), Some(v2)) = (v1, v2) {
            if v1 >= v2 {
                return Err(SolutionError::Inconsistency(
                    "initial volume v1 must be smaller than final volume v2".into(),
                ));
            }
        } else if let (Some(c1), Some(c2)) = (c1, c2) {
            if c1 < c2 {
                return Err(SolutionError::Inconsistency(
                    "final concentration c2 cannot exceed initial concentration c1".into(),
                ));
            }
        }

        let value = match (missing, c1, v1, c2, v2) {
            // `Concentration` has uom's constituent-concentration kind, which a
            // product/quotient never carries; rebuild it from the amount.
            (Slot::C1, None, Some(v1), Some(c2), Some(v2)) => {
                let amount: Amount = c2 * v2;
                self.units
                    .compact_concentration(mol_per_l(in_moles(amount) / in_liters(v1)))
            }
            (Slot::V1, Some(c1), None, Some(c2), Some(v2)) => {
                self.units.compact_volume(c2 * v2 / c1)
            }
            (Slot::C2, Some(c1), Some(v1), None, Some(v2)) => {
                let amount: Amount = c1 * v1;
                self.units
                    .compact_concentration(mol_per_l(in_moles(amount) / in_liters(v2)))
            }
            (Slot::V2, Some(c1), Some(v1), Some(c2), None) => {
                self.units.compact_volume(c1 * v1 / c2)
            }
            _ => {
                return Err(SolutionError::InvalidInput(format!(
                    "cannot solve for {missing}"
                )));
            }
        };
        debug!(%missing, %value, "solved dilution");

        let mass_g = match (c2, v2) {
            (Some(c2), Some(v2)) => {
                let amount: Amount = c2 * v2;
                self.molar_mass(molecular_weight, solute)?.map(|mw| {
                    debug!(moles = in_moles(amount), mw, "solute mass");
                    in_grams(amount * g_per_mol(mw))
                })
            }
            _ => None,
        };

        Ok(DilutionResult {
            missing,
            value,
            mass_g,
        })
    }

    /// A zero molecular weight counts as not given.
    fn molar_mass(
        &self,
        molecular_weight: Option<f64>,
        solute: Option<&str>,
    ) -> SolutionResult<Option<f64>> {
        if let Some(mw) = molecular_weight.filter(|mw| *mw != 0.0) {
            let mw = ensure_positive(mw, "molecular weight")
                .map_err(|e| SolutionError::InvalidInput(e.to_string()))?;
            return Ok(Some(mw));
        }

        let Some(solute) = solute.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let resolved = self
            .normalizer
            .formulas(solute)
            .map_err(|e| e.to_string())
            .and_then(|formulas| {
                let first = formulas.first().ok_or("no solute species")?;
                Ok(first.molar_mass())
            });
        match resolved {
            Ok(mw) => Ok(Some(mw)),
            Err(reason) => {
                debug!(solute, %reason, "solute molar mass unavailable");
                Ok(None)
            }
        }
    }
}

fn checked(state: &DilutionState, slot: Slot) -> SolutionResult<Option<Quantity>> {
    let Some(q) = state.get(slot) else {
        return Ok(None);
    };
    ensure_positive(q.magnitude, slot.name())
        .map_err(|e| SolutionError::InvalidInput(e.to_string()))?;
    Ok(Some(q))
}

fn concentration(state: &DilutionState, slot: Slot) -> SolutionResult<Option<Concentration>> {
    checked(state, slot)?
        .map(|q| q.to_concentration())
        .transpose()
        .map_err(SolutionError::from)
}

fn volume(state: &DilutionState, slot: Slot) -> SolutionResult<Option<Volume>> {
    checked(state, slot)?
        .map(|q| q.to_volume())
        .transpose()
        .map_err(SolutionError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;
    use ca_core::numeric::{Tolerances, nearly_equal};

    fn molar(v: f64) -> Quantity {
        Quantity::new(v, Unit::MOL_PER_L)
    }

    fn litres(v: f64) -> Quantity {
        Quantity::new(v, Unit::LITER)
    }

    fn close(a: f64, b: f64) -> bool {
        nearly_equal(a, b, Tolerances::default())
    }

    #[test]
    fn solves_initial_volume() {
        let state = DilutionState::default()
            .with(Slot::C1, molar(1.0))
            .with(Slot::C2, molar(0.5))
            .with(Slot::V2, litres(2.0));
        let r = DilutionSolver::default().solve(&state, None, None).unwrap();
        assert_eq!(r.missing, Slot::V1);
        assert_eq!(r.value.unit, Unit::LITER);
        assert!(close(r.value.magnitude, 1.0));
    }

    #[test]
    fn solves_each_slot() {
        let solver = DilutionSolver::default();
        let full = DilutionState::default()
            .with(Slot::C1, molar(1.0))
            .with(Slot::V1, Quantity::new(100.0, Unit::MILLILITER))
            .with(Slot::C2, Quantity::new(250.0, Unit::MILLIMOL_PER_L))
            .with(Slot::V2, Quantity::new(400.0, Unit::MILLILITER));

        for slot in Slot::ALL {
            let mut state = full.clone();
            state.set(slot, None);
            let r = solver.solve(&state, None, None).unwrap();
            assert_eq!(r.missing, slot);
            let expected = full.get(slot).unwrap();
            let got = r.value.convert(expected.unit).unwrap();
            assert!(close(got.magnitude, expected.magnitude), "{slot}: {got}");
        }
    }

    #[test]
    fn mass_from_explicit_molecular_weight() {
        let state = DilutionState::default()
            .with(Slot::V1, litres(1.0))
            .with(Slot::C2, molar(0.5))
            .with(Slot::V2, litres(2.0));
        let r = DilutionSolver::default()
            .solve(&state, Some(58.44), None)
            .unwrap();
        assert_eq!(r.missing, Slot::C1);
        assert!(close(r.value.magnitude, 1.0));
        assert!(close(r.mass_g.unwrap(), 58.44));
    }

    #[test]
    fn mass_from_solute_formula() {
        let state = DilutionState::default()
            .with(Slot::V1, litres(1.0))
            .with(Slot::C2, molar(0.5))
            .with(Slot::V2, litres(2.0));
        let solver = DilutionSolver::default();

        let r = solver.solve(&state, None, Some("NaCl")).unwrap();
        let mass = r.mass_g.unwrap();
        assert!((mass - 58.44).abs() < 0.01, "mass = {mass}");

        let r = solver.solve(&state, None, Some("Qq")).unwrap();
        assert_eq!(r.mass_g, None);
    }

    #[test]
    fn no_mass_without_final_values() {
        let state = DilutionState::default()
            .with(Slot::C1, molar(1.0))
            .with(Slot::V1, litres(1.0))
            .with(Slot::C2, molar(0.5));
        let r = DilutionSolver::default()
            .solve(&state, Some(58.44), None)
            .unwrap();
        assert_eq!(r.missing, Slot::V2);
        assert_eq!(r.mass_g, None);
    }

    #[test]
    fn rejects_wrong_number_of_missing_slots() {
        let solver = DilutionSolver::default();
        let err = solver
            .solve(&DilutionState::default(), None, None)
            .unwrap_err();
        assert!(matches!(err, SolutionError::InvalidInput(_)));

        let full = DilutionState::default()
            .with(Slot::C1, molar(1.0))
            .with(Slot::V1, litres(1.0))
            .with(Slot::C2, molar(0.5))
            .with(Slot::V2, litres(2.0));
        assert!(matches!(
            solver.solve(&full, None, None),
            Err(SolutionError::InvalidInput(_))
        ));

        let mut two_missing = full.clone();
        two_missing.set(Slot::C1, None);
        two_missing.set(Slot::V2, None);
        let err = solver.solve(&two_missing, None, None).unwrap_err();
        assert!(matches!(err, SolutionError::InvalidInput(_)));
        assert!(err.to_string().contains("got 2"), "{err}");
    }

    #[test]
    fn rejects_non_positive_values() {
        let solver = DilutionSolver::default();
        for bad in [0.0, -1.0, f64::NAN] {
            let state = DilutionState::default()
                .with(Slot::C1, molar(bad))
                .with(Slot::C2, molar(0.5))
                .with(Slot::V2, litres(2.0));
            let err = solver.solve(&state, None, None).unwrap_err();
            assert!(matches!(err, SolutionError::InvalidInput(_)), "{bad}");
            assert!(err.to_string().contains("c1"));
        }

        let state = DilutionState::default()
            .with(Slot::V1, litres(1.0))
            .with(Slot::C2, molar(0.5))
            .with(Slot::V2, litres(2.0));
        assert!(matches!(
            solver.solve(&state, Some(-58.44), None),
            Err(SolutionError::InvalidInput(_))
        ));
        assert!(solver.solve(&state, Some(f64::INFINITY), None).is_err());
    }

    #[test]
    fn zero_molecular_weight_falls_back_to_solute() {
        let state = DilutionState::default()
            .with(Slot::V1, litres(1.0))
            .with(Slot::C2, molar(0.5))
            .with(Slot::V2, litres(2.0));
        let solver = DilutionSolver::default();

        let r = solver.solve(&state, Some(0.0), None).unwrap();
        assert_eq!(r.mass_g, None);

        let r = solver.solve(&state, Some(0.0), Some("NaCl")).unwrap();
        let mass = r.mass_g.unwrap();
        assert!((mass - 58.44).abs() < 0.01, "mass = {mass}");
    }

    #[test]
    fn mass_of_smiles_ion_uses_decoded_composition() {
        let state = DilutionState::default()
            .with(Slot::V1, litres(1.0))
            .with(Slot::C2, molar(1.0))
            .with(Slot::V2, litres(2.0));
        let r = DilutionSolver::default()
            .solve(&state, None, Some("[O-]S(=O)(=O)[O-]"))
            .unwrap();
        // 2 mol of sulfate at about 96.06 g/mol
        let mass = r.mass_g.unwrap();
        assert!((mass - 192.11).abs() < 0.05, "mass = {mass}");
    }

    #[test]
    fn rejects_inconsistent_values() {
        let solver = DilutionSolver::default();
        let state = DilutionState::default()
            .with(Slot::C1, molar(1.0))
            .with(Slot::V1, litres(2.0))
            .with(Slot::V2, litres(2.0));
        assert!(matches!(
            solver.solve(&state, None, None),
            Err(SolutionError::Inconsistency(_))
        ));

        let state = DilutionState::default()
            .with(Slot::C1, molar(0.1))
            .with(Slot::C2, molar(0.5))
            .with(Slot::V2, litres(2.0));
        assert!(matches!(
            solver.solve(&state, None, None),
            Err(SolutionError::Inconsistency(_))
        ));
    }

    #[test]
    fn rejects_unit_of_wrong_kind() {
        let state = DilutionState::default()
            .with(Slot::C1, litres(1.0))
            .with(Slot::C2, molar(0.5))
            .with(Slot::V2, litres(2.0));
        assert!(matches!(
            DilutionSolver::default().solve(&state, None, None),
            Err(SolutionError::Unit(_))
        ));
    }

    #[test]
    fn slot_names_parse() {
        assert_eq!("V2".parse::<Slot>().unwrap(), Slot::V2);
        assert!("c3".parse::<Slot>().is_err());
    }
}
