//! SMILES decoding into an explicit-hydrogen atom graph.
//!
//! Supports the OpenSMILES subset needed for formula work: organic-subset
//! atoms (aliphatic and aromatic), bracket atoms with isotope, chirality,
//! hydrogen count, charge and atom class, bond symbols, branches, ring
//! closures (`1`, `%12`) and dot-separated fragments. Stereo markers are
//! consumed and ignored.

use crate::element::{Element, element_by_symbol};
use crate::error::{ChemError, ChemResult};
use crate::formula::{Composition, Formula};

/// Largest bracket-atom charge magnitude.
const MAX_CHARGE: i32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    /// Valence contribution; aromatic bonds count as one, the pi share is
    /// handled per atom.
    fn valence(self) -> u32 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atom {
    pub element: &'static Element,
    pub aromatic: bool,
    pub charge: i32,
    pub isotope: Option<u32>,
    /// Attached hydrogens: explicit for bracket atoms, implicit otherwise.
    pub hydrogens: u32,
    /// Written inside `[...]`.
    pub bracket: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
}

/// Decoded SMILES graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
}

impl Molecule {
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn net_charge(&self) -> i32 {
        self.atoms.iter().map(|a| a.charge).sum()
    }

    /// Element counts including attached hydrogens.
    pub fn composition(&self) -> Composition {
        let mut counts = Composition::new();
        for atom in &self.atoms {
            *counts.entry(atom.element.symbol).or_insert(0) += 1;
            if atom.hydrogens > 0 {
                *counts.entry("H").or_insert(0) += atom.hydrogens;
            }
        }
        counts
    }

    pub fn formula(&self) -> Formula {
        Formula::from_composition(self.composition(), self.net_charge())
    }
}

/// Decode a SMILES string.
pub fn parse_smiles(smiles: &str) -> ChemResult<Molecule> {
    let mut parser = SmilesParser::new(smiles);
    parser.parse()?;
    parser.finish()?;
    parser.fill_implicit_hydrogens();
    Ok(Molecule {
        atoms: parser.atoms,
        bonds: parser.bonds,
    })
}

/// Decode a SMILES string and render its canonical formula (`CCO` → `C2H6O`).
pub fn smiles_to_formula(smiles: &str) -> ChemResult<String> {
    Ok(parse_smiles(smiles)?.formula().text().to_string())
}

struct SmilesParser<'a> {
    input: &'a [u8],
    pos: usize,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    /// Open ring closures: number -> (atom, bond written at the opening).
    rings: Vec<(u16, usize, Option<BondOrder>)>,
    branches: Vec<usize>,
    prev: Option<usize>,
    pending: Option<BondOrder>,
}

impl<'a> SmilesParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            atoms: Vec::new(),
            bonds: Vec::new(),
            rings: Vec::new(),
            branches: Vec::new(),
            prev: None,
            pending: None,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn error(&self, reason: impl Into<String>) -> ChemError {
        ChemError::smiles(self.pos, reason)
    }

    fn parse(&mut self) -> ChemResult<()> {
        if self.input.is_empty() {
            return Err(self.error("empty SMILES"));
        }
        while let Some(c) = self.peek() {
            match c {
                b'(' => {
                    let prev = self.prev.ok_or_else(|| self.error("branch without atom"))?;
                    if self.pending.is_some() {
                        return Err(self.error("bond before branch"));
                    }
                    self.pos += 1;
                    self.branches.push(prev);
                }
                b')' => {
                    if self.pending.is_some() {
                        return Err(self.error("dangling bond"));
                    }
                    let back = self
                        .branches
                        .pop()
                        .ok_or_else(|| self.error("unbalanced ')'"))?;
                    self.pos += 1;
                    self.prev = Some(back);
                }
                b'-' | b'=' | b'#' | b'$' | b':' | b'/' | b'\\' => {
                    if self.pending.is_some() {
                        return Err(self.error("two bond symbols in a row"));
                    }
                    if self.prev.is_none() {
                        return Err(self.error("bond without preceding atom"));
                    }
                    self.pos += 1;
                    self.pending = Some(match c {
                        b'=' => BondOrder::Double,
                        b'#' => BondOrder::Triple,
                        b'$' => BondOrder::Quadruple,
                        b':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    });
                }
                b'.' => {
                    if self.pending.is_some() {
                        return Err(self.error("dangling bond"));
                    }
                    self.pos += 1;
                    self.prev = None;
                }
                b'%' => {
                    self.pos += 1;
                    let number = self.two_digit_ring()?;
                    self.ring_closure(number)?;
                }
                b'0'..=b'9' => {
                    self.pos += 1;
                    self.ring_closure(u16::from(c - b'0'))?;
                }
                b'[' => self.bracket_atom()?,
                _ => self.organic_atom()?,
            }
        }
        Ok(())
    }

    fn finish(&self) -> ChemResult<()> {
        if self.pending.is_some() {
            return Err(self.error("dangling bond"));
        }
        if let Some((number, _, _)) = self.rings.first() {
            return Err(self.error(format!("unclosed ring {number}")));
        }
        if !self.branches.is_empty() {
            return Err(self.error("unbalanced '('"));
        }
        if self.atoms.is_empty() {
            return Err(self.error("no atoms"));
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> ChemResult<()> {
        let start = self.pos;
        let Some(c) = self.bump() else {
            return Err(self.error("unexpected end"));
        };
        let (symbol, aromatic) = match c {
            b'B' if self.peek() == Some(b'r') => {
                self.pos += 1;
                ("Br", false)
            }
            b'C' if self.peek() == Some(b'l') => {
                self.pos += 1;
                ("Cl", false)
            }
            b'B' => ("B", false),
            b'C' => ("C", false),
            b'N' => ("N", false),
            b'O' => ("O", false),
            b'P' => ("P", false),
            b'S' => ("S", false),
            b'F' => ("F", false),
            b'I' => ("I", false),
            b'b' => ("B", true),
            b'c' => ("C", true),
            b'n' => ("N", true),
            b'o' => ("O", true),
            b'p' => ("P", true),
            b's' => ("S", true),
            b'H' => {
                return Err(ChemError::smiles(
                    start,
                    "hydrogen outside brackets, write [H]",
                ));
            }
            other => {
                return Err(ChemError::smiles(
                    start,
                    format!("unexpected character '{}'", char::from(other)),
                ));
            }
        };
        let element = element_by_symbol(symbol)
            .ok_or_else(|| ChemError::smiles(start, format!("unknown element '{symbol}'")))?;
        self.push_atom(Atom {
            element,
            aromatic,
            charge: 0,
            isotope: None,
            hydrogens: 0,
            bracket: false,
        })
    }

    fn bracket_atom(&mut self) -> ChemResult<()> {
        self.pos += 1; // '['
        let isotope = self.number();

        let start = self.pos;
        let first = self
            .bump()
            .filter(u8::is_ascii_alphabetic)
            .ok_or_else(|| ChemError::smiles(start, "expected element symbol"))?;
        let aromatic = first.is_ascii_lowercase();
        let mut symbol = String::from(char::from(first.to_ascii_uppercase()));
        if let Some(second) = self.peek().filter(u8::is_ascii_lowercase) {
            let mut two = symbol.clone();
            two.push(char::from(second));
            // `se`/`as` are the two-letter aromatic symbols; `[Sc]`, `[Co]` are aliphatic.
            if element_by_symbol(&two).is_some() {
                self.pos += 1;
                symbol = two;
            }
        }
        let element = element_by_symbol(&symbol)
            .ok_or_else(|| ChemError::smiles(start, format!("unknown element '{symbol}'")))?;

        self.chirality();

        // OpenSMILES allows a single hydrogen-count digit.
        let mut hydrogens = 0;
        if self.peek() == Some(b'H') {
            self.pos += 1;
            hydrogens = 1;
            if let Some(d) = self.peek().filter(u8::is_ascii_digit) {
                self.pos += 1;
                hydrogens = u32::from(d - b'0');
            }
        }

        let charge = self.bracket_charge()?;

        if self.peek() == Some(b':') {
            self.pos += 1;
            if self.number().is_none() {
                return Err(self.error("expected atom class number"));
            }
        }

        if self.bump() != Some(b']') {
            return Err(self.error("expected ']'"));
        }

        self.push_atom(Atom {
            element,
            aromatic,
            charge,
            isotope,
            hydrogens,
            bracket: true,
        })
    }

    /// Skip `@`, `@@`, `@TH1`, `@SP2`, `@OH12` and friends.
    fn chirality(&mut self) {
        if self.peek() != Some(b'@') {
            return;
        }
        while self.peek() == Some(b'@') {
            self.pos += 1;
        }
        let class = self.input.get(self.pos..self.pos + 2);
        if matches!(class, Some(b"TH" | b"AL" | b"SP" | b"TB" | b"OH")) {
            self.pos += 2;
            self.number();
        }
    }

    fn bracket_charge(&mut self) -> ChemResult<i32> {
        let Some(sign) = self.peek().filter(|c| *c == b'+' || *c == b'-') else {
            return Ok(0);
        };
        self.pos += 1;
        let unit = if sign == b'+' { 1 } else { -1 };
        let magnitude = match self.number() {
            Some(n) => n,
            None => {
                let mut run = 1;
                while self.peek() == Some(sign) {
                    self.pos += 1;
                    run += 1;
                }
                run
            }
        };
        match i32::try_from(magnitude) {
            Ok(n) if n <= MAX_CHARGE => Ok(unit * n),
            _ => Err(self.error(format!("charge {magnitude} out of range"))),
        }
    }

    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(d) = self.peek().filter(u8::is_ascii_digit) {
            self.pos += 1;
            value = value.saturating_mul(10).saturating_add(u32::from(d - b'0'));
        }
        (self.pos > start).then_some(value)
    }

    fn two_digit_ring(&mut self) -> ChemResult<u16> {
        let digits = self
            .input
            .get(self.pos..self.pos + 2)
            .filter(|d| d.iter().all(u8::is_ascii_digit))
            .ok_or_else(|| self.error("expected two digits after '%'"))?;
        let number = u16::from(digits[0] - b'0') * 10 + u16::from(digits[1] - b'0');
        self.pos += 2;
        Ok(number)
    }

    fn ring_closure(&mut self, number: u16) -> ChemResult<()> {
        let current = self
            .prev
            .ok_or_else(|| self.error("ring closure without atom"))?;
        let written = self.pending.take();

        let Some(idx) = self.rings.iter().position(|(n, _, _)| *n == number) else {
            self.rings.push((number, current, written));
            return Ok(());
        };
        let (_, open, opened_with) = self.rings.remove(idx);
        let order = match (opened_with, written) {
            (Some(a), Some(b)) if a != b => {
                return Err(self.error(format!("conflicting bonds on ring {number}")));
            }
            (Some(order), _) | (None, Some(order)) => order,
            (None, None) => self.default_order(open, current),
        };
        self.add_bond(open, current, order)
    }

    fn push_atom(&mut self, atom: Atom) -> ChemResult<()> {
        let idx = self.atoms.len();
        self.atoms.push(atom);
        if let Some(prev) = self.prev {
            let order = self
                .pending
                .take()
                .unwrap_or_else(|| self.default_order(prev, idx));
            self.add_bond(prev, idx, order)?;
        }
        self.prev = Some(idx);
        Ok(())
    }

    fn default_order(&self, a: usize, b: usize) -> BondOrder {
        if self.atoms[a].aromatic && self.atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn add_bond(&mut self, a: usize, b: usize, order: BondOrder) -> ChemResult<()> {
        if a == b {
            return Err(self.error("atom bonded to itself"));
        }
        let duplicate = self
            .bonds
            .iter()
            .any(|bond| (bond.a == a && bond.b == b) || (bond.a == b && bond.b == a));
        if duplicate {
            return Err(self.error("duplicate bond"));
        }
        self.bonds.push(Bond { a, b, order });
        Ok(())
    }

    fn fill_implicit_hydrogens(&mut self) {
        let mut bond_sums = vec![0u32; self.atoms.len()];
        for bond in &self.bonds {
            bond_sums[bond.a] += bond.order.valence();
            bond_sums[bond.b] += bond.order.valence();
        }
        for (atom, used) in self.atoms.iter_mut().zip(bond_sums) {
            if atom.bracket {
                continue;
            }
            atom.hydrogens = implicit_hydrogens(atom.element.symbol, atom.aromatic, used);
        }
    }
}

/// Standard valences of the organic subset, lowest first.
fn standard_valences(symbol: &str) -> &'static [u32] {
    match symbol {
        "B" => &[3],
        "C" => &[4],
        "N" => &[3, 5],
        "O" => &[2],
        "P" => &[3, 5],
        "S" => &[2, 4, 6],
        "F" | "Cl" | "Br" | "I" => &[1],
        _ => &[],
    }
}

fn implicit_hydrogens(symbol: &str, aromatic: bool, used: u32) -> u32 {
    let valences = standard_valences(symbol);
    if aromatic {
        // One valence unit goes to the aromatic pi system.
        return valences
            .first()
            .map_or(0, |v| v.saturating_sub(used + 1));
    }
    valences
        .iter()
        .find(|&&v| v >= used)
        .map_or(0, |v| v - used)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula(smiles: &str) -> String {
        smiles_to_formula(smiles).unwrap()
    }

    #[test]
    fn aliphatic_molecules() {
        assert_eq!(formula("C"), "CH4");
        assert_eq!(formula("CC"), "C2H6");
        assert_eq!(formula("CCO"), "C2H6O");
        assert_eq!(formula("C=O"), "CH2O");
        assert_eq!(formula("O=O"), "O2");
        assert_eq!(formula("C#N"), "CHN");
        assert_eq!(formula("CC(=O)O"), "C2H4O2");
        assert_eq!(formula("ClC(Cl)(Cl)Cl"), "CCl4");
        assert_eq!(formula("CS(=O)(=O)C"), "C2H6O2S");
    }

    #[test]
    fn aromatic_rings() {
        assert_eq!(formula("c1ccccc1"), "C6H6");
        assert_eq!(formula("c1ccncc1"), "C5H5N");
        assert_eq!(formula("c1ccoc1"), "C4H4O");
        assert_eq!(formula("c1ccsc1"), "C4H4S");
        assert_eq!(formula("c1cc[nH]c1"), "C4H5N");
        assert_eq!(formula("Cc1ccccc1"), "C7H8");
        assert_eq!(formula("c1ccc2ccccc2c1"), "C10H8");
    }

    #[test]
    fn bracket_atoms_and_charges() {
        assert_eq!(formula("[NH4+]"), "H4N+");
        assert_eq!(formula("[Na+].[Cl-]"), "ClNa");
        assert_eq!(formula("[O-]S(=O)(=O)[O-]"), "O4S2-");
        assert_eq!(formula("[Fe+3]"), "Fe3+");
        assert_eq!(formula("[Cu++]"), "Cu2+");
        assert_eq!(formula("[13CH4]"), "CH4");
        assert_eq!(formula("[H][H]"), "H2");
        assert_eq!(formula("N[C@@H](C)C(=O)O"), "C3H7NO2");
        assert_eq!(formula("[CH3:1]O"), "CH4O");
    }

    #[test]
    fn ring_closures() {
        assert_eq!(formula("C1CC1"), "C3H6");
        assert_eq!(formula("C%10CCCCC%10"), "C6H12");
        assert_eq!(formula("C=1CCCCC=1"), "C6H10");
    }

    #[test]
    fn molecule_graph() {
        let mol = parse_smiles("CC(=O)O").unwrap();
        assert_eq!(mol.atoms().len(), 4);
        assert_eq!(mol.bonds().len(), 3);
        assert_eq!(mol.net_charge(), 0);
        assert!(mol.bonds().iter().any(|b| b.order == BondOrder::Double));
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in [
            "", "H2O", "CO2", "NH3", "C1CC", "C(C", "C)C", "C==C", "C=", "[NH4", "[Xx]",
            "=C", "C11", "NotAFormula", "C%1C",
        ] {
            assert!(parse_smiles(bad).is_err(), "{bad:?} should not decode");
        }
    }

    #[test]
    fn bracket_counts_are_bounded() {
        assert_eq!(formula("[CH3][CH3]"), "C2H6");
        assert!(parse_smiles("[CH4294967295][CH4294967295]").is_err());
        assert!(parse_smiles("[CH12]").is_err());
        assert_eq!(formula("[Fe+15]"), "Fe15+");
        assert!(parse_smiles("[Fe+16]").is_err());
        assert!(parse_smiles("[Fe+4294967295]").is_err());
    }

    #[test]
    fn error_carries_position() {
        match parse_smiles("CC$").unwrap_err() {
            ChemError::Smiles { position, .. } => assert_eq!(position, 3),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
