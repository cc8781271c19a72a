//! Chemical formula parsing, composition and molar mass.
//!
//! Accepted forms:
//! - element symbols with optional counts: `H2O`, `NaCl`
//! - nested groups in `()` or `[]` with multipliers: `Ca(OH)2`, `K4[Fe(CN)6]`
//! - hydrates/adducts joined by `.`, `·` or `*`, each with an optional
//!   leading multiplier: `CuSO4.5H2O`
//! - a trailing phase mark, which is dropped: `NaCl(aq)`, `H2O(l)`
//! - a trailing charge: `NH4+`, `Cl-`, `Fe+3`, `SO4-2`, `Fe/3+`, `Cu++`
//!
//! A bare `<digits><sign>` ending such as `S2-` reads the digits as the
//! count of the preceding element and the sign as a single charge.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ca_core::units::{MolarMass, constants::ELECTRON_MOLAR_MASS_G, g_per_mol};

use crate::element::element_by_symbol;
use crate::error::{ChemError, ChemResult};

const PHASE_MARKS: [&str; 5] = ["(aq)", "(cr)", "(s)", "(l)", "(g)"];
const HYDRATE_SEPARATORS: [char; 3] = ['.', '·', '*'];

/// Element composition keyed by element symbol.
pub type Composition = BTreeMap<&'static str, u32>;

/// A parsed chemical formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    text: String,
    composition: Composition,
    charge: i32,
}

impl Formula {
    /// Parse formula text.
    pub fn parse(text: &str) -> ChemResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ChemError::formula(text, "empty formula"));
        }

        let without_phase = strip_phase_mark(trimmed);
        let (body, charge) = split_charge(without_phase)
            .ok_or_else(|| ChemError::formula(trimmed, "malformed charge"))?;
        if body.is_empty() {
            return Err(ChemError::formula(trimmed, "no elements"));
        }

        let mut composition = Composition::new();
        for part in body.split(HYDRATE_SEPARATORS) {
            let chars: Vec<char> = part.chars().collect();
            let mut parser = GroupParser {
                formula: trimmed,
                chars: &chars,
                pos: 0,
            };
            let multiplier = parser.leading_multiplier()?;
            let part_composition = parser.sequence(None)?;
            if parser.pos != chars.len() {
                return Err(ChemError::formula(
                    trimmed,
                    format!("unexpected character '{}'", chars[parser.pos]),
                ));
            }
            if part_composition.is_empty() {
                return Err(ChemError::formula(trimmed, "empty hydrate part"));
            }
            merge_scaled(&mut composition, &part_composition, multiplier)
                .ok_or_else(|| ChemError::formula(trimmed, "count overflow"))?;
        }

        Ok(Self {
            text: trimmed.to_string(),
            composition,
            charge,
        })
    }

    /// Build a formula from a known composition; the text is the canonical rendering.
    pub fn from_composition(composition: Composition, charge: i32) -> Self {
        let text = canonical_formula(&composition, charge);
        Self {
            text,
            composition,
            charge,
        }
    }

    /// Formula text as entered (trimmed).
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    /// Number of atoms of `symbol` (0 if absent).
    pub fn count(&self, symbol: &str) -> u32 {
        self.composition.get(symbol).copied().unwrap_or(0)
    }

    /// Net charge in elementary charges.
    pub fn charge(&self) -> i32 {
        self.charge
    }

    /// Molar mass [g/mol], corrected for the electrons gained or lost by ions.
    pub fn molar_mass(&self) -> f64 {
        let atoms: f64 = self
            .composition
            .iter()
            .map(|(symbol, count)| {
                // Every key came from the element table.
                let weight = element_by_symbol(symbol).map_or(0.0, |e| e.atomic_weight);
                weight * f64::from(*count)
            })
            .sum();
        atoms - f64::from(self.charge) * ELECTRON_MOLAR_MASS_G
    }

    pub fn molar_mass_quantity(&self) -> MolarMass {
        g_per_mol(self.molar_mass())
    }

    /// Canonical rendering: C first, H second, the rest alphabetical.
    pub fn canonical(&self) -> String {
        canonical_formula(&self.composition, self.charge)
    }
}

impl FromStr for Formula {
    type Err = ChemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formula::parse(s)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Molar mass [g/mol] of formula text.
pub fn molar_mass(formula: &str) -> ChemResult<f64> {
    Ok(Formula::parse(formula)?.molar_mass())
}

/// Render a composition with carbon first, hydrogen second, then the other
/// elements alphabetically. Counts of one are omitted, as is a charge of zero.
pub fn canonical_formula(composition: &Composition, charge: i32) -> String {
    let mut out = String::new();
    for lead in ["C", "H"] {
        if let Some(&count) = composition.get(lead) {
            push_element(&mut out, lead, count);
        }
    }
    for (&symbol, &count) in composition {
        if symbol != "C" && symbol != "H" {
            push_element(&mut out, symbol, count);
        }
    }
    out.push_str(&charge_suffix(charge));
    out
}

/// `+`, `-`, `2+`, `3-`, or empty for neutral species.
pub fn charge_suffix(charge: i32) -> String {
    let sign = if charge > 0 { '+' } else { '-' };
    match charge.unsigned_abs() {
        0 => String::new(),
        1 => sign.to_string(),
        n => format!("{n}{sign}"),
    }
}

fn push_element(out: &mut String, symbol: &str, count: u32) {
    if count == 0 {
        return;
    }
    out.push_str(symbol);
    if count > 1 {
        out.push_str(&count.to_string());
    }
}

fn strip_phase_mark(text: &str) -> &str {
    PHASE_MARKS
        .iter()
        .find_map(|mark| text.strip_suffix(*mark))
        .map(str::trim_end)
        .unwrap_or(text)
}

/// Split off a trailing charge. Returns `None` when the suffix is malformed.
fn split_charge(text: &str) -> Option<(&str, i32)> {
    let bytes = text.as_bytes();
    let is_sign = |b: u8| b == b'+' || b == b'-';
    let sign_of = |b: u8| if b == b'+' { 1 } else { -1 };

    // `+3`, `-2`
    let digits_start = text
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + 1);
    if digits_start < bytes.len() && digits_start > 0 && is_sign(bytes[digits_start - 1]) {
        let magnitude: i32 = text[digits_start..].parse().ok()?;
        if magnitude == 0 {
            return None;
        }
        let body = &text[..digits_start - 1];
        if body.ends_with(['+', '-']) {
            return None;
        }
        return Some((body, sign_of(bytes[digits_start - 1]) * magnitude));
    }

    // `+`, `--`, `/3+`
    let Some(&last) = bytes.last() else {
        return Some((text, 0));
    };
    if !is_sign(last) {
        return Some((text, 0));
    }
    let run = bytes.iter().rev().take_while(|&&b| b == last).count();
    let body = &text[..text.len() - run];
    if body.ends_with(['+', '-']) {
        return None;
    }
    if let Some(slash) = body.rfind('/') {
        let magnitude: i32 = body[slash + 1..].parse().ok()?;
        if run != 1 || magnitude == 0 {
            return None;
        }
        return Some((&body[..slash], sign_of(last) * magnitude));
    }
    let run = i32::try_from(run).ok()?;
    Some((body, sign_of(last) * run))
}

fn merge_scaled(into: &mut Composition, from: &Composition, factor: u32) -> Option<()> {
    for (&symbol, &count) in from {
        let add = count.checked_mul(factor)?;
        let slot = into.entry(symbol).or_insert(0);
        *slot = slot.checked_add(add)?;
    }
    Some(())
}

struct GroupParser<'a> {
    formula: &'a str,
    chars: &'a [char],
    pos: usize,
}

impl GroupParser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, reason: impl Into<String>) -> ChemError {
        ChemError::formula(self.formula, reason)
    }

    fn leading_multiplier(&mut self) -> ChemResult<u32> {
        Ok(self.number()?.unwrap_or(1))
    }

    fn number(&mut self) -> ChemResult<Option<u32>> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        let value: u32 = digits
            .parse()
            .map_err(|_| self.error(format!("count '{digits}' too large")))?;
        if value == 0 {
            return Err(self.error("zero count"));
        }
        Ok(Some(value))
    }

    /// Parse items until `close` (or end of input when `close` is `None`).
    fn sequence(&mut self, close: Option<char>) -> ChemResult<Composition> {
        let mut composition = Composition::new();
        loop {
            let Some(c) = self.peek() else {
                return match close {
                    Some(expected) => Err(self.error(format!("missing '{expected}'"))),
                    None => Ok(composition),
                };
            };

            if Some(c) == close {
                return Ok(composition);
            }

            let item = match c {
                '(' | '[' => {
                    self.pos += 1;
                    let closing = if c == '(' { ')' } else { ']' };
                    let inner = self.sequence(Some(closing))?;
                    self.pos += 1;
                    if inner.is_empty() {
                        return Err(self.error("empty group"));
                    }
                    inner
                }
                c if c.is_ascii_uppercase() => {
                    let symbol = self.symbol()?;
                    Composition::from([(symbol, 1)])
                }
                ')' | ']' => return Err(self.error(format!("unbalanced '{c}'"))),
                c => return Err(self.error(format!("unexpected character '{c}'"))),
            };

            let count = self.number()?.unwrap_or(1);
            merge_scaled(&mut composition, &item, count)
                .ok_or_else(|| self.error("count overflow"))?;
        }
    }

    fn symbol(&mut self) -> ChemResult<&'static str> {
        let first = self.chars[self.pos];
        self.pos += 1;
        let mut symbol = first.to_string();
        if let Some(second) = self.peek().filter(char::is_ascii_lowercase) {
            symbol.push(second);
            self.pos += 1;
        }
        element_by_symbol(&symbol)
            .map(|e| e.symbol)
            .ok_or_else(|| self.error(format!("unknown element '{symbol}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} ± {tol}, got {actual}"
        );
    }

    #[test]
    fn simple_formulas() {
        let water = Formula::parse("H2O").unwrap();
        assert_eq!(water.count("H"), 2);
        assert_eq!(water.count("O"), 1);
        assert_eq!(water.charge(), 0);
        assert_approx(water.molar_mass(), 18.015, 1e-3);

        let salt: Formula = "NaCl".parse().unwrap();
        assert_approx(salt.molar_mass(), 58.44, 1e-2);
    }

    #[test]
    fn groups_and_hydrates() {
        let f = Formula::parse("Ca(OH)2").unwrap();
        assert_eq!(f.count("Ca"), 1);
        assert_eq!(f.count("O"), 2);
        assert_eq!(f.count("H"), 2);

        let f = Formula::parse("K4[Fe(CN)6]").unwrap();
        assert_eq!(f.count("K"), 4);
        assert_eq!(f.count("Fe"), 1);
        assert_eq!(f.count("C"), 6);
        assert_eq!(f.count("N"), 6);

        let f = Formula::parse("CuSO4.5H2O").unwrap();
        assert_eq!(f.count("Cu"), 1);
        assert_eq!(f.count("O"), 9);
        assert_eq!(f.count("H"), 10);
        assert_approx(f.molar_mass(), 249.68, 1e-2);
    }

    #[test]
    fn charges() {
        assert_eq!(Formula::parse("NH4+").unwrap().charge(), 1);
        assert_eq!(Formula::parse("Cl-").unwrap().charge(), -1);
        assert_eq!(Formula::parse("Fe+3").unwrap().charge(), 3);
        assert_eq!(Formula::parse("SO4-2").unwrap().charge(), -2);
        assert_eq!(Formula::parse("Fe/3+").unwrap().charge(), 3);
        assert_eq!(Formula::parse("Cu++").unwrap().charge(), 2);

        let sulfide = Formula::parse("S2-").unwrap();
        assert_eq!(sulfide.count("S"), 2);
        assert_eq!(sulfide.charge(), -1);
    }

    #[test]
    fn ion_mass_accounts_for_electrons() {
        let na = Formula::parse("Na").unwrap().molar_mass();
        let na_plus = Formula::parse("Na+").unwrap().molar_mass();
        assert_approx(na - na_plus, ELECTRON_MOLAR_MASS_G, 1e-12);
    }

    #[test]
    fn phase_marks_are_ignored() {
        let f = Formula::parse("NaCl(aq)").unwrap();
        assert_eq!(f.count("Na"), 1);
        assert_eq!(f.text(), "NaCl(aq)");
        assert!(Formula::parse("H2O(l)").is_ok());
    }

    #[test]
    fn rejects_bad_input() {
        for bad in ["", "  ", "Xy", "h2o", "H0", "Ca(OH", "CaOH)2", "()", "NotAFormula", "+", "H2O+-"] {
            assert!(Formula::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn canonical_rendering() {
        assert_eq!(Formula::parse("OHC2H5").unwrap().canonical(), "C2H6O");
        assert_eq!(Formula::parse("NH4+").unwrap().canonical(), "H4N+");
        assert_eq!(Formula::parse("SO4-2").unwrap().canonical(), "O4S2-");
        assert_eq!(Formula::parse("NaCl").unwrap().canonical(), "ClNa");
    }

    #[test]
    fn charge_suffix_format() {
        assert_eq!(charge_suffix(0), "");
        assert_eq!(charge_suffix(1), "+");
        assert_eq!(charge_suffix(-1), "-");
        assert_eq!(charge_suffix(2), "2+");
        assert_eq!(charge_suffix(-3), "3-");
    }
}
