//! Species input normalization.
//!
//! Raw user text such as `"NH4+ CO2, CCO"` is split into tokens and each
//! token is resolved to a formula:
//!
//! 1. tokens that look like formulas (charge suffix, a two-letter element
//!    symbol, or a short all-letter token that is not just carbon) are
//!    parsed as formulas first and kept verbatim;
//! 2. otherwise the token is decoded as SMILES and replaced by its
//!    canonical formula;
//! 3. failing that, it is parsed as a formula after all.
//!
//! The order matters: `CO` must stay carbon monoxide and never be read as
//! the SMILES for methanol.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChemError, ChemResult};
use crate::formula::Formula;
use crate::smiles::parse_smiles;

/// Whitespace, commas and semicolons.
pub const DEFAULT_SEPARATORS: &str = r"[\s,;]+";

static DEFAULT_NORMALIZER: LazyLock<Normalizer> = LazyLock::new(Normalizer::default);

/// How a token was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Formula,
    Smiles,
}

/// One species as entered and as resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaToken {
    pub raw: String,
    pub resolved: String,
    pub kind: TokenKind,
}

/// Ordered species list, in input order.
pub type SpeciesList = Vec<FormulaToken>;

/// Splits and resolves species text. Immutable once built.
#[derive(Debug, Clone)]
pub struct Normalizer {
    separators: Regex,
    charge_suffix: Regex,
    mixed_case: Regex,
}

impl Default for Normalizer {
    fn default() -> Self {
        // The default pattern is a compile-time constant.
        Self::new(DEFAULT_SEPARATORS).expect("default separator pattern is valid")
    }
}

impl Normalizer {
    /// Build a normalizer splitting on `separators` (a regular expression).
    pub fn new(separators: &str) -> ChemResult<Self> {
        let separators = Regex::new(separators).map_err(|e| ChemError::InvalidPattern {
            pattern: separators.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            separators,
            charge_suffix: Regex::new(r"[+-]\d*$").expect("static pattern"),
            mixed_case: Regex::new(r"[A-Z][a-z]").expect("static pattern"),
        })
    }

    pub fn separators(&self) -> &str {
        self.separators.as_str()
    }

    /// Split raw text into species tokens without resolving them.
    ///
    /// Standalone `+` tokens are dropped and a `+` between two word
    /// characters splits a token (`H2O+CO2`), while a trailing `+`/`-`
    /// stays attached as a charge (`NH4+`).
    pub fn split(&self, raw: &str) -> Vec<String> {
        self.separators
            .split(raw)
            .map(str::trim)
            .filter(|token| !token.is_empty() && *token != "+")
            .flat_map(split_joined)
            .collect()
    }

    /// Split and resolve every token, keeping the raw text alongside.
    pub fn normalize_tokens(&self, raw: &str) -> ChemResult<SpeciesList> {
        self.split(raw)
            .into_iter()
            .map(|token| self.resolve(&token))
            .collect()
    }

    /// Split and resolve every token to a formula string.
    pub fn normalize(&self, raw: &str) -> ChemResult<Vec<String>> {
        Ok(self
            .normalize_tokens(raw)?
            .into_iter()
            .map(|token| token.resolved)
            .collect())
    }

    /// Split and resolve every token to a parsed formula.
    ///
    /// SMILES tokens keep the composition decoded from the graph, so a
    /// canonical rendering such as `O4S2-` is never re-read as text.
    pub fn formulas(&self, raw: &str) -> ChemResult<Vec<Formula>> {
        self.split(raw)
            .into_iter()
            .map(|token| self.resolve_formula(&token).map(|(_, formula)| formula))
            .collect()
    }

    /// Resolve a single token.
    pub fn resolve(&self, token: &str) -> ChemResult<FormulaToken> {
        Ok(self.resolve_formula(token)?.0)
    }

    fn resolve_formula(&self, token: &str) -> ChemResult<(FormulaToken, Formula)> {
        let as_formula = |formula: Formula| {
            let token = FormulaToken {
                raw: token.to_string(),
                resolved: token.to_string(),
                kind: TokenKind::Formula,
            };
            (token, formula)
        };

        if self.looks_like_formula(token) {
            if let Ok(formula) = Formula::parse(token) {
                return Ok(as_formula(formula));
            }
        }

        match parse_smiles(token) {
            Ok(molecule) => {
                let mut formula = molecule.formula();
                // A lone carbon would read back as methane; an explicit count keeps it.
                if formula.text() == "C" {
                    formula = Formula::parse("C1")?;
                }
                let resolved = formula.text().to_string();
                debug!(token, %resolved, "resolved SMILES token");
                let token = FormulaToken {
                    raw: token.to_string(),
                    resolved,
                    kind: TokenKind::Smiles,
                };
                return Ok((token, formula));
            }
            Err(err) => debug!(token, %err, "token is not SMILES"),
        }

        if let Ok(formula) = Formula::parse(token) {
            return Ok(as_formula(formula));
        }

        Err(ChemError::InvalidSpecies {
            token: token.to_string(),
        })
    }

    fn looks_like_formula(&self, token: &str) -> bool {
        self.charge_suffix.is_match(token)
            || self.mixed_case.is_match(token)
            || (token.chars().all(char::is_alphabetic)
                && token.chars().count() <= 2
                && token.chars().any(|c| c != 'C'))
    }
}

/// Normalize with the default separators.
pub fn normalize(raw: &str) -> ChemResult<Vec<String>> {
    DEFAULT_NORMALIZER.normalize(raw)
}

/// Split `H2O+CO2` into `H2O`, `CO2`; a `+` only separates when it sits
/// between two word characters, outside `[...]`, and does not start a
/// `+N` charge (`Fe+3`, `Fe+3+Cl-`).
fn split_joined(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0_usize;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        let joins = c == '+'
            && depth == 0
            && i > 0
            && is_word(chars[i - 1])
            && chars.get(i + 1).is_some_and(|&next| is_word(next))
            && !is_charge(&chars[i + 1..]);
        if joins {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Digits running to the end of the token or to the next `+`.
fn is_charge(rest: &[char]) -> bool {
    let digits = rest.iter().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && matches!(rest.get(digits), None | Some('+'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_separators() {
        let n = Normalizer::default();
        assert_eq!(n.split("H2O CO2"), ["H2O", "CO2"]);
        assert_eq!(n.split("H2O,CO2"), ["H2O", "CO2"]);
        assert_eq!(n.split("H2O;  CO2"), ["H2O", "CO2"]);
        assert_eq!(n.split("H2O+CO2"), ["H2O", "CO2"]);
        assert_eq!(n.split("H2 + O2"), ["H2", "O2"]);
        assert_eq!(n.split("NH4+ Cl-"), ["NH4+", "Cl-"]);
        assert_eq!(n.split("Fe+3 Ba+2"), ["Fe+3", "Ba+2"]);
        assert_eq!(n.split("Fe+3+Cl-"), ["Fe+3", "Cl-"]);
        assert_eq!(n.split("[Fe+3]"), ["[Fe+3]"]);
        assert_eq!(n.split("CO2+Fe+3"), ["CO2", "Fe+3"]);
        assert!(n.split("   ").is_empty());
    }

    #[test]
    fn custom_separators() {
        let n = Normalizer::new(r"\|").unwrap();
        assert_eq!(n.split("H2O|CO2"), ["H2O", "CO2"]);
        assert!(matches!(
            Normalizer::new("[unclosed"),
            Err(ChemError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn formulas_pass_through() {
        assert_eq!(normalize("H2O").unwrap(), ["H2O"]);
        assert_eq!(normalize("NH4+").unwrap(), ["NH4+"]);
        assert_eq!(normalize("NaOH HCl").unwrap(), ["NaOH", "HCl"]);
        assert_eq!(normalize("NH3 O").unwrap(), ["NH3", "O"]);
        assert_eq!(normalize("CO").unwrap(), ["CO"]);
    }

    #[test]
    fn smiles_are_converted() {
        assert_eq!(normalize("CCO").unwrap(), ["C2H6O"]);
        assert_eq!(normalize("[NH4+]").unwrap(), ["H4N+"]);
        assert_eq!(normalize("CC O=O").unwrap(), ["C2H6", "O2"]);
        assert_eq!(normalize("C=O").unwrap(), ["CH2O"]);
        assert_eq!(normalize("[Fe+3]").unwrap(), ["Fe3+"]);
    }

    #[test]
    fn lone_carbon_stays_carbon() {
        assert_eq!(normalize("[C]").unwrap(), ["C1"]);
        assert_eq!(normalize("C1").unwrap(), ["C1"]);
        assert_eq!(normalize("C").unwrap(), ["CH4"]);
    }

    #[test]
    fn smiles_ions_keep_decoded_composition() {
        let n = Normalizer::default();
        let sulfate = n.formulas("[O-]S(=O)(=O)[O-]").unwrap();
        assert_eq!(sulfate[0].text(), "O4S2-");
        assert_eq!(sulfate[0].count("S"), 1);
        assert_eq!(sulfate[0].count("O"), 4);
        assert_eq!(sulfate[0].charge(), -2);
        assert!((sulfate[0].molar_mass() - 96.06).abs() < 0.02);

        let barium = n.formulas("[Ba+2]").unwrap();
        assert_eq!(barium[0].text(), "Ba2+");
        assert_eq!(barium[0].count("Ba"), 1);
        assert_eq!(barium[0].charge(), 2);
    }

    #[test]
    fn token_kinds_are_reported() {
        let tokens = Normalizer::default().normalize_tokens("H2O CCO").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Formula);
        assert_eq!(tokens[1].kind, TokenKind::Smiles);
        assert_eq!(tokens[1].raw, "CCO");
        assert_eq!(tokens[1].resolved, "C2H6O");
    }

    #[test]
    fn invalid_token_is_reported() {
        let err = normalize("H2O NotAFormula").unwrap_err();
        assert_eq!(
            err,
            ChemError::InvalidSpecies {
                token: "NotAFormula".into()
            }
        );
    }

    #[test]
    fn empty_input_is_empty_list() {
        assert!(normalize("").unwrap().is_empty());
    }
}
