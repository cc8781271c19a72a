//! Stoichiometric balancing.
//!
//! Builds the element-by-species composition matrix (reactant columns
//! positive, product columns negative, plus a net-charge row for ionic
//! equations) and finds its integer null space by fraction-free
//! elimination. A balanceable reaction has exactly one null-space
//! direction, and every coefficient along it has the same sign.

use std::collections::BTreeSet;
use std::fmt;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChemError, ChemResult};
use crate::formula::Formula;

/// Species with its integer stoichiometric coefficient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub species: String,
    pub coefficient: u64,
}

/// A balanced reaction, species kept in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancedReaction {
    pub reactants: Vec<Term>,
    pub products: Vec<Term>,
}

impl BalancedReaction {
    /// Coefficient of `species` on either side.
    pub fn coefficient(&self, species: &str) -> Option<u64> {
        self.reactants
            .iter()
            .chain(&self.products)
            .find(|t| t.species == species)
            .map(|t| t.coefficient)
    }

    /// `$$ \ce{2H2 + O2 \rightleftharpoons 2H2O} $$`
    pub fn to_latex(&self, reversible: bool) -> String {
        let arrow = if reversible {
            "\\rightleftharpoons"
        } else {
            "\\rightarrow"
        };
        format!(
            "$$ \\ce{{{} {} {}}} $$",
            side_text(&self.reactants),
            arrow,
            side_text(&self.products)
        )
    }
}

impl fmt::Display for BalancedReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {}",
            side_text(&self.reactants),
            side_text(&self.products)
        )
    }
}

fn side_text(terms: &[Term]) -> String {
    terms
        .iter()
        .map(|t| match t.coefficient {
            1 => t.species.clone(),
            n => format!("{n}{}", t.species),
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Split a whole equation into its two sides.
///
/// Arrows (`<=>`, `->`, `=>`, `→`, `⇌`) are preferred over a bare `=`,
/// which is also the SMILES double bond.
pub fn split_equation(equation: &str) -> Option<(&str, &str)> {
    for arrow in ["<=>", "⇌", "->", "=>", "→", "="] {
        if let Some((left, right)) = equation.split_once(arrow) {
            return Some((left.trim(), right.trim()));
        }
    }
    None
}

/// Balance `reactants -> products` given as formula strings.
pub fn balance<S: AsRef<str>>(reactants: &[S], products: &[S]) -> ChemResult<BalancedReaction> {
    let parse = |side: &[S]| {
        side.iter()
            .map(|species| Formula::parse(species.as_ref()))
            .collect::<ChemResult<Vec<_>>>()
    };
    balance_formulas(&parse(reactants)?, &parse(products)?)
}

/// Balance already parsed formulas; species are named by their text.
pub fn balance_formulas(
    reactants: &[Formula],
    products: &[Formula],
) -> ChemResult<BalancedReaction> {
    if reactants.is_empty() || products.is_empty() {
        return Err(ChemError::Balance(
            "both reactants and products are required".into(),
        ));
    }

    let formulas: Vec<&Formula> = reactants.iter().chain(products).collect();
    let mut seen = BTreeSet::new();
    for formula in &formulas {
        if !seen.insert(formula.text()) {
            return Err(ChemError::Balance(format!(
                "'{}' is listed twice",
                formula.text()
            )));
        }
    }

    let matrix = composition_matrix(&formulas, reactants.len());
    let coefficients = null_vector(matrix)?;
    debug!(?coefficients, "balanced reaction");

    let terms: Vec<Term> = formulas
        .iter()
        .zip(&coefficients)
        .map(|(formula, &coefficient)| Term {
            species: formula.text().to_string(),
            coefficient,
        })
        .collect();
    let (reactants, products) = terms.split_at(reactants.len());
    Ok(BalancedReaction {
        reactants: reactants.to_vec(),
        products: products.to_vec(),
    })
}

/// One row per element (plus charge when any species is charged), one
/// column per species; product columns are negated.
fn composition_matrix(formulas: &[&Formula], n_reactants: usize) -> DMatrix<i128> {
    let elements: BTreeSet<&str> = formulas
        .iter()
        .flat_map(|f| f.composition().keys().copied())
        .collect();
    let charged = formulas.iter().any(|f| f.charge() != 0);
    let rows = elements.len() + usize::from(charged);

    let mut matrix = DMatrix::<i128>::zeros(rows, formulas.len());
    for (col, formula) in formulas.iter().enumerate() {
        let sign = if col < n_reactants { 1 } else { -1 };
        for (row, element) in elements.iter().enumerate() {
            matrix[(row, col)] = sign * i128::from(formula.count(element));
        }
        if charged {
            matrix[(rows - 1, col)] = sign * i128::from(formula.charge());
        }
    }
    matrix
}

/// Smallest positive integer vector spanning the null space of `a`.
fn null_vector(mut a: DMatrix<i128>) -> ChemResult<Vec<u64>> {
    let overflow = || ChemError::Balance("coefficients too large".into());
    let (rows, cols) = a.shape();

    let mut pivots: Vec<(usize, usize)> = Vec::new();
    let mut row = 0;
    for col in 0..cols {
        if row == rows {
            break;
        }
        let Some(found) = (row..rows).find(|&r| a[(r, col)] != 0) else {
            continue;
        };
        a.swap_rows(row, found);

        for other in 0..rows {
            if other == row || a[(other, col)] == 0 {
                continue;
            }
            let p = a[(row, col)];
            let f = a[(other, col)];
            for k in 0..cols {
                let scaled = a[(other, k)].checked_mul(p).ok_or_else(overflow)?;
                let removed = a[(row, k)].checked_mul(f).ok_or_else(overflow)?;
                a[(other, k)] = scaled.checked_sub(removed).ok_or_else(overflow)?;
            }
            let g = (0..cols).fold(0, |g, k| gcd(g, a[(other, k)]));
            if g > 1 {
                for k in 0..cols {
                    a[(other, k)] /= g;
                }
            }
        }
        pivots.push((row, col));
        row += 1;
    }

    let free: Vec<usize> = (0..cols)
        .filter(|c| !pivots.iter().any(|&(_, pc)| pc == *c))
        .collect();
    let free_col = match free.as_slice() {
        [] => {
            return Err(ChemError::Balance(
                "no combination of coefficients conserves every element".into(),
            ));
        }
        [single] => *single,
        many => {
            return Err(ChemError::Balance(format!(
                "underdetermined: {} independent ways to balance",
                many.len()
            )));
        }
    };

    let scale = pivots
        .iter()
        .try_fold(1i128, |l, &(r, c)| lcm(l, a[(r, c)]))
        .ok_or_else(overflow)?;
    let mut x = vec![0i128; cols];
    x[free_col] = scale;
    for &(r, c) in &pivots {
        let factor = scale / a[(r, c)];
        x[c] = a[(r, free_col)]
            .checked_mul(factor)
            .and_then(i128::checked_neg)
            .ok_or_else(overflow)?;
    }

    let g = x.iter().fold(0, |g, &v| gcd(g, v));
    if g > 1 {
        x.iter_mut().for_each(|v| *v /= g);
    }
    if x.iter().all(|&v| v <= 0) {
        x.iter_mut().for_each(|v| *v = -*v);
    }
    if x.iter().any(|&v| v <= 0) {
        return Err(ChemError::Balance(
            "some species would need a zero or negative coefficient".into(),
        ));
    }
    x.into_iter()
        .map(|v| u64::try_from(v).map_err(|_| overflow()))
        .collect()
}

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: i128, b: i128) -> Option<i128> {
    let (a, b) = (a.abs(), b.abs());
    if a == 0 || b == 0 {
        return Some(0);
    }
    (a / gcd(a, b)).checked_mul(b)
}
