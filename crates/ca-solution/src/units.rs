//! Concentration and volume units.
//!
//! Values are entered as a magnitude plus one of a fixed set of units
//! (`mol/L` .. `pmol/L`, `L` .. `pL`) and converted to `uom` SI quantities
//! for arithmetic. Results are shown in the most compact unit the
//! registry knows: the largest one in which the magnitude is at least 1.

use std::fmt;
use std::str::FromStr;

use ca_core::numeric::{Tolerances, nearly_equal};
use ca_core::units::{Concentration, Volume, in_liters, in_mol_per_l, liters, mol_per_l};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error in unit parsing or conversion.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    /// Input text did not parse to a number + unit
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Unit not recognized
    #[error("Unknown unit '{0}'")]
    UnknownUnit(String),

    /// Recognized, but not usable where it was given
    #[error("Expected a {expected} unit, got '{unit}'")]
    WrongKind { unit: String, expected: QuantityKind },

    /// Recognized, but not enabled in this registry
    #[error("Unit '{0}' is not enabled")]
    Disabled(String),

    #[error("No {0} units configured")]
    NoUnits(QuantityKind),
}

/// Dimension of a dilution slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityKind {
    /// canonical: mol/L
    Concentration,
    /// canonical: L
    Volume,
}

impl fmt::Display for QuantityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concentration => write!(f, "concentration"),
            Self::Volume => write!(f, "volume"),
        }
    }
}

/// Decimal prefix, largest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scale {
    Base,
    Milli,
    Micro,
    Nano,
    Pico,
}

impl Scale {
    pub const ALL: [Scale; 5] = [
        Scale::Base,
        Scale::Milli,
        Scale::Micro,
        Scale::Nano,
        Scale::Pico,
    ];

    pub fn factor(self) -> f64 {
        match self {
            Scale::Base => 1.0,
            Scale::Milli => 1e-3,
            Scale::Micro => 1e-6,
            Scale::Nano => 1e-9,
            Scale::Pico => 1e-12,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            Scale::Base => "",
            Scale::Milli => "m",
            Scale::Micro => "μ",
            Scale::Nano => "n",
            Scale::Pico => "p",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "" => Some(Scale::Base),
            "m" => Some(Scale::Milli),
            // ASCII u, micro sign and Greek mu
            "u" | "\u{b5}" | "\u{3bc}" => Some(Scale::Micro),
            "n" => Some(Scale::Nano),
            "p" => Some(Scale::Pico),
            _ => None,
        }
    }
}

/// One of the fixed concentration or volume units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Unit {
    pub kind: QuantityKind,
    pub scale: Scale,
}

impl Unit {
    pub const MOL_PER_L: Unit = Unit::concentration(Scale::Base);
    pub const MILLIMOL_PER_L: Unit = Unit::concentration(Scale::Milli);
    pub const MICROMOL_PER_L: Unit = Unit::concentration(Scale::Micro);
    pub const NANOMOL_PER_L: Unit = Unit::concentration(Scale::Nano);
    pub const PICOMOL_PER_L: Unit = Unit::concentration(Scale::Pico);
    pub const LITER: Unit = Unit::volume(Scale::Base);
    pub const MILLILITER: Unit = Unit::volume(Scale::Milli);
    pub const MICROLITER: Unit = Unit::volume(Scale::Micro);
    pub const NANOLITER: Unit = Unit::volume(Scale::Nano);
    pub const PICOLITER: Unit = Unit::volume(Scale::Pico);

    pub const fn concentration(scale: Scale) -> Self {
        Self {
            kind: QuantityKind::Concentration,
            scale,
        }
    }

    pub const fn volume(scale: Scale) -> Self {
        Self {
            kind: QuantityKind::Volume,
            scale,
        }
    }

    /// `mmol/L`, `μL`, ...
    pub fn label(self) -> String {
        let base = match self.kind {
            QuantityKind::Concentration => "mol/L",
            QuantityKind::Volume => "L",
        };
        format!("{}{}", self.scale.prefix(), base)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    /// Accepts `mol/L`, `mol/l` and molar shorthand `M` for concentrations,
    /// `L`/`l` for volumes, each with an optional `m`, `u`/`µ`/`μ`, `n` or
    /// `p` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let unknown = || UnitError::UnknownUnit(text.to_string());

        let (prefix, kind) = if let Some(p) = text
            .strip_suffix("mol/L")
            .or_else(|| text.strip_suffix("mol/l"))
        {
            (p, QuantityKind::Concentration)
        } else if let Some(p) = text.strip_suffix('M') {
            (p, QuantityKind::Concentration)
        } else if let Some(p) = text.strip_suffix(['L', 'l']) {
            (p, QuantityKind::Volume)
        } else {
            return Err(unknown());
        };

        let scale = Scale::from_prefix(prefix).ok_or_else(unknown)?;
        Ok(Unit { kind, scale })
    }
}

impl TryFrom<String> for Unit {
    type Error = UnitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.label()
    }
}

/// A magnitude with its display unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub magnitude: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(magnitude: f64, unit: Unit) -> Self {
        Self { magnitude, unit }
    }

    pub fn kind(&self) -> QuantityKind {
        self.unit.kind
    }

    pub fn to_concentration(&self) -> Result<Concentration, UnitError> {
        self.expect_kind(QuantityKind::Concentration)?;
        Ok(mol_per_l(self.magnitude * self.unit.scale.factor()))
    }

    pub fn to_volume(&self) -> Result<Volume, UnitError> {
        self.expect_kind(QuantityKind::Volume)?;
        Ok(liters(self.magnitude * self.unit.scale.factor()))
    }

    /// Same amount expressed in `unit`.
    pub fn convert(&self, unit: Unit) -> Result<Quantity, UnitError> {
        self.expect_kind(unit.kind)?;
        let base = self.magnitude * self.unit.scale.factor();
        Ok(Quantity::new(base / unit.scale.factor(), unit))
    }

    fn expect_kind(&self, expected: QuantityKind) -> Result<(), UnitError> {
        if self.unit.kind == expected {
            Ok(())
        } else {
            Err(UnitError::WrongKind {
                unit: self.unit.label(),
                expected,
            })
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "{:.*} {}", p, self.magnitude, self.unit),
            None => write!(f, "{} {}", self.magnitude, self.unit),
        }
    }
}

/// Units enabled for parsing and compact display, largest first per kind.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRegistry {
    concentration: Vec<Unit>,
    volume: Vec<Unit>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self {
            concentration: Scale::ALL.map(Unit::concentration).to_vec(),
            volume: Scale::ALL.map(Unit::volume).to_vec(),
        }
    }
}

impl UnitRegistry {
    /// Registry limited to `units`; each kind needs at least one.
    pub fn new(units: impl IntoIterator<Item = Unit>) -> Result<Self, UnitError> {
        let (mut concentration, mut volume): (Vec<Unit>, Vec<Unit>) = units
            .into_iter()
            .partition(|u| u.kind == QuantityKind::Concentration);
        for list in [&mut concentration, &mut volume] {
            list.sort_by_key(|u| u.scale);
            list.dedup();
        }
        if concentration.is_empty() {
            return Err(UnitError::NoUnits(QuantityKind::Concentration));
        }
        if volume.is_empty() {
            return Err(UnitError::NoUnits(QuantityKind::Volume));
        }
        Ok(Self {
            concentration,
            volume,
        })
    }

    pub fn units(&self, kind: QuantityKind) -> &[Unit] {
        match kind {
            QuantityKind::Concentration => &self.concentration,
            QuantityKind::Volume => &self.volume,
        }
    }

    /// Resolve unit text for a slot of the given kind.
    pub fn unit(&self, text: &str, kind: QuantityKind) -> Result<Unit, UnitError> {
        let unit: Unit = text.parse()?;
        if unit.kind != kind {
            return Err(UnitError::WrongKind {
                unit: text.trim().to_string(),
                expected: kind,
            });
        }
        if !self.units(kind).contains(&unit) {
            return Err(UnitError::Disabled(unit.label()));
        }
        Ok(unit)
    }

    /// Parse `"0.5 mM"` or `"250mL"`. The unit is required.
    pub fn parse_quantity(&self, text: &str, kind: QuantityKind) -> Result<Quantity, UnitError> {
        let (magnitude, unit) = split_value_and_unit(text)?;
        if unit.is_empty() {
            return Err(UnitError::ParseError(format!("missing unit in '{}'", text.trim())));
        }
        Ok(Quantity::new(magnitude, self.unit(unit, kind)?))
    }

    pub fn compact_concentration(&self, c: Concentration) -> Quantity {
        compact(in_mol_per_l(c), &self.concentration, QuantityKind::Concentration)
    }

    pub fn compact_volume(&self, v: Volume) -> Quantity {
        compact(in_liters(v), &self.volume, QuantityKind::Volume)
    }
}

/// `units` is sorted largest first.
fn compact(base: f64, units: &[Unit], kind: QuantityKind) -> Quantity {
    let tol = Tolerances::default();
    for unit in units {
        let magnitude = base / unit.scale.factor();
        // 0.999_999_999_999 mL is 1 mL
        if magnitude >= 1.0 || nearly_equal(magnitude, 1.0, tol) {
            return Quantity::new(magnitude, *unit);
        }
    }
    let smallest = units.last().copied().unwrap_or(Unit {
        kind,
        scale: Scale::Pico,
    });
    Quantity::new(base / smallest.scale.factor(), smallest)
}

fn split_value_and_unit(input: &str) -> Result<(f64, &str), UnitError> {
    let trimmed = input.trim();

    let split_idx = trimmed
        .find(|c: char| !c.is_ascii_digit() && !matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        .unwrap_or(trimmed.len());
    let (num_part, unit_part) = trimmed.split_at(split_idx);

    let value: f64 = num_part.trim().parse().map_err(|_| {
        UnitError::ParseError(format!("Could not parse numeric value from '{input}'"))
    })?;
    Ok((value, unit_part.trim()))
}
