// ca-core/src/units.rs

use uom::si::f64::{
    AmountOfSubstance as UomAmountOfSubstance, Mass as UomMass,
    MolarConcentration as UomMolarConcentration, MolarMass as UomMolarMass,
    Volume as UomVolume,
};

// Public canonical unit types (SI, f64)
pub type Amount = UomAmountOfSubstance;
pub type Concentration = UomMolarConcentration;
pub type Mass = UomMass;
pub type MolarMass = UomMolarMass;
pub type Volume = UomVolume;

/// Cubic meters per liter.
pub const M3_PER_L: f64 = 1e-3;

#[inline]
pub fn liters(v: f64) -> Volume {
    use uom::si::volume::cubic_meter;
    Volume::new::<cubic_meter>(v * M3_PER_L)
}

#[inline]
pub fn in_liters(v: Volume) -> f64 {
    use uom::si::volume::cubic_meter;
    v.get::<cubic_meter>() / M3_PER_L
}

#[inline]
pub fn mol_per_l(v: f64) -> Concentration {
    use uom::si::molar_concentration::mole_per_cubic_meter;
    // 1 mol/L == 1000 mol/m^3
    Concentration::new::<mole_per_cubic_meter>(v / M3_PER_L)
}

#[inline]
pub fn in_mol_per_l(c: Concentration) -> f64 {
    use uom::si::molar_concentration::mole_per_cubic_meter;
    c.get::<mole_per_cubic_meter>() * M3_PER_L
}

#[inline]
pub fn moles(v: f64) -> Amount {
    use uom::si::amount_of_substance::mole;
    Amount::new::<mole>(v)
}

#[inline]
pub fn in_moles(n: Amount) -> f64 {
    use uom::si::amount_of_substance::mole;
    n.get::<mole>()
}

#[inline]
pub fn g_per_mol(v: f64) -> MolarMass {
    use uom::si::molar_mass::kilogram_per_mole;
    MolarMass::new::<kilogram_per_mole>(v * 1e-3)
}

#[inline]
pub fn in_grams(m: Mass) -> f64 {
    use uom::si::mass::kilogram;
    m.get::<kilogram>() * 1e3
}

pub mod constants {
    /// Electron molar mass [g/mol], CODATA 2018.
    pub const ELECTRON_MOLAR_MASS_G: f64 = 5.485_799_09e-4;
}
