//! Application configuration, read from YAML.
//!
//! ```yaml
//! separators: '[\s,;]+'
//! history_capacity: 20
//! history_file: history.json
//! units:
//!   concentration: mol/L
//!   volume: mL
//!   enabled: [mol/L, mmol/L, μmol/L, L, mL, μL]
//! ```
//!
//! Every field is optional; missing ones take their defaults.

use std::path::{Path, PathBuf};

use ca_chem::{DEFAULT_SEPARATORS, Normalizer};
use ca_solution::{DilutionSolver, QuantityKind, Unit, UnitRegistry};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::history::DEFAULT_CAPACITY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Regular expression splitting species lists.
    pub separators: String,
    /// Entries kept per session.
    pub history_capacity: usize,
    /// JSON file backing the history; front ends choose a default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_file: Option<PathBuf>,
    pub units: UnitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            separators: DEFAULT_SEPARATORS.to_string(),
            history_capacity: DEFAULT_CAPACITY,
            history_file: None,
            units: UnitConfig::default(),
        }
    }
}

/// Default units for values entered without one, and the enabled set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    pub concentration: String,
    pub volume: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<Vec<String>>,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            concentration: Unit::MOL_PER_L.label(),
            volume: Unit::MILLILITER.label(),
            enabled: None,
        }
    }
}

impl AppConfig {
    /// Check everything a later calculation would trip over.
    pub fn validate(&self) -> AppResult<()> {
        if self.history_capacity == 0 {
            return Err(AppError::Config(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        self.normalizer()?;
        self.default_unit(QuantityKind::Concentration)?;
        self.default_unit(QuantityKind::Volume)?;
        Ok(())
    }

    pub fn normalizer(&self) -> AppResult<Normalizer> {
        Ok(Normalizer::new(&self.separators)?)
    }

    pub fn unit_registry(&self) -> AppResult<UnitRegistry> {
        let Some(enabled) = &self.units.enabled else {
            return Ok(UnitRegistry::default());
        };
        let units = enabled
            .iter()
            .map(|text| text.parse::<Unit>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(UnitRegistry::new(units)?)
    }

    /// Configured default unit for `kind`, checked against the registry.
    pub fn default_unit(&self, kind: QuantityKind) -> AppResult<Unit> {
        let text = match kind {
            QuantityKind::Concentration => &self.units.concentration,
            QuantityKind::Volume => &self.units.volume,
        };
        Ok(self.unit_registry()?.unit(text, kind)?)
    }

    pub fn dilution_solver(&self) -> AppResult<DilutionSolver> {
        Ok(DilutionSolver::new(self.unit_registry()?).with_normalizer(self.normalizer()?))
    }
}

/// Load config from a YAML file.
pub fn load_config(path: &Path) -> AppResult<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: AppConfig = serde_yaml::from_str(&content)
        .map_err(|e| AppError::Config(format!("Failed to parse config YAML: {}", e)))?;
    config.validate()?;

    Ok(config)
}

/// Save config to a YAML file.
pub fn save_config(path: &Path, config: &AppConfig) -> AppResult<()> {
    let content = serde_yaml::to_string(config)
        .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(path, content).map_err(|e| AppError::ConfigFileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.history_capacity, 20);
        assert_eq!(
            config.default_unit(QuantityKind::Volume).unwrap(),
            Unit::MILLILITER
        );
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: AppConfig = serde_yaml::from_str("history_capacity: 5\n").unwrap();
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.separators, DEFAULT_SEPARATORS);
        assert_eq!(config.units.concentration, "mol/L");
    }

    #[test]
    fn rejects_bad_settings() {
        let config = AppConfig {
            history_capacity: 0,
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let config = AppConfig {
            separators: "(".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Chem(_))));

        let mut config = AppConfig::default();
        config.units.volume = "mol/L".to_string();
        assert!(matches!(config.validate(), Err(AppError::Solution(_))));
    }

    #[test]
    fn enabled_units_restrict_registry() {
        let mut config = AppConfig::default();
        config.units.enabled = Some(vec!["M".into(), "mM".into(), "L".into(), "mL".into()]);
        let registry = config.unit_registry().unwrap();
        assert_eq!(registry.units(QuantityKind::Volume).len(), 2);
        assert!(registry.unit("nL", QuantityKind::Volume).is_err());

        config.units.volume = "uL".to_string();
        assert!(config.validate().is_err());
    }
}
