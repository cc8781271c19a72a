//! Smoke test for the ca-app service layer: config, calculations, history.

use std::path::PathBuf;

use ca_app::{
    AppConfig, AppError, Calculation, CalculationInput, CalculationOutput, HistoryStore,
    load_config, save_config,
};
use ca_solution::{DilutionState, Quantity, Slot, Unit};

fn temp_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("ca-app-{}-{}", std::process::id(), name));
    path
}

#[test]
fn config_round_trip_through_yaml() {
    let path = temp_path("config.yaml");
    let config = AppConfig {
        separators: r"[\s|]+".to_string(),
        history_capacity: 3,
        ..AppConfig::default()
    };
    save_config(&path, &config).unwrap();
    let loaded = load_config(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, config);
    let calc = Calculation::from_config(&loaded).unwrap();
    assert_eq!(calc.normalizer().split("H2O|CO2"), ["H2O", "CO2"]);
}

#[test]
fn missing_config_file_is_an_error() {
    let err = load_config(&temp_path("does-not-exist.yaml")).unwrap_err();
    assert!(matches!(err, AppError::ConfigFileRead { .. }));
}

#[test]
fn invalid_config_is_rejected_on_load() {
    let path = temp_path("bad-config.yaml");
    std::fs::write(&path, "history_capacity: 0\n").unwrap();
    let err = load_config(&path).unwrap_err();
    std::fs::remove_file(&path).ok();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn calculations_feed_history() {
    let calc = Calculation::default();
    let mut history = HistoryStore::new(4);

    let inputs = [
        CalculationInput::MolecularWeight {
            species: "H2O, CCO".into(),
        },
        CalculationInput::ReactionBalance {
            reactants: "H2 O2".into(),
            products: "H2O".into(),
            reversible: true,
        },
        CalculationInput::Dilution {
            state: DilutionState::default()
                .with(Slot::C1, Quantity::new(1.0, Unit::MOL_PER_L))
                .with(Slot::C2, Quantity::new(0.1, Unit::MOL_PER_L))
                .with(Slot::V2, Quantity::new(100.0, Unit::MILLILITER)),
            molecular_weight: None,
            solute: Some("NaOH".into()),
        },
    ];

    for input in &inputs {
        let output = calc.calculate(input).unwrap();
        history.record("s1", output.species());
    }

    // H2O is recorded once, then evicted by NaOH at capacity 4
    assert_eq!(history.entries("s1"), ["C2H6O", "H2", "O2", "NaOH"]);
}

#[test]
fn history_persists_between_runs() {
    let path = temp_path("history.json");
    std::fs::remove_file(&path).ok();

    let mut store = HistoryStore::load(&path, 20).unwrap();
    assert!(store.entries("s1").is_empty());
    store.record("s1", ["NaCl", "KCl"]);
    store.record("s2", ["H2SO4"]);
    store.save(&path).unwrap();

    let reloaded = HistoryStore::load(&path, 1).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(reloaded.entries("s1"), ["KCl"]);
    assert_eq!(reloaded.entries("s2"), ["H2SO4"]);
}

#[test]
fn corrupt_history_file_is_reported() {
    let path = temp_path("corrupt-history.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = HistoryStore::load(&path, 20).unwrap_err();
    std::fs::remove_file(&path).ok();
    assert!(matches!(err, AppError::Json(_)));
}

#[test]
fn balance_output_serializes() {
    let out = Calculation::default()
        .calculate(&CalculationInput::ReactionBalance {
            reactants: "CH4 O2".into(),
            products: "CO2 H2O".into(),
            reversible: false,
        })
        .unwrap();
    assert!(matches!(out, CalculationOutput::ReactionBalance { .. }));
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["kind"], "reaction_balance");
    assert_eq!(json["latex"], "$$ \\ce{CH4 + 2O2 \\rightarrow CO2 + 2H2O} $$");
}
