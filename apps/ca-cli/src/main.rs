use std::path::{Path, PathBuf};

use ca_app::{
    AppConfig, AppResult, Calculation, CalculationInput, CalculationOutput, HistoryStore,
    load_config,
};
use ca_solution::{DilutionState, Quantity, Slot};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

const DEFAULT_HISTORY_FILE: &str = ".chemically/history.json";

#[derive(Parser)]
#[command(name = "chemically")]
#[command(about = "ChemicAlly CLI - molecular weights, reaction balancing and dilutions", long_about = None)]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Session whose substance history is used
    #[arg(long, global = true, default_value = "default")]
    session: String,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve formulas and SMILES to canonical formulas
    Normalize {
        /// Species separated by spaces, commas, semicolons or plus signs
        text: String,
    },
    /// Molecular weight of one or more species
    Mw {
        text: String,
    },
    /// Balance a reaction
    Balance {
        /// Reactants, or the whole equation (`H2 + O2 = H2O`)
        reactants: String,
        products: Option<String>,
        /// Render with a one-way arrow
        #[arg(long)]
        irreversible: bool,
    },
    /// Solve c1·v1 = c2·v2 for the value left out
    Dilution(DilutionArgs),
    /// Show previously viewed substances
    History {
        /// Forget this session's history
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Args)]
struct DilutionArgs {
    /// Initial concentration
    #[arg(long)]
    c1: Option<f64>,
    #[arg(long)]
    c1_unit: Option<String>,
    /// Initial volume
    #[arg(long)]
    v1: Option<f64>,
    #[arg(long)]
    v1_unit: Option<String>,
    /// Final concentration
    #[arg(long)]
    c2: Option<f64>,
    #[arg(long)]
    c2_unit: Option<String>,
    /// Final volume
    #[arg(long)]
    v2: Option<f64>,
    #[arg(long)]
    v2_unit: Option<String>,
    /// Solute molecular weight [g/mol]
    #[arg(long)]
    mw: Option<f64>,
    /// Solute formula or SMILES, used for the mass when --mw is absent
    #[arg(long)]
    solute: Option<String>,
}

fn main() -> AppResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    let calc = Calculation::from_config(&config)?;
    let history_path = config
        .history_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE));
    debug!(path = %history_path.display(), session = %cli.session, "history");

    match cli.command {
        Commands::Normalize { text } => cmd_normalize(&calc, &text, cli.json),
        Commands::Mw { text } => {
            let input = CalculationInput::MolecularWeight { species: text };
            run(&calc, &input, &config, &history_path, &cli.session, cli.json)
        }
        Commands::Balance {
            reactants,
            products,
            irreversible,
        } => {
            let input = CalculationInput::ReactionBalance {
                reactants,
                products: products.unwrap_or_default(),
                reversible: !irreversible,
            };
            run(&calc, &input, &config, &history_path, &cli.session, cli.json)
        }
        Commands::Dilution(args) => {
            let input = dilution_input(&config, args)?;
            run(&calc, &input, &config, &history_path, &cli.session, cli.json)
        }
        Commands::History { clear } => {
            cmd_history(&config, &history_path, &cli.session, clear, cli.json)
        }
    }
}

fn cmd_normalize(calc: &Calculation, text: &str, json: bool) -> AppResult<()> {
    let tokens = calc.normalizer().normalize_tokens(text)?;
    if json {
        return print_json(&tokens);
    }
    for token in tokens {
        if token.raw == token.resolved {
            println!("{}", token.resolved);
        } else {
            println!("{} -> {}", token.raw, token.resolved);
        }
    }
    Ok(())
}

fn run(
    calc: &Calculation,
    input: &CalculationInput,
    config: &AppConfig,
    history_path: &Path,
    session: &str,
    json: bool,
) -> AppResult<()> {
    let output = calc.calculate(input)?;

    let mut history = HistoryStore::load(history_path, config.history_capacity)?;
    if history.record(session, output.species()) > 0 {
        history.save(history_path)?;
    }

    if json {
        return print_json(&output);
    }
    match output {
        CalculationOutput::MolecularWeight { weights } => {
            for w in weights {
                println!("{}: {:.3} g/mol", w.formula, w.molar_mass);
            }
        }
        CalculationOutput::ReactionBalance { reaction, latex } => {
            println!("{reaction}");
            println!("{latex}");
        }
        CalculationOutput::Dilution { result, solute } => {
            println!("{} = {:.4}", result.missing, result.value);
            if let Some(mass) = result.mass_g {
                let name = solute.as_deref().unwrap_or("solute");
                println!("{name}: {mass:.4} g");
            }
        }
    }
    Ok(())
}

fn dilution_input(config: &AppConfig, args: DilutionArgs) -> AppResult<CalculationInput> {
    let registry = config.unit_registry()?;
    let quantity =
        |slot: Slot, value: Option<f64>, unit: Option<&str>| -> AppResult<Option<Quantity>> {
            let Some(value) = value else {
                return Ok(None);
            };
            let unit = match unit {
                Some(text) => registry.unit(text, slot.kind())?,
                None => config.default_unit(slot.kind())?,
            };
            Ok(Some(Quantity::new(value, unit)))
        };

    let state = DilutionState {
        c1: quantity(Slot::C1, args.c1, args.c1_unit.as_deref())?,
        v1: quantity(Slot::V1, args.v1, args.v1_unit.as_deref())?,
        c2: quantity(Slot::C2, args.c2, args.c2_unit.as_deref())?,
        v2: quantity(Slot::V2, args.v2, args.v2_unit.as_deref())?,
    };

    Ok(CalculationInput::Dilution {
        state,
        molecular_weight: args.mw,
        solute: args.solute,
    })
}

fn cmd_history(
    config: &AppConfig,
    history_path: &Path,
    session: &str,
    clear: bool,
    json: bool,
) -> AppResult<()> {
    let mut history = HistoryStore::load(history_path, config.history_capacity)?;

    if clear {
        if history.clear_session(session) {
            history.save(history_path)?;
        }
        println!("✓ Cleared history for session '{session}'");
        return Ok(());
    }

    let entries = history.entries(session);
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No substances viewed in session '{session}'");
    } else {
        println!("Previously viewed substances:");
        for entry in entries {
            println!("  {entry}");
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
