use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tributo_core::TaxPolicy;
use tributo_data::{AnexoTableLoader, PolicyOverrides};

/// Validate Simples Anexo tables and policy overrides before using them.
///
/// The CSV file should have the following columns:
/// - anexo: The Anexo (I, II, III, IV, V)
/// - faixa: The bracket number, starting at 1
/// - ceiling: The upper RBT12 limit of the bracket
/// - nominal_rate_pct: The nominal rate as a percentage (e.g., 7.3)
/// - deduction: The parcela a deduzir in reais
#[derive(Parser, Debug)]
#[command(name = "tributo-data-loader")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the CSV file containing Anexo tables
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a TOML file with policy overrides
    #[arg(short, long)]
    policy: Option<PathBuf>,

    /// Print every faixa of every loaded table
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut policy = TaxPolicy::default();

    if let Some(path) = &args.policy {
        println!("Loading policy overrides from: {}", path.display());
        PolicyOverrides::from_path(path)
            .and_then(|overrides| overrides.apply(&mut policy))
            .with_context(|| format!("Invalid policy file: {}", path.display()))?;
        println!("Policy overrides applied.");
    }

    if let Some(path) = &args.file {
        println!("Loading Anexo tables from: {}", path.display());

        let file =
            File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;

        let records = AnexoTableLoader::parse(file)
            .with_context(|| format!("Failed to parse CSV: {}", path.display()))?;

        println!("Parsed {} records from CSV", records.len());

        let tables = AnexoTableLoader::build(&records).context("Anexo tables failed validation")?;
        let replaced = AnexoTableLoader::apply(&mut policy, tables);

        println!("Successfully validated {} Anexo tables.", replaced);
    }

    for table in policy.simples.tables() {
        println!("{}: {} faixas", table.anexo(), table.brackets().len());
        if args.verbose {
            for (idx, bracket) in table.brackets().iter().enumerate() {
                println!(
                    "  faixa {}: até {} | {}% | deduz {}",
                    idx + 1,
                    bracket.ceiling,
                    bracket.nominal_rate_pct,
                    bracket.deduction
                );
            }
        }
    }
    println!(
        "Transition schedule: {}-{}",
        policy.transition.first_year(),
        policy.transition.last_year()
    );

    Ok(())
}
