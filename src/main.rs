// Portfolio Import - CLI
// import: workbook file → JSON ImportResult
// seed-taxonomy: JSON taxonomy → SQLite snapshot

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use portfolio_import::taxonomy::open_taxonomy;
use portfolio_import::{
    load_workbook, ImportConfig, PortfolioImporter, ProductType, SqliteTaxonomy, TaxonomyRegistry,
};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "portfolio-import")]
#[command(about = "Normalize clearing-house portfolio spreadsheets against a product taxonomy")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a workbook (.xlsx/.xls/.ods/.csv/.json) and print the result as JSON
    Import {
        workbook: PathBuf,

        /// Taxonomy snapshot (.json registry or .db SQLite)
        #[arg(short, long, env = "PORTFOLIO_IMPORT_TAXONOMY")]
        taxonomy: PathBuf,

        /// Import configuration (JSON); built-in keyword tables when omitted
        #[arg(short, long, env = "PORTFOLIO_IMPORT_CONFIG")]
        config: Option<PathBuf>,

        /// current | recommended
        #[arg(long = "type", default_value = "current")]
        product_type: ProductType,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create or refresh a SQLite taxonomy snapshot from a JSON entry list
    SeedTaxonomy { json: PathBuf, db: PathBuf },
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_import=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Import {
            workbook,
            taxonomy,
            config,
            product_type,
            output,
        } => run_import(workbook, taxonomy, config, product_type, output),
        Command::SeedTaxonomy { json, db } => run_seed(json, db),
    }
}

fn run_import(
    workbook_path: PathBuf,
    taxonomy_path: PathBuf,
    config_path: Option<PathBuf>,
    product_type: ProductType,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = match &config_path {
        Some(path) => ImportConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ImportConfig::default(),
    };

    let taxonomy = open_taxonomy(&taxonomy_path)
        .with_context(|| format!("Failed to open taxonomy {}", taxonomy_path.display()))?;

    let workbook = load_workbook(&workbook_path)
        .with_context(|| format!("Failed to read workbook {}", workbook_path.display()))?;
    info!(
        "📂 Loaded {} ({} sheets)",
        workbook_path.display(),
        workbook.sheets.len()
    );

    let importer = PortfolioImporter::with_config(taxonomy, config);
    let result = importer.import(&workbook, product_type)?;

    let json = serde_json::to_string_pretty(&result).context("Failed to serialize import result")?;
    match output {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("💾 Result written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn run_seed(json_path: PathBuf, db_path: PathBuf) -> Result<()> {
    let registry = TaxonomyRegistry::from_file(&json_path)
        .with_context(|| format!("Failed to load taxonomy {}", json_path.display()))?;

    let snapshot = SqliteTaxonomy::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let written = snapshot.insert_entries(registry.entries())?;

    info!(
        "✅ Seeded {} entries ({} total in {})",
        written,
        snapshot.count()?,
        db_path.display()
    );
    Ok(())
}
