//! # WebP Budget Converter - Main Entry Point
//!
//! Punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Creazione della configurazione e avvio del batch
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (directory, budget, workers, timeout, etc.)
//! 2. Configura il logging (RUST_LOG, altrimenti INFO o DEBUG con --verbose)
//! 3. Carica l'eventuale file di configurazione e applica gli override CLI
//! 4. Istanzia BatchOptimizer (validazione config e input root)
//! 5. Crea la directory di output e avvia la conversione
//!
//! ## Esempio di utilizzo:
//! ```bash
//! webp-budget ./mockups ./mockups-webp --budget-kb 125 --workers 8 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use webp_budget_converter::{json_output::JsonMessage, BatchOptimizer, Config};

#[derive(Parser)]
#[command(name = "webp-budget")]
#[command(about = "Convert JPG/PNG trees to WebP, keeping every file under a size budget")]
struct Args {
    /// Directory containing the images to convert
    input_dir: PathBuf,

    /// Output root (mirrors the input layout, holds log.txt)
    output_dir: PathBuf,

    /// Per-file size budget in KB [default: 125]
    #[arg(short, long)]
    budget_kb: Option<u64>,

    /// Number of parallel workers [default: available cores]
    #[arg(short, long)]
    workers: Option<usize>,

    /// Per-image timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// JSON configuration file; CLI flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output progress and results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    async fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path).await?,
            None => Config::default(),
        };

        if let Some(kb) = self.budget_kb {
            config.budget_bytes = kb.saturating_mul(1024);
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.timeout.is_some() {
            config.task_timeout_secs = self.timeout;
        }
        config.json_output |= self.json;
        config.output_path = self.output_dir;

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let json = args.json;

    // Logs go to stderr so stdout stays clean for JSON events
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        if json {
            JsonMessage::error(e.to_string(), e.chain().nth(1).map(|cause| cause.to_string())).emit();
        }
        return Err(e);
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let input_dir = args.input_dir.clone();
    let config = args.into_config().await?;

    // Validates config and input root, nothing touches the disk before this
    let optimizer = BatchOptimizer::new(&input_dir, config)?;

    let output_dir = &optimizer.config().output_path;
    if !output_dir.exists() {
        tokio::fs::create_dir_all(output_dir).await?;
        info!("Created output directory: {}", output_dir.display());
    }
    if !output_dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Output path is not a directory: {}",
            output_dir.display()
        ));
    }

    optimizer.run().await?;

    Ok(())
}
