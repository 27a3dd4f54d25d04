//! # Batch Optimizer Orchestrator
//!
//! Orchestratore principale: distribuisce le coppie sorgente/output su un
//! worker pool limitato e raccoglie gli esiti man mano che arrivano.
//!
//! ## Flusso di esecuzione:
//! 1. **Pre-flight**: validazione config e input root (errori fatali)
//! 2. **Discovery**: immagini JPG/PNG sotto la input root (solo `run`)
//! 3. **Dispatch**: un `TranscodeTask` per coppia, tutti spawnati subito;
//!    ognuno attende un permesso del semaforo prima di lavorare
//! 4. **Raccolta**: `FuturesUnordered` restituisce per primo il task che
//!    finisce per primo, niente head-of-line blocking
//! 5. **Aggregazione**: progress + `ResultAggregator`, poi `RunSummary`
//!
//! ## Gestione errori:
//! - Un'immagine che fallisce non blocca mai il batch
//! - Un panic dentro un task diventa un esito `Error` per quella coppia
//! - Solo gli errori di configurazione interrompono il run prima di iniziare

use crate::{
    config::Config,
    diagnostic_log::DiagnosticLog,
    error::ConvertError,
    file_manager::FileManager,
    image_processor::{QualitySearch, TargetEncoder, TranscodeOutcome, WebpEncoder},
    json_output::{JsonConfig, JsonMessage},
    optimizer::{
        path_resolver::{FilePair, PathResolver},
        progress_tracker::ProgressTracker,
        task_optimizer::{TaskReport, TranscodeTask},
    },
    progress::{ResultAggregator, RunSummary},
};
use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Orchestratore principale
pub struct BatchOptimizer<E = WebpEncoder> {
    config: Config,
    input_base_dir: PathBuf,
    engine: Arc<QualitySearch<E>>,
    log: Arc<DiagnosticLog>,
    task: TranscodeTask<E>,
}

impl BatchOptimizer<WebpEncoder> {
    /// Crea nuova istanza con il codec WebP
    pub fn new(input_dir: &Path, config: Config) -> Result<Self, ConvertError> {
        Self::with_encoder(input_dir, config, WebpEncoder::default())
    }
}

impl<E: TargetEncoder + 'static> BatchOptimizer<E> {
    pub fn with_encoder(input_dir: &Path, config: Config, encoder: E) -> Result<Self, ConvertError> {
        config.validate()?;

        if !input_dir.is_dir() {
            return Err(ConvertError::Configuration(format!(
                "Input directory does not exist: {}",
                input_dir.display()
            )));
        }

        let engine = Arc::new(QualitySearch::new(encoder));
        let log = Arc::new(DiagnosticLog::new(&config.output_path, config.budget_bytes));
        let task = TranscodeTask::new(engine.clone(), log.clone(), config.budget_bytes)
            .with_timeout(config.task_timeout());

        Ok(Self {
            config,
            input_base_dir: input_dir.to_path_buf(),
            engine,
            log,
            task,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Esegue la conversione di tutta la input root
    pub async fn run(&self) -> Result<RunSummary> {
        let start_time = Instant::now();

        let files = FileManager::find_images(&self.input_base_dir)?;
        let pairs = PathResolver::resolve_pairs(
            files,
            &self.input_base_dir,
            &self.config.output_path,
            self.engine.extension(),
        )?;

        self.emit_start_message(pairs.len());
        self.log_configuration(pairs.len());

        let summary = if pairs.is_empty() {
            info!("No images found to convert");
            RunSummary::default()
        } else {
            self.run_batch(pairs).await?
        };

        self.print_final_stats(&summary, start_time.elapsed().as_secs_f64());
        Ok(summary)
    }

    /// Converte un insieme di coppie già risolte
    pub async fn run_batch(&self, pairs: Vec<FilePair>) -> Result<RunSummary, ConvertError> {
        self.config.validate()?;

        let mut progress_tracker = ProgressTracker::new(pairs.len(), self.config.json_output);
        let mut aggregator = ResultAggregator::new();
        let pool = Arc::new(Semaphore::new(self.config.workers));

        let mut pending = FuturesUnordered::new();
        for pair in pairs {
            let source = pair.source.clone();
            let handle = tokio::spawn(Self::run_task(self.task.clone(), pool.clone(), pair));
            pending.push(async move { (source, handle.await) });
        }

        // Aspetta i task nell'ordine in cui completano
        while let Some((source, joined)) = pending.next().await {
            let outcome = match joined {
                Ok(report) => report.outcome,
                Err(e) => {
                    error!("Worker fault while converting {}: {}", source.display(), e);
                    TranscodeOutcome::error(format!("worker fault: {e}"))
                }
            };

            aggregator.fold(&source, &outcome);
            progress_tracker.handle_completion(&source, &outcome, aggregator.snapshot());
        }

        let summary = aggregator.finalize();
        progress_tracker.finish(&summary.format_summary());
        Ok(summary)
    }

    async fn run_task(task: TranscodeTask<E>, pool: Arc<Semaphore>, pair: FilePair) -> TaskReport {
        // Il permesso passa al task e segue l'encode fino alla sua fine reale
        match pool.acquire_owned().await {
            Ok(permit) => task.run(pair, permit).await,
            Err(_) => TaskReport {
                source: pair.source,
                outcome: TranscodeOutcome::error("worker pool closed"),
            },
        }
    }

    /// Invia messaggio di inizio
    fn emit_start_message(&self, total_files: usize) {
        if self.config.json_output {
            JsonMessage::start(
                &self.input_base_dir,
                &self.config.output_path,
                total_files,
                JsonConfig::from(&self.config),
            )
            .emit();
        } else {
            info!("Starting WebP conversion in: {}", self.input_base_dir.display());
        }
    }

    /// Logga configurazione (solo se non JSON mode)
    fn log_configuration(&self, total_files: usize) {
        if self.config.json_output {
            return;
        }

        info!(
            "Size budget: {}kb ({} bytes)",
            FileManager::format_budget_kb(self.config.budget_bytes),
            self.config.budget_bytes
        );
        info!("Workers: {}", self.config.workers);
        info!("Output directory: {}", self.config.output_path.display());
        if let Some(limit) = self.config.task_timeout() {
            info!("Per-image timeout: {:?}", limit);
        }
        info!("Found {} images to convert", total_files);
    }

    /// Stampa statistiche finali
    fn print_final_stats(&self, summary: &RunSummary, duration: f64) {
        if self.config.json_output {
            JsonMessage::complete(summary.clone(), duration).emit();
            return;
        }

        info!("=== Conversion Complete ===");
        info!("Files processed: {}", summary.total());
        info!("Within budget: {}", summary.succeeded);
        info!("Oversize: {}", summary.oversized);
        info!("Errors: {}", summary.failed);
        info!("Bytes written: {}", FileManager::format_size(summary.total_output_bytes));
        info!("Duration: {:.2}s", duration);

        if self.log.exists() {
            warn!(
                "Some files could not be compressed to {}kb. See '{}' for details.",
                FileManager::format_budget_kb(self.config.budget_bytes),
                self.log.path().display()
            );
        }
    }
}
