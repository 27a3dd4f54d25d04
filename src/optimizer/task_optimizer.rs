//! # Task Optimizer Module
//!
//! Worker per la conversione di un singolo file.
//!
//! Legge la sorgente, esegue la ricerca della qualità su un thread bloccante,
//! scrive il blob scelto nel path di output e, per gli esiti `Oversize`,
//! aggiunge una riga al diagnostic log. Ogni errore resta confinato qui e
//! diventa `TranscodeOutcome::Error`.
//!
//! ## Permesso del worker pool
//! Il permesso entra nel thread bloccante insieme all'encode e torna indietro
//! solo quando l'encode è finito. Se scade il timeout il permesso resta
//! occupato finché l'encode abbandonato non termina, così il numero di encode
//! concorrenti non supera mai `workers`. Il timeout copre solo l'encode:
//! scrittura dell'output e riga di log non vengono mai interrotte a metà.

use crate::{
    diagnostic_log::{DiagnosticLog, LogEntry},
    error::ConvertError,
    image_processor::{QualitySearch, TargetEncoder, TranscodeOutcome, WebpEncoder},
    optimizer::path_resolver::{FilePair, PathResolver},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, error, warn};

/// `(path, outcome)` returned by a finished task
#[derive(Debug)]
pub struct TaskReport {
    pub source: PathBuf,
    pub outcome: TranscodeOutcome,
}

/// Worker per elaborazione singoli file
pub struct TranscodeTask<E = WebpEncoder> {
    engine: Arc<QualitySearch<E>>,
    log: Arc<DiagnosticLog>,
    budget_bytes: u64,
    timeout: Option<Duration>,
}

impl<E> Clone for TranscodeTask<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            log: self.log.clone(),
            budget_bytes: self.budget_bytes,
            timeout: self.timeout,
        }
    }
}

impl<E: TargetEncoder + 'static> TranscodeTask<E> {
    pub fn new(engine: Arc<QualitySearch<E>>, log: Arc<DiagnosticLog>, budget_bytes: u64) -> Self {
        Self {
            engine,
            log,
            budget_bytes,
            timeout: None,
        }
    }

    /// Limit on the quality search of each image
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Processa un singolo file, tenendo `permit` per tutta la durata del lavoro
    pub async fn run(&self, pair: FilePair, permit: OwnedSemaphorePermit) -> TaskReport {
        let outcome = self
            .process(&pair, permit)
            .await
            .unwrap_or_else(TranscodeOutcome::from);

        if let TranscodeOutcome::Error { message } = &outcome {
            error!("Failed to convert {}: {}", pair.source.display(), message);
        }

        TaskReport {
            source: pair.source,
            outcome,
        }
    }

    async fn process(
        &self,
        pair: &FilePair,
        permit: OwnedSemaphorePermit,
    ) -> Result<TranscodeOutcome, ConvertError> {
        let source_bytes = tokio::fs::read(&pair.source)
            .await
            .map_err(|e| ConvertError::io(&pair.source, e))?;

        let (outcome, _permit) = self.search_blocking(source_bytes, permit).await?;
        let Some(attempt) = outcome.attempt() else {
            return Ok(outcome);
        };

        PathResolver::ensure_parent_dirs(&pair.output).await?;
        tokio::fs::write(&pair.output, &attempt.blob)
            .await
            .map_err(|e| ConvertError::io(&pair.output, e))?;

        match &outcome {
            TranscodeOutcome::Oversize(attempt) => {
                warn!(
                    "{} stays over budget: {} bytes at {}",
                    pair.source.display(),
                    attempt.size_bytes,
                    attempt.mode
                );
                let entry = LogEntry::new(&pair.source, attempt);
                if let Err(e) = self.log.record(&entry).await {
                    error!("Failed to write diagnostic log entry: {}", e);
                }
            }
            _ => {
                debug!(
                    "[OK] {} -> {} ({} bytes, {})",
                    pair.source.display(),
                    pair.output.display(),
                    attempt.size_bytes,
                    attempt.mode
                );
            }
        }

        Ok(outcome)
    }

    /// Encoding is CPU-bound, keep it off the async workers.
    /// The permit comes back only when the encode has really finished.
    async fn search_blocking(
        &self,
        source_bytes: Vec<u8>,
        permit: OwnedSemaphorePermit,
    ) -> Result<(TranscodeOutcome, OwnedSemaphorePermit), ConvertError> {
        let engine = self.engine.clone();
        let budget_bytes = self.budget_bytes;

        let handle = tokio::task::spawn_blocking(move || {
            let outcome = engine.search(&source_bytes, budget_bytes);
            (outcome, permit)
        });

        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, handle)
                .await
                .map_err(|_| ConvertError::Timeout)?,
            None => handle.await,
        };

        joined.map_err(|e| ConvertError::WorkerFault(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic_log::LOG_FILE_NAME;
    use crate::image_processor::{fixtures::*, EncodeMode, OutcomeKind};
    use image::DynamicImage;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    const KB: usize = 1024;

    /// Lossless 300 KB, quality 70 fits at 118 KB, everything else 500 KB
    struct LadderEncoder;

    impl TargetEncoder for LadderEncoder {
        fn extension(&self) -> &'static str {
            "webp"
        }

        fn encode(&self, _image: &DynamicImage, mode: EncodeMode) -> Result<Vec<u8>, ConvertError> {
            let size = match mode {
                EncodeMode::Lossless => 300 * KB,
                EncodeMode::Lossy(70) => 118 * KB,
                EncodeMode::Lossy(_) => 500 * KB,
            };
            Ok(vec![7; size])
        }
    }

    /// Sleeps on every attempt, then returns a blob that always fits
    struct SlowEncoder(Duration);

    impl TargetEncoder for SlowEncoder {
        fn extension(&self) -> &'static str {
            "webp"
        }

        fn encode(&self, _image: &DynamicImage, _mode: EncodeMode) -> Result<Vec<u8>, ConvertError> {
            std::thread::sleep(self.0);
            Ok(vec![0; 8])
        }
    }

    struct PanickingEncoder;

    impl TargetEncoder for PanickingEncoder {
        fn extension(&self) -> &'static str {
            "webp"
        }

        fn encode(&self, _image: &DynamicImage, _mode: EncodeMode) -> Result<Vec<u8>, ConvertError> {
            panic!("codec blew up");
        }
    }

    fn webp_task(output_root: &Path, budget_bytes: u64) -> TranscodeTask {
        TranscodeTask::new(
            Arc::new(QualitySearch::new(WebpEncoder::default())),
            Arc::new(DiagnosticLog::new(output_root, budget_bytes)),
            budget_bytes,
        )
    }

    async fn permit() -> OwnedSemaphorePermit {
        Arc::new(Semaphore::new(1)).acquire_owned().await.unwrap()
    }

    fn write_source(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_success_writes_blob_without_logging() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let source = write_source(input.path(), "flat.png", &flat_png(32, 32));
        let target = output.path().join("nested/flat.webp");

        let report = webp_task(output.path(), 128_000)
            .run(FilePair::new(&source, &target), permit().await)
            .await;

        assert_eq!(report.source, source);
        assert_eq!(report.outcome.kind(), OutcomeKind::Success);
        let written = std::fs::read(&target).unwrap();
        assert_eq!(written, report.outcome.attempt().unwrap().blob);
        assert!(!output.path().join(LOG_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_oversize_writes_blob_and_one_log_line() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let source = write_source(input.path(), "noise.png", &noise_png(48, 48, 3));
        let target = output.path().join("noise.webp");

        let report = webp_task(output.path(), 1)
            .run(FilePair::new(&source, &target), permit().await)
            .await;

        assert_eq!(report.outcome.kind(), OutcomeKind::Oversize);
        let size = std::fs::metadata(&target).unwrap().len();
        assert_eq!(Some(size), report.outcome.size_bytes());

        let log = std::fs::read_to_string(output.path().join(LOG_FILE_NAME)).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains(&format!("File '{}'", source.display())));
    }

    #[tokio::test]
    async fn test_corrupt_source_is_error_without_side_effects() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let source = write_source(input.path(), "broken.png", b"\x89PNG but not really");
        let target = output.path().join("broken.webp");

        let report = webp_task(output.path(), 128_000)
            .run(FilePair::new(&source, &target), permit().await)
            .await;

        assert_eq!(report.outcome.kind(), OutcomeKind::Error);
        assert!(!target.exists());
        assert!(!output.path().join(LOG_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_missing_source_is_io_error() {
        let output = TempDir::new().unwrap();
        let source = output.path().join("ghost.png");

        let report = webp_task(output.path(), 128_000)
            .run(FilePair::new(&source, output.path().join("ghost.webp")), permit().await)
            .await;

        match report.outcome {
            TranscodeOutcome::Error { message } => assert!(message.contains("ghost.png")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unwritable_output_is_error() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let source = write_source(input.path(), "flat.png", &flat_png(8, 8));
        // A regular file where a directory is needed
        let blocker = write_source(output.path(), "blocker", b"");

        let report = webp_task(output.path(), 128_000)
            .run(FilePair::new(&source, blocker.join("flat.webp")), permit().await)
            .await;

        assert_eq!(report.outcome.kind(), OutcomeKind::Error);
    }

    #[tokio::test]
    async fn test_encoder_panic_becomes_worker_fault() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let source = write_source(input.path(), "flat.png", &flat_png(8, 8));
        let target = output.path().join("flat.webp");

        let task = TranscodeTask::new(
            Arc::new(QualitySearch::new(PanickingEncoder)),
            Arc::new(DiagnosticLog::new(output.path(), 128_000)),
            128_000,
        );
        let report = task.run(FilePair::new(&source, &target), permit().await).await;

        match report.outcome {
            TranscodeOutcome::Error { message } => assert!(message.starts_with("Worker fault")),
            other => panic!("expected worker fault, got {other:?}"),
        }
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_lossy_success_writes_blob_without_logging() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let source = write_source(input.path(), "poster.png", &flat_png(8, 8));
        let target = output.path().join("poster.webp");

        let task = TranscodeTask::new(
            Arc::new(QualitySearch::new(LadderEncoder)),
            Arc::new(DiagnosticLog::new(output.path(), 125 * KB as u64)),
            125 * KB as u64,
        );
        let report = task.run(FilePair::new(&source, &target), permit().await).await;

        assert_eq!(report.outcome.kind(), OutcomeKind::Success);
        assert_eq!(report.outcome.descriptor().as_deref(), Some("quality=70"));
        assert_eq!(std::fs::metadata(&target).unwrap().len(), 118 * KB as u64);
        assert!(!output.path().join(LOG_FILE_NAME).exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_encode_keeps_its_permit_until_done() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let source = write_source(input.path(), "flat.png", &flat_png(8, 8));
        let target = output.path().join("flat.webp");
        let pool = Arc::new(Semaphore::new(1));

        let task = TranscodeTask::new(
            Arc::new(QualitySearch::new(SlowEncoder(Duration::from_millis(1500)))),
            Arc::new(DiagnosticLog::new(output.path(), 128_000)),
            128_000,
        )
        .with_timeout(Some(Duration::from_millis(200)));

        let permit = pool.clone().acquire_owned().await.unwrap();
        let report = task.run(FilePair::new(&source, &target), permit).await;

        assert_eq!(report.outcome, TranscodeOutcome::error("timeout"));
        // The abandoned encode is still running and still owns the slot
        assert_eq!(pool.available_permits(), 0);
        let _released = tokio::time::timeout(Duration::from_secs(5), pool.acquire())
            .await
            .unwrap()
            .unwrap();
        // Nothing is written for a timed out image
        assert!(!target.exists());
    }
}
