//! # Diagnostic Log Module
//!
//! Sink append-only per i risultati oltre budget (`Oversize`).
//!
//! Ogni `record` apre `log.txt` nella output root in append, scrive una riga
//! completa, fa flush e chiude, tutto dentro un'unica sezione mutuamente
//! esclusiva: le righe scritte da task concorrenti non si mescolano mai e il
//! file è leggibile dopo ogni chiamata completata. Il file viene creato alla
//! prima scrittura; contenuto preesistente viene mantenuto.
//!
//! ## Formato riga:
//! ```text
//! File '<source>' could not be compressed to 125kb. Saved with size: 140.0kb at quality: 40.
//! ```

use crate::error::ConvertError;
use crate::file_manager::FileManager;
use crate::image_processor::{EncodeMode, EncodingAttempt, TranscodeOutcome};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Name of the diagnostic artifact inside the output root
pub const LOG_FILE_NAME: &str = "log.txt";

/// One oversize occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub source_path: PathBuf,
    pub final_size_bytes: u64,
    pub quality_descriptor: EncodeMode,
}

impl LogEntry {
    pub fn new(source_path: &Path, attempt: &EncodingAttempt) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            final_size_bytes: attempt.size_bytes,
            quality_descriptor: attempt.mode,
        }
    }

    /// Entry for an `Oversize` outcome, None for anything else
    pub fn from_outcome(source_path: &Path, outcome: &TranscodeOutcome) -> Option<Self> {
        match outcome {
            TranscodeOutcome::Oversize(attempt) => Some(Self::new(source_path, attempt)),
            _ => None,
        }
    }

    /// Value printed after `at quality:`
    fn quality_label(&self) -> String {
        match self.quality_descriptor {
            EncodeMode::Lossless => "lossless".to_string(),
            EncodeMode::Lossy(quality) => quality.to_string(),
        }
    }

    pub fn render(&self, budget_bytes: u64) -> String {
        format!(
            "File '{}' could not be compressed to {}kb. Saved with size: {}kb at quality: {}.",
            self.source_path.display(),
            FileManager::format_budget_kb(budget_bytes),
            FileManager::format_kb(self.final_size_bytes),
            self.quality_label(),
        )
    }
}

/// Concurrency-safe writer for `log.txt`
#[derive(Debug)]
pub struct DiagnosticLog {
    path: PathBuf,
    budget_bytes: u64,
    lock: Mutex<()>,
}

impl DiagnosticLog {
    pub fn new(output_root: &Path, budget_bytes: u64) -> Self {
        Self {
            path: output_root.join(LOG_FILE_NAME),
            budget_bytes,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append one line; returns once the line is flushed and the file closed
    pub async fn record(&self, entry: &LogEntry) -> Result<(), ConvertError> {
        let mut line = entry.render(self.budget_bytes);
        line.push('\n');

        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConvertError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ConvertError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ConvertError::io(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| ConvertError::io(&self.path, e))?;

        debug!("Recorded oversize entry for {}", entry.source_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processor::EncodingAttempt;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(path: &str, size: u64, quality: u8) -> LogEntry {
        LogEntry {
            source_path: PathBuf::from(path),
            final_size_bytes: size,
            quality_descriptor: EncodeMode::Lossy(quality),
        }
    }

    #[test]
    fn test_render_line_format() {
        let line = entry("in/poster.png", 146_801, 20).render(128_000);
        assert_eq!(
            line,
            "File 'in/poster.png' could not be compressed to 125kb. Saved with size: 143.36kb at quality: 20."
        );
    }

    #[test]
    fn test_render_lossless_entry() {
        let entry = LogEntry {
            source_path: PathBuf::from("a.png"),
            final_size_bytes: 143_360,
            quality_descriptor: EncodeMode::Lossless,
        };
        assert!(entry
            .render(128_000)
            .ends_with("Saved with size: 140.0kb at quality: lossless."));
    }

    #[test]
    fn test_entry_only_from_oversize() {
        let attempt = EncodingAttempt::new(EncodeMode::Lossy(40), vec![0; 10]);
        let path = Path::new("x.png");

        let oversize = TranscodeOutcome::Oversize(attempt.clone());
        let logged = LogEntry::from_outcome(path, &oversize).unwrap();
        assert_eq!(logged.final_size_bytes, 10);
        assert_eq!(logged.quality_descriptor, EncodeMode::Lossy(40));

        assert!(LogEntry::from_outcome(path, &TranscodeOutcome::Success(attempt)).is_none());
        assert!(LogEntry::from_outcome(path, &TranscodeOutcome::error("bad")).is_none());
    }

    #[tokio::test]
    async fn test_log_created_lazily_and_appends() {
        let temp_dir = TempDir::new().unwrap();
        let log = DiagnosticLog::new(temp_dir.path(), 128_000);
        assert!(!log.exists());

        std::fs::write(log.path(), "previous run\n").unwrap();
        log.record(&entry("a.png", 200_000, 30)).await.unwrap();
        log.record(&entry("b.png", 150_000, 95)).await.unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "previous run");
        assert!(lines[1].starts_with("File 'a.png'"));
        assert!(lines[2].starts_with("File 'b.png'"));
    }

    #[tokio::test]
    async fn test_log_created_in_missing_output_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("not/yet/there");
        let log = DiagnosticLog::new(&root, 128_000);

        log.record(&entry("a.png", 200_000, 30)).await.unwrap();
        assert!(root.join(LOG_FILE_NAME).exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_never_interleave() {
        let temp_dir = TempDir::new().unwrap();
        let log = Arc::new(DiagnosticLog::new(temp_dir.path(), 128_000));

        let mut handles = Vec::new();
        for i in 0..64u64 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                let path = format!("mockups/{}/image-{i}.png", "x".repeat(200));
                log.record(&entry(&path, 130_000 + i, 30)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 64);
        for line in lines {
            assert!(line.starts_with("File 'mockups/"));
            assert!(line.ends_with("at quality: 30."));
        }
    }
}
