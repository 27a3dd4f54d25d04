//! # Progress Tracking and Run Summary Module
//!
//! Questo modulo gestisce la progress bar e l'aggregazione dei risultati.
//!
//! ## Componenti principali:
//! - `ProgressManager`: progress bar `indicatif` avanzata una volta per file completato
//! - `ResultAggregator`: reducer puramente additivo sugli esiti per file
//! - `RunSummary`: conteggi finali (success/oversize/error) + voci del diagnostic log
//!
//! ## Invarianza all'ordine:
//! Il fold è commutativo: i contatori sono somme e le voci oversize vengono
//! ordinate per path in `finalize()`, quindi il riepilogo non dipende
//! dall'ordine di completamento dei task.
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========================================] 150/150 (100%) [OK] poster.png: quality=80
//! ```
//!
//! ## Esempio:
//! ```rust,ignore
//! let mut aggregator = ResultAggregator::new();
//! aggregator.fold(&source, &outcome);
//! let summary = aggregator.finalize();
//! progress.finish(&summary.format_summary());
//! ```

use crate::diagnostic_log::LogEntry;
use crate::file_manager::FileManager;
use crate::image_processor::TranscodeOutcome;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Manages progress reporting for a batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Progress manager that never draws (JSON mode)
    pub fn hidden(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);
        bar.set_draw_target(ProgressDrawTarget::hidden());
        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Final structured output of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub oversized: usize,
    pub failed: usize,
    /// Bytes written across success and oversize outputs
    pub total_output_bytes: u64,
    /// Sorted by source path
    pub oversize_entries: Vec<LogEntry>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.oversized + self.failed
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Within budget: {} | Oversize: {} | Errors: {} | Written: {}",
            self.total(),
            self.succeeded,
            self.oversized,
            self.failed,
            FileManager::format_size(self.total_output_bytes),
        )
    }
}

/// Thin reducer over per-task outcomes
#[derive(Debug, Default)]
pub struct ResultAggregator {
    summary: RunSummary,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, source: &Path, outcome: &TranscodeOutcome) {
        match outcome {
            TranscodeOutcome::Success(attempt) => {
                self.summary.succeeded += 1;
                self.summary.total_output_bytes += attempt.size_bytes;
            }
            TranscodeOutcome::Oversize(attempt) => {
                self.summary.oversized += 1;
                self.summary.total_output_bytes += attempt.size_bytes;
            }
            TranscodeOutcome::Error { .. } => {
                self.summary.failed += 1;
            }
        }

        if let Some(entry) = LogEntry::from_outcome(source, outcome) {
            self.summary.oversize_entries.push(entry);
        }
    }

    /// Current view, without the final ordering
    pub fn snapshot(&self) -> &RunSummary {
        &self.summary
    }

    pub fn finalize(mut self) -> RunSummary {
        self.summary
            .oversize_entries
            .sort_by(|a, b| a.source_path.cmp(&b.source_path));
        self.summary
    }
}
