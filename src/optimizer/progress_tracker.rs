//! # Progress Tracking Module
//!
//! Reporter di progresso alimentato dal dispatcher, un evento per ogni task
//! completato, in ordine di arrivo. Gestisce sia output JSON che progress bar
//! tradizionale. Conta soltanto: non fa assunzioni sull'ordine.

use crate::{
    image_processor::TranscodeOutcome,
    json_output::JsonMessage,
    progress::{ProgressManager, RunSummary},
};
use std::path::Path;

/// Tracker progress unificato
pub struct ProgressTracker {
    pub total_files: usize,
    completed: usize,
    json_output: bool,
    progress_manager: ProgressManager,
}

impl ProgressTracker {
    /// Crea un nuovo tracker
    pub fn new(total_files: usize, json_output: bool) -> Self {
        let progress_manager = if json_output {
            ProgressManager::hidden(total_files as u64)
        } else {
            ProgressManager::new(total_files as u64)
        };

        Self {
            total_files,
            completed: 0,
            json_output,
            progress_manager,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Gestisce completamento file; `summary` è lo stato dopo il fold di questo esito
    pub fn handle_completion(&mut self, file_path: &Path, outcome: &TranscodeOutcome, summary: &RunSummary) {
        self.completed += 1;

        if self.json_output {
            JsonMessage::file_complete(file_path, outcome).emit();
            JsonMessage::progress(self.completed, self.total_files, summary).emit();
        }

        let name = file_path.file_name().unwrap_or_default().to_string_lossy();
        let message = match outcome {
            TranscodeOutcome::Success(attempt) => format!("[OK] {}: {}", name, attempt.mode),
            TranscodeOutcome::Oversize(attempt) => format!("[OVERSIZE] {}: {}", name, attempt.mode),
            TranscodeOutcome::Error { .. } => format!("[ERROR] {}: error", name),
        };
        self.progress_manager.update(&message);
    }

    /// Finalizza progress bar
    pub fn finish(&self, summary: &str) {
        self.progress_manager.finish(summary);
    }
}
