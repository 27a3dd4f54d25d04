//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per chi pilota il
//! converter da un altro processo.
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del batch
//! - `file_complete`: Fine elaborazione di un file (success/oversize/error)
//! - `progress`: Progresso corrente
//! - `complete`: Fine batch con il `RunSummary`
//! - `error`: Errore fatale prima dell'avvio

use crate::config::Config;
use crate::image_processor::{OutcomeKind, TranscodeOutcome};
use crate::progress::RunSummary;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio del batch
    Start {
        input_dir: PathBuf,
        output_dir: PathBuf,
        total_files: usize,
        config: JsonConfig,
    },

    /// Fine elaborazione di un file specifico
    FileComplete {
        path: PathBuf,
        status: OutcomeKind,
        size_bytes: Option<u64>,
        descriptor: Option<String>,
        error: Option<String>,
    },

    /// Progresso corrente
    Progress {
        current: usize,
        total: usize,
        percentage: f64,
        succeeded: usize,
        oversized: usize,
        errors: usize,
    },

    /// Batch completato
    Complete {
        summary: RunSummary,
        duration_seconds: f64,
    },

    /// Errore fatale
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize)]
pub struct JsonConfig {
    pub budget_bytes: u64,
    pub workers: usize,
    pub task_timeout_secs: Option<u64>,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(input_dir: &Path, output_dir: &Path, total_files: usize, config: JsonConfig) -> Self {
        Self::Start {
            input_dir: input_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            total_files,
            config,
        }
    }

    pub fn file_complete(path: &Path, outcome: &TranscodeOutcome) -> Self {
        let error = match outcome {
            TranscodeOutcome::Error { message } => Some(message.clone()),
            _ => None,
        };

        Self::FileComplete {
            path: path.to_path_buf(),
            status: outcome.kind(),
            size_bytes: outcome.size_bytes(),
            descriptor: outcome.descriptor(),
            error,
        }
    }

    pub fn progress(current: usize, total: usize, summary: &RunSummary) -> Self {
        let percentage = if total > 0 {
            (current as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        Self::Progress {
            current,
            total,
            percentage,
            succeeded: summary.succeeded,
            oversized: summary.oversized,
            errors: summary.failed,
        }
    }

    pub fn complete(summary: RunSummary, duration_seconds: f64) -> Self {
        Self::Complete {
            summary,
            duration_seconds,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            budget_bytes: config.budget_bytes,
            workers: config.workers,
            task_timeout_secs: config.task_timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processor::{EncodeMode, EncodingAttempt};

    #[test]
    fn test_file_complete_serialization() {
        let outcome = TranscodeOutcome::Oversize(EncodingAttempt::new(EncodeMode::Lossy(40), vec![0; 12]));
        let json = serde_json::to_value(JsonMessage::file_complete(Path::new("a.png"), &outcome)).unwrap();

        assert_eq!(json["type"], "file_complete");
        assert_eq!(json["status"], "oversize");
        assert_eq!(json["size_bytes"], 12);
        assert_eq!(json["descriptor"], "quality=40");
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_error_outcome_serialization() {
        let outcome = TranscodeOutcome::error("Decode error: bad header");
        let json = serde_json::to_value(JsonMessage::file_complete(Path::new("a.png"), &outcome)).unwrap();

        assert_eq!(json["status"], "error");
        assert!(json["size_bytes"].is_null());
        assert_eq!(json["error"], "Decode error: bad header");
    }

    #[test]
    fn test_progress_percentage() {
        let summary = RunSummary {
            succeeded: 1,
            ..Default::default()
        };
        match JsonMessage::progress(1, 4, &summary) {
            JsonMessage::Progress { percentage, succeeded, .. } => {
                assert_eq!(percentage, 25.0);
                assert_eq!(succeeded, 1);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
