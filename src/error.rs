//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Categorie di errori:
//! - `Decode`: il file sorgente non è un'immagine valida
//! - `Encode`: il codec rifiuta i parametri lossless/quality richiesti
//! - `Io`: errori di I/O (sorgente mancante, output non scrivibile)
//! - `WorkerFault`: crash inatteso dentro il contesto di esecuzione di un task
//! - `Timeout`: il task ha superato il timeout configurato
//! - `Configuration`: parametri di run non validi, fatali prima di iniziare
//!
//! Tutti gli errori per singola immagine vengono convertiti in
//! `TranscodeOutcome::Error` al confine del task; solo `Configuration`
//! interrompe l'intero batch.
//!
//! ## Esempio:
//! ```rust,ignore
//! if config.budget_bytes == 0 {
//!     return Err(ConvertError::Configuration("budget must be greater than 0".into()));
//! }
//! ```

use std::path::PathBuf;

/// Custom error types for budgeted conversion
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker fault: {0}")]
    WorkerFault(String),

    #[error("timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ConvertError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that must abort the run before any task starts
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
