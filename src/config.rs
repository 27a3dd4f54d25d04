//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione di un run di conversione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri del run
//! - Fornisce validazione dei parametri prima che parta qualsiasi task
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `budget_bytes`: Dimensione massima per file convertito (default: 125 KB = 128000 byte)
//! - `workers`: Numero di worker paralleli (default: core disponibili)
//! - `output_path`: Directory radice di output, contiene anche `log.txt`
//! - `json_output`: Eventi JSON su stdout al posto della progress bar
//! - `task_timeout_secs`: Timeout per singola immagine (default: nessuno)
//!
//! ## Validazione:
//! - Controlla che budget_bytes sia > 0
//! - Controlla che workers sia > 0
//! - Controlla che un eventuale timeout sia > 0
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     budget_bytes: 200 * 1024,
//!     workers: 8,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::error::ConvertError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reference budget: 125 KB
pub const DEFAULT_BUDGET_BYTES: u64 = 125 * 1024;

/// Configuration for a conversion run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hard per-file size budget in bytes
    pub budget_bytes: u64,
    /// Number of parallel workers
    pub workers: usize,
    /// Output root for converted files and log.txt
    pub output_path: PathBuf,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
    /// Per-image timeout, None = wait forever
    pub task_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            budget_bytes: DEFAULT_BUDGET_BYTES,
            workers: default_workers(),
            output_path: PathBuf::from("output"),
            json_output: false,
            task_timeout_secs: None,
        }
    }
}

/// Number of available processing units, 1 if the host won't say
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.budget_bytes == 0 {
            return Err(ConvertError::Configuration(
                "Size budget must be greater than 0 bytes".to_string(),
            ));
        }

        if self.workers == 0 {
            return Err(ConvertError::Configuration(
                "Number of workers must be greater than 0".to_string(),
            ));
        }

        if self.task_timeout_secs == Some(0) {
            return Err(ConvertError::Configuration(
                "Task timeout must be greater than 0 seconds".to_string(),
            ));
        }

        Ok(())
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
