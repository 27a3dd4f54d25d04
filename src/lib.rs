//! # WebP Budget Converter Library
//!
//! Modulo principale della libreria: converte alberi di immagini JPG/PNG in
//! WebP tenendo ogni file sotto un budget di dimensione fisso.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom
//! - `image_processor`: Ricerca della qualità e codec WebP
//! - `diagnostic_log`: Il file `log.txt` con i file fuori budget
//! - `optimizer`: Worker pool, task per singolo file, path di output
//! - `progress`: Progress bar e aggregazione dei risultati
//! - `file_manager`: Discovery immagini e formattazione dimensioni
//! - `json_output`: Eventi JSON per uso programmatico
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use webp_budget_converter::{BatchOptimizer, Config};
//! # async fn demo() -> anyhow::Result<()> {
//! let config = Config {
//!     output_path: "out".into(),
//!     ..Default::default()
//! };
//! let optimizer = BatchOptimizer::new(std::path::Path::new("in"), config)?;
//! let summary = optimizer.run().await?;
//! println!("{}", summary.format_summary());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diagnostic_log;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod json_output;
pub mod optimizer;
pub mod progress;

pub use config::{Config, DEFAULT_BUDGET_BYTES};
pub use diagnostic_log::{DiagnosticLog, LogEntry, LOG_FILE_NAME};
pub use error::ConvertError;
pub use image_processor::{
    EncodeMode, EncodingAttempt, OutcomeKind, QualitySearch, TargetEncoder, TranscodeOutcome, WebpEncoder,
};
pub use optimizer::{BatchOptimizer, FilePair, TaskReport, TranscodeTask};
pub use progress::{ResultAggregator, RunSummary};
