//! # Optimizer Module
//!
//! Separa le responsabilità del run in sottomoduli:
//! - `batch_optimizer`: Orchestratore principale, worker pool e raccolta esiti
//! - `task_optimizer`: Worker per singoli file
//! - `progress_tracker`: Gestione progress unificata
//! - `path_resolver`: Logica di calcolo path centralizzata

pub mod batch_optimizer;
pub mod path_resolver;
pub mod progress_tracker;
pub mod task_optimizer;

pub use batch_optimizer::BatchOptimizer;
pub use path_resolver::{FilePair, PathResolver};
pub use progress_tracker::ProgressTracker;
pub use task_optimizer::{TaskReport, TranscodeTask};
