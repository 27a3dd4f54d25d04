//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path di output: path relativo alla input root,
//! riportato sotto la output root, con l'estensione del codec target.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Una coppia sorgente -> destinazione, unità di lavoro del dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub source: PathBuf,
    pub output: PathBuf,
}

impl FilePair {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
        }
    }
}

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// `<output_root>/<input relative to input_root>` with `extension`
    pub fn get_output_path(
        input_path: &Path,
        input_root: &Path,
        output_root: &Path,
        extension: &str,
    ) -> Result<PathBuf, ConvertError> {
        let relative_path = input_path.strip_prefix(input_root).map_err(|_| {
            ConvertError::Configuration(format!(
                "{} is not inside input root {}",
                input_path.display(),
                input_root.display()
            ))
        })?;

        if relative_path.file_stem().is_none() {
            return Err(ConvertError::Configuration(format!(
                "Invalid file name: {}",
                input_path.display()
            )));
        }

        let result = output_root.join(relative_path).with_extension(extension);
        debug!("Resolved output path: {} -> {}", input_path.display(), result.display());
        Ok(result)
    }

    /// Pair every source with its output path
    pub fn resolve_pairs(
        sources: Vec<PathBuf>,
        input_root: &Path,
        output_root: &Path,
        extension: &str,
    ) -> Result<Vec<FilePair>, ConvertError> {
        sources
            .into_iter()
            .map(|source| {
                let output = Self::get_output_path(&source, input_root, output_root, extension)?;
                Ok(FilePair { source, output })
            })
            .collect()
    }

    /// Crea le directory parent se necessario
    pub async fn ensure_parent_dirs(path: &Path) -> Result<(), ConvertError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConvertError::io(parent, e))?;
        }
        Ok(())
    }
}
