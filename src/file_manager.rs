//! # File Management Module
//!
//! Questo modulo gestisce la discovery delle immagini sorgente e le utilità
//! sulle dimensioni.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva delle immagini sotto la input root
//! - Determinazione formato file dall'estensione (case-insensitive)
//! - Formattazione human-readable delle dimensioni
//! - Formattazione in kilobyte per il diagnostic log
//!
//! ## Formati supportati in input:
//! - JPG, JPEG, PNG
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = FileManager::find_images(Path::new("/path/to/mockups"))?;
//! info!("Found {} images", files.len());
//! ```

use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Manages file discovery and size helpers
pub struct FileManager;

impl FileManager {
    /// Find all convertible images under a directory, sorted by path
    pub fn find_images(input_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(input_dir) {
            let entry = entry?;
            if entry.file_type().is_file() && Self::is_image(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Check if a file is an image we convert
    pub fn is_image(path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            matches!(ext_lower.as_str(), "jpg" | "jpeg" | "png")
        } else {
            false
        }
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Kilobytes rounded to two decimals, printed with at least one decimal
    /// (`140.0`, `143.36`, `0.5`). Exact ties round to even.
    pub fn format_kb(bytes: u64) -> String {
        let kb = (bytes as f64 / 1024.0 * 100.0).round_ties_even() / 100.0;
        let mut text = format!("{kb:.2}");
        while text.ends_with('0') && !text.ends_with(".0") {
            text.pop();
        }
        text
    }

    /// Budget in kilobytes: whole numbers print without decimals
    pub fn format_budget_kb(bytes: u64) -> String {
        if bytes % 1024 == 0 {
            (bytes / 1024).to_string()
        } else {
            Self::format_kb(bytes)
        }
    }
}
