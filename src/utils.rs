//! Common utility functions

use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, PathsConfig};

pub const SUPPORTED_LANGUAGES: &[&str] = &["es", "de", "it", "ru", "zh", "pl", "sv", "fr", "nl"];

pub fn truncate_display(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}

pub fn validate_language(lang: &str) -> Result<()> {
    if !SUPPORTED_LANGUAGES.contains(&lang) {
        anyhow::bail!(
            "Unsupported language: {} (expected one of: {})",
            lang,
            SUPPORTED_LANGUAGES.join(", ")
        );
    }
    Ok(())
}

/// Language from the command line, else the configured default.
pub fn resolve_language(arg: Option<&str>, cfg: &Config) -> Result<String> {
    let lang = arg
        .unwrap_or(cfg.translation.default_language.as_str())
        .to_lowercase();
    validate_language(&lang)?;
    Ok(lang)
}

/// Path of a data file relative to the data directory.
pub fn relative_to_data(path: &Path, data_dir: &Path) -> PathBuf {
    match path.strip_prefix(data_dir) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| path.to_path_buf()),
    }
}

/// Whether a relative data path lies under one of the skipped prefixes.
pub fn is_skipped(rel: &Path, skip_prefixes: &[String]) -> bool {
    skip_prefixes.iter().any(|prefix| rel.starts_with(prefix))
}

/// Expand the inputs into a sorted list of JSON files, dropping skipped ones.
pub fn collect_data_files(inputs: &[PathBuf], paths: &PathsConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| {
                    e.path()
                        .extension()
                        .map(|ext| ext == "json")
                        .unwrap_or(false)
                })
                .map(|e| e.into_path())
                .collect();
            files.append(&mut found);
        } else {
            anyhow::bail!("Input path does not exist: {}", input.display());
        }
    }

    files.retain(|file| {
        let rel = relative_to_data(file, &paths.data_dir);
        let skipped = is_skipped(&rel, &paths.skip_prefixes);
        if skipped {
            tracing::info!("Skipping {}", file.display());
        }
        !skipped
    });

    Ok(files)
}
