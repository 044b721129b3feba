//! Output folder resolution and file name handling.

use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::RecorderError;

/// Resolves `<Documents>/<folder_name>`, creating it when missing.
///
/// Falls back to `$HOME/Documents` when the platform has no documents
/// directory configured.
pub fn resolve_default_directory(config: &Config) -> Result<PathBuf, RecorderError> {
    let documents = dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
        .ok_or(RecorderError::DocumentsDirUnavailable)?;

    ensure_output_folder(&documents, &config.folder_name)
}

/// Ensures `base/folder_name` exists and returns it.
pub fn ensure_output_folder(base: &Path, folder_name: &str) -> Result<PathBuf, RecorderError> {
    let folder = base.join(folder_name);
    ensure_directory(&folder)?;
    Ok(folder)
}

pub fn ensure_directory(path: &Path) -> Result<(), RecorderError> {
    if path.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(path).map_err(|source| RecorderError::CreateDirectory {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Created output folder {}", path.display());
    Ok(())
}

/// Trims user input and appends `extension_suffix` unless already present.
pub fn normalize_file_name(input: &str, extension_suffix: &str) -> Result<String, RecorderError> {
    let name = input.trim();
    if name.is_empty() {
        return Err(RecorderError::EmptyFileName);
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(RecorderError::InvalidFileName(name.to_string()));
    }

    if name.ends_with(extension_suffix) {
        Ok(name.to_string())
    } else {
        Ok(format!("{}{}", name, extension_suffix))
    }
}
