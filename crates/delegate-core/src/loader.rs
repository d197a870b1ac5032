use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{DelegateError, Result};
use crate::filename::validate_filename;
use crate::instructions::Instructions;

/// Largest instruction file accepted, in bytes.
pub const MAX_FILE_SIZE: u64 = 1_048_576;

/// An instruction file that passed every check. Consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFile {
    pub sanitized_name: String,
    pub absolute_path: PathBuf,
    pub size_bytes: u64,
}

/// Resolve `filename` under `workdir` and check it is a small regular file.
///
/// Metadata is read without following symlinks, so a symlink is never
/// accepted even when it points at a regular file.
pub fn validate_file(workdir: &Path, filename: &str) -> Result<ValidatedFile> {
    let sanitized_name = validate_filename(filename)?;
    let base = if workdir.is_absolute() {
        workdir.to_path_buf()
    } else {
        std::env::current_dir()?.join(workdir)
    };
    let absolute_path = base.join(&sanitized_name);

    let meta = match std::fs::symlink_metadata(&absolute_path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(DelegateError::NotFound(absolute_path))
        }
        Err(e) => return Err(e.into()),
    };

    if meta.len() > MAX_FILE_SIZE {
        return Err(DelegateError::SizeLimit {
            path: absolute_path,
            size: meta.len(),
            limit: MAX_FILE_SIZE,
        });
    }
    if !meta.file_type().is_file() {
        return Err(DelegateError::NotRegularFile(absolute_path));
    }

    tracing::info!(
        filename = %sanitized_name,
        size = meta.len(),
        "instruction file validated"
    );
    Ok(ValidatedFile {
        sanitized_name,
        absolute_path,
        size_bytes: meta.len(),
    })
}

/// Read a validated file into [`Instructions`] that reference it as source.
pub fn load_instructions(file: &ValidatedFile) -> Result<Instructions> {
    let text = std::fs::read_to_string(&file.absolute_path)?;
    Ok(Instructions {
        text,
        source_file: Some(file.absolute_path.clone()),
    })
}
