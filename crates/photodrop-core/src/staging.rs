use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use uuid::Uuid;

use crate::execute::IngestResult;
use crate::media::{guess_mime, UploadedFile};
use crate::{Error, Result};

/// Per-file upload cap (500 MiB)
pub const MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;
/// Per-batch file count cap
pub const MAX_BATCH_FILES: usize = 50;
/// Staging folder kept inside the upload root so filing is a same-filesystem rename.
pub const STAGING_DIR_NAME: &str = ".staging";

/// Upload acceptance limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeLimits {
    pub max_file_size: u64,
    pub max_batch_files: usize,
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            max_batch_files: MAX_BATCH_FILES,
        }
    }
}

/// Staging directory for an upload root.
pub fn staging_dir(upload_root: &Path) -> PathBuf {
    upload_root.join(STAGING_DIR_NAME)
}

/// `<unix millis>-<random below 1e9>-<original name>`
pub fn unique_staged_name(original_name: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{}-{}-{}", millis, suffix, original_name)
}

/// Copy client files into `staging`, one `UploadedFile` per source.
///
/// The whole batch is checked against `limits` before anything is copied. If a
/// copy fails, files staged so far are removed and the error is returned.
pub fn stage_files(
    sources: &[PathBuf],
    staging: &Path,
    limits: &IntakeLimits,
) -> Result<Vec<UploadedFile>> {
    if sources.is_empty() {
        return Err(Error::EmptyBatch);
    }
    if sources.len() > limits.max_batch_files {
        return Err(Error::TooManyFiles {
            count: sources.len(),
            limit: limits.max_batch_files,
        });
    }

    let mut accepted = Vec::with_capacity(sources.len());
    for source in sources {
        let meta = fs::metadata(source)?;
        if !meta.is_file() {
            return Err(Error::NotAFile(source.clone()));
        }
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        if meta.len() > limits.max_file_size {
            return Err(Error::FileTooLarge {
                name,
                size: meta.len(),
                limit: limits.max_file_size,
            });
        }
        accepted.push((source, name, meta.len()));
    }

    fs::create_dir_all(staging)?;
    let session_id = Uuid::new_v4();
    let mut staged: Vec<UploadedFile> = Vec::with_capacity(accepted.len());

    for (source, name, size) in accepted {
        let staged_path = staging.join(unique_staged_name(&name));
        if let Err(e) = fs::copy(source, &staged_path) {
            let _ = fs::remove_file(&staged_path);
            discard(&staged);
            return Err(e.into());
        }
        tracing::debug!("Staged {} as {}", name, staged_path.display());
        staged.push(UploadedFile::new(
            name.clone(),
            guess_mime(&name),
            size,
            staged_path,
            session_id,
        ));
    }

    Ok(staged)
}

/// Remove staged copies that were never filed.
pub fn discard(files: &[UploadedFile]) {
    for file in files {
        remove_staged(file);
    }
}

/// Remove the staged copy of every file whose result is a failure, so nothing
/// outlives the request in staging. `results[i]` belongs to `files[i]`.
pub fn discard_unfiled(files: &[UploadedFile], results: &[IngestResult]) {
    for (file, result) in files.iter().zip(results) {
        if !result.is_success() {
            remove_staged(file);
        }
    }
}

fn remove_staged(file: &UploadedFile) {
    match fs::remove_file(&file.staged_path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!("Could not remove staged {}: {}", file.staged_path.display(), e)
        }
    }
}
