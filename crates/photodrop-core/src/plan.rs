use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::date::CaptureDate;
use crate::media::UploadedFile;

/// Where one upload is going to be filed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingDestination {
    /// `YYYY-MM-DD` or `YYYY-MM-DD-<prefix>`
    pub folder_name: String,
    /// Upload root joined with `folder_name`
    pub folder: PathBuf,
    /// Final name inside the folder
    pub file_name: String,
}

impl FilingDestination {
    pub fn path(&self) -> PathBuf {
        self.folder.join(&self.file_name)
    }
}

/// Clean a client-supplied device prefix so it can only ever name a single
/// folder component. Separators and control characters are dropped; a prefix
/// that ends up empty or made only of dots counts as absent.
pub fn sanitize_prefix(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '/' | '\\') && !c.is_control())
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Folder name for a date and an already-sanitized prefix.
pub fn folder_name(date: NaiveDate, prefix: Option<&str>) -> String {
    let day = date.format("%Y-%m-%d");
    match prefix {
        Some(prefix) => format!("{}-{}", day, prefix),
        None => day.to_string(),
    }
}

/// Compute one destination per file, in input order. Pure: touches no disk.
///
/// `dates[i]` must be the resolved date of `files[i]`.
///
/// # Panics
///
/// Panics if `files` and `dates` differ in length.
pub fn plan(
    files: &[UploadedFile],
    dates: &[CaptureDate],
    device_prefix: Option<&str>,
    upload_root: &Path,
) -> Vec<FilingDestination> {
    assert_eq!(files.len(), dates.len(), "one resolved date per file");

    let prefix = device_prefix.and_then(sanitize_prefix);

    files
        .iter()
        .zip(dates)
        .map(|(file, date)| {
            let folder_name = folder_name(date.date, prefix.as_deref());
            FilingDestination {
                folder: upload_root.join(&folder_name),
                folder_name,
                file_name: file.staged_name(),
            }
        })
        .collect()
}
