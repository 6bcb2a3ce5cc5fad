pub mod exif;

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::media::UploadedFile;

/// Where a capture date came from, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateSource {
    /// EXIF DateTimeOriginal
    Exif,
    /// Filesystem birth time
    Filesystem,
    /// Wall clock at resolution time; the platform could not report a birth time
    Clock,
}

/// Calendar day a file was captured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureDate {
    pub date: NaiveDate,
    pub source: DateSource,
}

impl CaptureDate {
    pub fn new(date: NaiveDate, source: DateSource) -> Self {
        Self { date, source }
    }
}

impl fmt::Display for CaptureDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))
    }
}

/// Produces exactly one date per file. Implementations must not fail.
pub trait DateResolver {
    fn resolve(&self, file: &UploadedFile) -> CaptureDate;
}

/// EXIF first for images, then the filesystem birth time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifDateResolver;

impl DateResolver for ExifDateResolver {
    fn resolve(&self, file: &UploadedFile) -> CaptureDate {
        if let Some(date) = metadata_date(file) {
            return CaptureDate::new(date, DateSource::Exif);
        }
        filesystem_date(&file.staged_path)
    }
}

/// Embedded capture date, if the file is an image that carries a usable one.
pub fn metadata_date(file: &UploadedFile) -> Option<NaiveDate> {
    if !file.is_image() || file.size > exif::MAX_EXIF_FILE_SIZE {
        return None;
    }
    let date = exif::read_original_date(&file.staged_path);
    if date.is_none() {
        tracing::debug!(
            "No usable EXIF date in {}, using file stats",
            file.original_name
        );
    }
    date
}

/// Local calendar date of the file's birth time. Falls back to the current
/// local date when the platform or filesystem does not record birth times.
pub fn filesystem_date(path: &Path) -> CaptureDate {
    match fs::metadata(path).and_then(|m| m.created()) {
        Ok(created) => {
            let local: DateTime<Local> = created.into();
            CaptureDate::new(local.date_naive(), DateSource::Filesystem)
        }
        Err(e) => {
            tracing::warn!(
                "Birth time unavailable for {} ({}), substituting current time",
                path.display(),
                e
            );
            CaptureDate::new(Local::now().date_naive(), DateSource::Clock)
        }
    }
}
