use std::path::Path;

use serde::Serialize;

use crate::execute::{FileOutcome, IngestBatch};
use crate::Result;

/// Per-file entry of the upload response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileReport {
    Filed {
        filename: String,
        /// Destination folder name, e.g. `2024-03-05-PhoneA`
        date: String,
        size: u64,
    },
    Failed {
        filename: String,
        error: String,
    },
}

/// JSON body returned to the uploading client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub files_processed: usize,
    pub files: Vec<FileReport>,
    pub live_photos_count: usize,
    pub regular_files_count: usize,
}

impl From<&IngestBatch> for UploadResponse {
    fn from(batch: &IngestBatch) -> Self {
        let files = batch
            .results
            .iter()
            .map(|r| match &r.outcome {
                FileOutcome::Filed {
                    destination_folder,
                    size,
                    ..
                } => FileReport::Filed {
                    filename: r.filename.clone(),
                    date: destination_folder.clone(),
                    size: *size,
                },
                FileOutcome::Failed { error_message } => FileReport::Failed {
                    filename: r.filename.clone(),
                    error: error_message.clone(),
                },
            })
            .collect();

        Self {
            success: true,
            files_processed: batch.files_processed,
            files,
            live_photos_count: batch.paired_group_count,
            regular_files_count: batch.files_processed.saturating_sub(batch.paired_file_count),
        }
    }
}

/// Error body for a request that failed as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: &crate::Error) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

/// Write the upload response next to the filed media.
pub fn write_report(batch: &IngestBatch, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &UploadResponse::from(batch))?;
    Ok(())
}
