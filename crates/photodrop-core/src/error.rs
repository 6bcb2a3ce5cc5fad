use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Batch arrived with nothing in it.
    #[error("No files uploaded")]
    EmptyBatch,

    #[error("Too many files in one upload: {count} (limit {limit})")]
    TooManyFiles { count: usize, limit: usize },

    #[error("File too large: {name} is {size} bytes (limit {limit})")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    #[error("Not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Path is required")]
    EmptyPath,

    #[error("Path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Path must be a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Ingest cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors caused by what the caller sent, as opposed to server-side failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyBatch
                | Error::TooManyFiles { .. }
                | Error::FileTooLarge { .. }
                | Error::NotAFile(_)
                | Error::EmptyPath
                | Error::PathNotFound(_)
                | Error::NotADirectory(_)
        )
    }
}
