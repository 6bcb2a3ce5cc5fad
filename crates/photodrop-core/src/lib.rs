pub mod cancel;
pub mod config;
pub mod date;
pub mod error;
pub mod execute;
pub mod media;
pub mod pairs;
pub mod plan;
pub mod report;
pub mod staging;
pub mod stats;

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use cancel::CancellationToken;
pub use config::{Config, SharedConfig};
pub use date::{CaptureDate, DateResolver, DateSource, ExifDateResolver};
pub use error::{Error, Result};
pub use execute::{FileOutcome, IngestBatch, IngestResult};
pub use media::UploadedFile;
pub use plan::FilingDestination;

/// Options supplied with an upload batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOptions {
    /// Free-text device name appended to the date folder
    #[serde(default)]
    pub device_prefix: Option<String>,
}

/// Control options for one ingest call.
#[derive(Debug, Clone, Default)]
pub struct IngestControl {
    /// Checked before each file is moved.
    pub cancel_token: Option<CancellationToken>,
}

impl IngestControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }
}

/// Type alias for progress callback
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str) + Send + Sync;

/// Throttled progress reporter - emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback,
    last_emit: Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback) -> Self {
        let start = Instant::now()
            .checked_sub(Duration::from_secs(1))
            .unwrap_or_else(Instant::now);
        Self {
            inner,
            last_emit: Mutex::new(start),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            let mut last = self.last_emit.lock().unwrap_or_else(PoisonError::into_inner);
            if last.elapsed() < Duration::from_millis(200) {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Run the ingestion pipeline on a staged batch with the default date resolver.
///
/// `upload_root` is the root as read once at the start of the batch; later
/// configuration changes do not affect this call.
pub fn ingest(
    files: &[UploadedFile],
    upload_root: &Path,
    options: &IngestOptions,
    progress_callback: &ProgressCallback,
) -> Result<IngestBatch> {
    ingest_with(
        &ExifDateResolver,
        files,
        upload_root,
        options,
        &IngestControl::default(),
        progress_callback,
    )
}

/// Run the ingestion pipeline with an explicit resolver and control options.
///
/// Staged copies of files that could not be filed, cancelled ones included, are
/// deleted before returning.
pub fn ingest_with(
    resolver: &dyn DateResolver,
    files: &[UploadedFile],
    upload_root: &Path,
    options: &IngestOptions,
    control: &IngestControl,
    progress_callback: &ProgressCallback,
) -> Result<IngestBatch> {
    if files.is_empty() {
        return Err(Error::EmptyBatch);
    }
    let tp = ThrottledProgress::new(progress_callback);
    let total = files.len() as u64;

    // Stage 1: Pair detection (reporting only, never changes where files go)
    let names: Vec<&str> = files.iter().map(|f| f.original_name.as_str()).collect();
    let pairs = pairs::detect_pairs(&names);
    if pairs.group_count() > 0 {
        tracing::debug!("Detected {} paired capture(s)", pairs.group_count());
    }

    // Stage 2: Resolve one capture date per file
    let dates: Vec<CaptureDate> = files
        .iter()
        .enumerate()
        .map(|(i, f)| {
            tp.report("date", i as u64, total, &f.original_name);
            let date = resolver.resolve(f);
            tracing::debug!("{}: {} ({:?})", f.original_name, date, date.source);
            date
        })
        .collect();

    // Stage 3: Plan destinations
    let destinations = plan::plan(
        files,
        &dates,
        options.device_prefix.as_deref(),
        upload_root,
    );

    // Stage 4: Move files
    let results = execute::execute(files, &destinations, control.cancel_token.as_ref(), &tp);

    // Stage 5: Nothing outlives the request in staging
    staging::discard_unfiled(files, &results);

    Ok(IngestBatch {
        files_processed: results.len(),
        paired_group_count: pairs.group_count(),
        paired_file_count: pairs.paired_file_count(),
        results,
    })
}
