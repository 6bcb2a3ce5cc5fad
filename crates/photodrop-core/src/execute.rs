use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::media::UploadedFile;
use crate::plan::FilingDestination;
use crate::ThrottledProgress;

/// What happened to one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum FileOutcome {
    Filed {
        destination_folder: String,
        path: PathBuf,
        size: u64,
    },
    Failed {
        error_message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestResult {
    /// Client-supplied name
    pub filename: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl IngestResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FileOutcome::Filed { .. })
    }
}

/// Results of one ingest call, one entry per submitted file in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestBatch {
    pub files_processed: usize,
    pub paired_group_count: usize,
    pub paired_file_count: usize,
    pub results: Vec<IngestResult>,
}

impl IngestBatch {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Move every staged file to its planned destination, in order.
///
/// Never stops early: a failure is recorded against that file and the next file
/// is attempted. After cancellation the remaining files are reported as failed
/// and left in staging.
///
/// # Panics
///
/// Panics if `files` and `plan` differ in length.
pub fn execute(
    files: &[UploadedFile],
    plan: &[FilingDestination],
    cancel_token: Option<&CancellationToken>,
    progress: &ThrottledProgress,
) -> Vec<IngestResult> {
    assert_eq!(files.len(), plan.len(), "one destination per file");

    let total = files.len() as u64;
    let mut results = Vec::with_capacity(files.len());

    for (i, (file, dest)) in files.iter().zip(plan).enumerate() {
        progress.report("file", i as u64, total, &file.original_name);

        if let Some(Err(e)) = cancel_token.map(CancellationToken::check) {
            results.push(IngestResult {
                filename: file.original_name.clone(),
                outcome: FileOutcome::Failed {
                    error_message: e.to_string(),
                },
            });
            continue;
        }

        let outcome = match file_one(file, dest) {
            Ok(path) => {
                tracing::info!("File saved: {} -> {}/", file.original_name, dest.folder_name);
                FileOutcome::Filed {
                    destination_folder: dest.folder_name.clone(),
                    path,
                    size: file.size,
                }
            }
            Err(message) => {
                tracing::warn!("Error processing file {}: {}", file.original_name, message);
                FileOutcome::Failed {
                    error_message: message,
                }
            }
        };

        results.push(IngestResult {
            filename: file.original_name.clone(),
            outcome,
        });
    }

    results
}

fn file_one(file: &UploadedFile, dest: &FilingDestination) -> Result<PathBuf, String> {
    // create_dir_all tolerates a concurrent batch creating the same folder.
    fs::create_dir_all(&dest.folder)
        .map_err(|e| format!("Failed to create folder {}: {}", dest.folder_name, e))?;

    let target = dest.path();
    if target.symlink_metadata().is_ok() {
        return Err(format!(
            "Destination already exists: {}/{}",
            dest.folder_name, dest.file_name
        ));
    }

    match fs::rename(&file.staged_path, &target) {
        Ok(()) => Ok(target),
        Err(e) if is_cross_device(&e) => {
            copy_then_remove(&file.staged_path, dest, &target)
                .map_err(|e| format!("Failed to move file: {}", e))?;
            Ok(target)
        }
        Err(e) => Err(format!("Failed to move file: {}", e)),
    }
}

/// Cross-filesystem move. The destination only appears under its final name
/// once the copy is complete and synced; the source is removed last.
///
/// Once the destination is in place the file counts as filed, even if the
/// staged source cannot be removed.
fn copy_then_remove(source: &Path, dest: &FilingDestination, target: &Path) -> io::Result<()> {
    let partial = dest.folder.join(format!(".{}.partial", dest.file_name));

    let copied = fs::copy(source, &partial)
        .and_then(|_| OpenOptions::new().write(true).open(&partial)?.sync_all())
        .and_then(|_| fs::rename(&partial, target));
    if let Err(e) = copied {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }

    if let Err(e) = fs::remove_file(source) {
        tracing::warn!(
            "Filed {} but could not remove staged copy {}: {}",
            target.display(),
            source.display(),
            e
        );
    }
    Ok(())
}

fn is_cross_device(err: &io::Error) -> bool {
    // EXDEV on unix, ERROR_NOT_SAME_DEVICE on windows
    const CROSS_DEVICE: i32 = if cfg!(windows) { 17 } else { 18 };
    err.raw_os_error() == Some(CROSS_DEVICE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::folder_name;
    use chrono::NaiveDate;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn silent(_: &str, _: u64, _: u64, _: &str) {}

    fn stage(dir: &Path, name: &str, body: &[u8]) -> UploadedFile {
        let path = dir.join(format!("1-1-{}", name));
        fs::write(&path, body).unwrap();
        UploadedFile::new(
            name.to_string(),
            crate::media::guess_mime(name),
            body.len() as u64,
            path,
            Uuid::nil(),
        )
    }

    fn dest_for(root: &Path, file: &UploadedFile, prefix: Option<&str>) -> FilingDestination {
        let name = folder_name(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), prefix);
        FilingDestination {
            folder: root.join(&name),
            folder_name: name,
            file_name: file.staged_name(),
        }
    }

    #[test]
    fn test_moves_into_date_folder() {
        let staging = tempdir().unwrap();
        let root = tempdir().unwrap();
        let file = stage(staging.path(), "IMG_1.jpg", b"jpeg");
        let dest = dest_for(root.path(), &file, Some("PhoneA"));

        let tp = ThrottledProgress::new(&silent);
        let results = execute(&[file.clone()], &[dest.clone()], None, &tp);

        assert_eq!(results.len(), 1);
        match &results[0].outcome {
            FileOutcome::Filed {
                destination_folder,
                path,
                size,
            } => {
                assert_eq!(destination_folder, "2024-03-05-PhoneA");
                assert_eq!(*size, 4);
                assert_eq!(fs::read(path).unwrap(), b"jpeg");
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert!(!file.staged_path.exists());
    }

    #[test]
    fn test_missing_source_is_reported_not_fatal() {
        let staging = tempdir().unwrap();
        let root = tempdir().unwrap();
        let first = stage(staging.path(), "a.jpg", b"a");
        let second = stage(staging.path(), "b.jpg", b"b");
        let third = stage(staging.path(), "c.jpg", b"c");
        fs::remove_file(&second.staged_path).unwrap();

        let files = vec![first, second, third];
        let plan: Vec<_> = files.iter().map(|f| dest_for(root.path(), f, None)).collect();
        let tp = ThrottledProgress::new(&silent);
        let results = execute(&files, &plan, None, &tp);

        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert_eq!(results[1].filename, "b.jpg");
        assert!(results[2].is_success());
        assert!(plan[0].path().exists());
        assert!(plan[2].path().exists());
    }

    #[test]
    fn test_existing_destination_is_not_overwritten() {
        let staging = tempdir().unwrap();
        let root = tempdir().unwrap();
        let file = stage(staging.path(), "a.jpg", b"new");
        let dest = dest_for(root.path(), &file, None);
        fs::create_dir_all(&dest.folder).unwrap();
        fs::write(dest.path(), b"old").unwrap();

        let tp = ThrottledProgress::new(&silent);
        let results = execute(&[file.clone()], &[dest.clone()], None, &tp);

        assert!(!results[0].is_success());
        assert_eq!(fs::read(dest.path()).unwrap(), b"old");
        assert!(file.staged_path.exists());
    }

    #[test]
    fn test_folder_creation_failure_is_per_file() {
        let staging = tempdir().unwrap();
        let root = tempdir().unwrap();
        let blocked = stage(staging.path(), "a.jpg", b"a");
        let fine = stage(staging.path(), "b.jpg", b"b");

        // A plain file where the folder should be makes create_dir_all fail.
        let bad_dest = dest_for(root.path(), &blocked, Some("Blocked"));
        fs::write(&bad_dest.folder, b"not a dir").unwrap();
        let good_dest = dest_for(root.path(), &fine, None);

        let tp = ThrottledProgress::new(&silent);
        let results = execute(
            &[blocked.clone(), fine],
            &[bad_dest, good_dest.clone()],
            None,
            &tp,
        );

        match &results[0].outcome {
            FileOutcome::Failed { error_message } => {
                assert!(error_message.contains("2024-03-05-Blocked"), "{}", error_message)
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(blocked.staged_path.exists());
        assert!(results[1].is_success());
        assert!(good_dest.path().exists());
    }

    #[test]
    fn test_cancelled_batch_reports_every_file() {
        let staging = tempdir().unwrap();
        let root = tempdir().unwrap();
        let files = vec![
            stage(staging.path(), "a.jpg", b"a"),
            stage(staging.path(), "b.jpg", b"b"),
        ];
        let plan: Vec<_> = files.iter().map(|f| dest_for(root.path(), f, None)).collect();

        let token = CancellationToken::new();
        token.cancel();
        let tp = ThrottledProgress::new(&silent);
        let results = execute(&files, &plan, Some(&token), &tp);

        assert_eq!(results.len(), 2);
        for (r, f) in results.iter().zip(&files) {
            assert_eq!(
                r.outcome,
                FileOutcome::Failed {
                    error_message: "Ingest cancelled".to_string()
                }
            );
            assert!(f.staged_path.exists());
        }
    }

    #[test]
    fn test_copy_fallback_publishes_and_removes_source() {
        let staging = tempdir().unwrap();
        let root = tempdir().unwrap();
        let file = stage(staging.path(), "IMG_2.heic", b"heic bytes");
        let dest = dest_for(root.path(), &file, None);
        fs::create_dir_all(&dest.folder).unwrap();

        copy_then_remove(&file.staged_path, &dest, &dest.path()).unwrap();

        assert_eq!(fs::read(dest.path()).unwrap(), b"heic bytes");
        assert!(!file.staged_path.exists());
        assert_eq!(fs::read_dir(&dest.folder).unwrap().count(), 1);
    }

    #[test]
    fn test_copy_fallback_failure_keeps_source() {
        let staging = tempdir().unwrap();
        let root = tempdir().unwrap();
        let file = stage(staging.path(), "IMG_3.heic", b"heic bytes");
        let dest = dest_for(root.path(), &file, None);
        // A non-empty directory at the target makes the final rename fail.
        fs::create_dir_all(dest.path().join("occupied")).unwrap();

        assert!(copy_then_remove(&file.staged_path, &dest, &dest.path()).is_err());

        assert_eq!(fs::read(&file.staged_path).unwrap(), b"heic bytes");
        let partial = dest.folder.join(format!(".{}.partial", dest.file_name));
        assert!(!partial.exists());
    }

    #[test]
    fn test_shared_folder_is_reused() {
        let staging = tempdir().unwrap();
        let root = tempdir().unwrap();
        let files = vec![
            stage(staging.path(), "a.jpg", b"a"),
            stage(staging.path(), "a.mov", b"m"),
        ];
        let plan: Vec<_> = files.iter().map(|f| dest_for(root.path(), f, None)).collect();
        fs::create_dir_all(&plan[0].folder).unwrap();

        let tp = ThrottledProgress::new(&silent);
        let results = execute(&files, &plan, None, &tp);
        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 2);
        assert_eq!(fs::read_dir(&plan[0].folder).unwrap().count(), 2);
    }
}
