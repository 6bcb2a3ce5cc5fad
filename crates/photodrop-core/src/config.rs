use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default configuration filename
pub const CONFIG_FILENAME: &str = "photodrop.json";

/// Upload root used when no configuration has been saved yet
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";

/// Persisted configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub uploads_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from(DEFAULT_UPLOADS_DIR),
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults when the file is missing
    /// or cannot be parsed.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::read(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Error loading config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Save configuration. Written and synced to a temp file first, then
    /// renamed into place; on any error the existing file is left untouched.
    pub fn save(&self, path: &Path) -> Result<()> {
        let temp_path = path.with_extension("json.tmp");

        let written = File::create(&temp_path)
            .map_err(Error::from)
            .and_then(|file| write_pretty(file, self))
            .and_then(|file| Ok(file.sync_all()?))
            .and_then(|()| Ok(fs::rename(&temp_path, path)?));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(())
    }
}

/// Serialize through a buffer and flush it explicitly, so a failed write is
/// reported instead of being dropped with the buffer.
fn write_pretty<W: Write>(inner: W, config: &Config) -> Result<W> {
    let mut writer = BufWriter::new(inner);
    serde_json::to_writer_pretty(&mut writer, config)?;
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// Check that a candidate upload root exists and is a directory.
pub fn validate_upload_root(candidate: &Path) -> Result<()> {
    if candidate.as_os_str().is_empty() {
        return Err(Error::EmptyPath);
    }
    let meta = fs::metadata(candidate).map_err(|_| Error::PathNotFound(candidate.to_path_buf()))?;
    if !meta.is_dir() {
        return Err(Error::NotADirectory(candidate.to_path_buf()));
    }
    Ok(())
}

#[derive(Debug)]
struct ConfigStore {
    path: PathBuf,
    current: RwLock<Config>,
}

/// Process-wide configuration shared between request handlers.
///
/// Readers take a snapshot of the upload root once per batch; writers validate,
/// persist and only then publish the new value.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<ConfigStore>,
}

impl SharedConfig {
    /// Load configuration from `path` and make sure the active upload root exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = Config::load(&path);
        fs::create_dir_all(&config.uploads_dir)?;
        Ok(Self::with_config(path, config))
    }

    /// Wrap an already loaded configuration.
    pub fn with_config(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            inner: Arc::new(ConfigStore {
                path: path.into(),
                current: RwLock::new(config),
            }),
        }
    }

    pub fn snapshot(&self) -> Config {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current upload root. Read this once per batch.
    pub fn snapshot_root(&self) -> PathBuf {
        self.snapshot().uploads_dir
    }

    /// Validate and commit a new upload root.
    ///
    /// Nothing changes, on disk or in memory, unless the path is an existing
    /// directory and the configuration file was written successfully.
    pub fn set_upload_root(&self, candidate: impl AsRef<Path>) -> Result<PathBuf> {
        let candidate = candidate.as_ref();
        validate_upload_root(candidate)?;

        let mut current = self
            .inner
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let updated = Config {
            uploads_dir: candidate.to_path_buf(),
        };
        updated.save(&self.inner.path)?;
        *current = updated;

        tracing::info!("Upload path updated to {}", candidate.display());
        Ok(candidate.to_path_buf())
    }
}
