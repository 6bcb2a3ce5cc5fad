use std::path::PathBuf;

use uuid::Uuid;

/// Still-image half of a paired capture.
pub const IMAGE_EXTENSIONS: &[&str] = &["heic", "heif", "jpg", "jpeg"];
/// Motion half of a paired capture.
pub const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureKind {
    Image,
    Video,
    Other,
}

impl CaptureKind {
    /// Classify by extension (without the dot), ignoring case.
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            CaptureKind::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            CaptureKind::Video
        } else {
            CaptureKind::Other
        }
    }

    pub fn from_name(name: &str) -> Self {
        match split_name(name).1 {
            Some(ext) => Self::from_extension(ext),
            None => CaptureKind::Other,
        }
    }
}

/// Split a file name into base name and extension at the last dot.
/// A leading dot is part of the base name (".hidden" has no extension).
pub fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// MIME type for a client-supplied name. HEIC/HEIF fall back to `image/<ext>`
/// so they are still treated as images when the registry does not know them.
pub fn guess_mime(name: &str) -> String {
    if let Some(mime) = mime_guess::from_path(name).first() {
        return mime.essence_str().to_string();
    }
    match split_name(name).1 {
        Some(ext) if CaptureKind::from_extension(ext) == CaptureKind::Image => {
            format!("image/{}", ext.to_ascii_lowercase())
        }
        _ => "application/octet-stream".to_string(),
    }
}

/// A file received from the client and parked in the staging area.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name as sent by the client
    pub original_name: String,
    pub mime_type: String,
    /// Size in bytes
    pub size: u64,
    /// Where the upload currently sits (already uniquified)
    pub staged_path: PathBuf,
    /// Shared by every file of one upload batch
    pub session_id: Uuid,
}

impl UploadedFile {
    pub fn new(
        original_name: String,
        mime_type: String,
        size: u64,
        staged_path: PathBuf,
        session_id: Uuid,
    ) -> Self {
        Self {
            original_name,
            mime_type,
            size,
            staged_path,
            session_id,
        }
    }

    /// File name of the staged copy; this is the name the file is filed under.
    pub fn staged_name(&self) -> String {
        self.staged_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.original_name.clone())
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}
