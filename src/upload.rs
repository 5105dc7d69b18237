//! Upload admission and temporary storage
//!
//! Uploaded files are written under the uploads directory with a unique
//! name and removed when their [`ScopedUpload`] guard drops, whichever way
//! the request ends.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, VoltcastError};

/// Default allow-list of upload extensions
pub const DEFAULT_EXTENSIONS: &[&str] = &["csv", "txt"];

/// Where uploads go and which file types are accepted
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    dir: PathBuf,
    allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    /// Policy storing under `dir`, accepting `allowed_extensions`
    /// (compared case-insensitively)
    pub fn new(dir: impl Into<PathBuf>, allowed_extensions: &[impl AsRef<str>]) -> Self {
        Self {
            dir: dir.into(),
            allowed_extensions: allowed_extensions
                .iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Upload directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Accepted extensions, lower-case
    #[must_use]
    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    /// Check the client file name against the allow-list
    ///
    /// Returns the lower-cased extension.
    ///
    /// # Errors
    ///
    /// Returns [`VoltcastError::InvalidUpload`] for an empty name and
    /// [`VoltcastError::ExtensionNotAllowed`] when the extension is absent
    /// or not listed.
    pub fn validate_extension(&self, filename: &str) -> Result<String> {
        if filename.trim().is_empty() {
            return Err(VoltcastError::InvalidUpload {
                reason: "no file selected".to_string(),
            });
        }
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if self.allowed_extensions.contains(&extension) {
            Ok(extension)
        } else {
            Err(VoltcastError::ExtensionNotAllowed {
                extension,
                allowed: self.allowed_extensions.join(", "),
            })
        }
    }

    /// Validate, then write `contents` to a uniquely named file
    ///
    /// # Errors
    ///
    /// Returns the validation error, or [`VoltcastError::IoError`] when the
    /// directory or file cannot be written.
    pub fn store(&self, filename: &str, contents: &[u8]) -> Result<ScopedUpload> {
        self.validate_extension(filename)?;
        fs::create_dir_all(&self.dir).map_err(|e| VoltcastError::IoError {
            message: format!("failed to create {}: {e}", self.dir.display()),
        })?;

        let path = self
            .dir
            .join(format!("{}-{}", Uuid::new_v4(), sanitize_filename(filename)));
        // Guard first so a partial write is still cleaned up
        let guard = ScopedUpload { path };
        fs::write(&guard.path, contents).map_err(|e| VoltcastError::IoError {
            message: format!("failed to store upload {}: {e}", guard.path.display()),
        })?;
        debug!(path = %guard.path.display(), bytes = contents.len(), "upload stored");
        Ok(guard)
    }
}

/// Reduce a client-supplied name to a safe single path component
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Stored upload, deleted on drop
#[derive(Debug)]
pub struct ScopedUpload {
    path: PathBuf,
}

impl ScopedUpload {
    /// Location on disk
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedUpload {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "upload removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {},
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove upload"),
        }
    }
}
