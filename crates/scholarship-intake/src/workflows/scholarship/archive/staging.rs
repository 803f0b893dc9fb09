use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use mime::Mime;
use tempfile::NamedTempFile;

/// A multipart file part spooled to local disk for the lifetime of one request.
///
/// The backing file is removed when the value is dropped, so an aborted
/// submission never leaves staged bytes behind. [`StagedUpload::retain`]
/// opts out of that for manual recovery.
pub struct StagedUpload {
    field: String,
    original_name: String,
    content_type: Mime,
    size: u64,
    file: NamedTempFile,
}

impl StagedUpload {
    pub fn create_in(
        directory: &Path,
        field: &str,
        original_name: &str,
        content_type: Mime,
    ) -> io::Result<Self> {
        std::fs::create_dir_all(directory)?;
        let file = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(directory)?;

        Ok(Self {
            field: field.to_string(),
            original_name: original_name.to_string(),
            content_type,
            size: 0,
            file,
        })
    }

    /// Stage an in-memory buffer in one step.
    pub fn from_bytes(
        directory: &Path,
        field: &str,
        original_name: &str,
        content_type: Mime,
        bytes: &[u8],
    ) -> io::Result<Self> {
        let mut staged = Self::create_in(directory, field, original_name, content_type)?;
        staged.write_chunk(bytes)?;
        Ok(staged)
    }

    pub fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk)?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the staged bytes back, failing if the file is gone or unreadable.
    pub async fn read_bytes(&mut self) -> io::Result<Vec<u8>> {
        self.file.flush()?;
        tokio::fs::read(self.file.path()).await
    }

    /// Delete the staged file now, surfacing any filesystem error.
    pub fn discard(self) -> io::Result<()> {
        self.file.close()
    }

    /// Detach the staged file from automatic cleanup and return its path.
    pub fn retain(self) -> io::Result<PathBuf> {
        let (_, path) = self.file.keep().map_err(|err| err.error)?;
        Ok(path)
    }
}

impl fmt::Debug for StagedUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedUpload")
            .field("field", &self.field)
            .field("original_name", &self.original_name)
            .field("content_type", &self.content_type.essence_str())
            .field("size", &self.size)
            .field("path", &self.file.path())
            .finish()
    }
}

/// Content type declared by the client, or guessed from the file name.
pub fn resolve_content_type(declared: Option<&str>, original_name: &str) -> Mime {
    declared
        .and_then(|raw| raw.parse::<Mime>().ok())
        .unwrap_or_else(|| mime_guess::from_path(original_name).first_or_octet_stream())
}
