use std::io;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, warn};

use super::drive::{DriveGateway, DriveOperationError};
use super::staging::StagedUpload;
use crate::workflows::scholarship::audit::DATE_FORMAT;
use crate::workflows::scholarship::domain::{ArchivedDocument, StorageContainer};
use crate::workflows::scholarship::identity::Rut;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("could not create folder '{name}': {source}")]
    Provision {
        name: String,
        #[source]
        source: DriveOperationError,
    },
    #[error("staged file for '{name}' is not readable: {source}")]
    Unreadable {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("upload of '{name}' failed: {source}")]
    Upload {
        name: String,
        #[source]
        source: DriveOperationError,
    },
}

/// Creates one folder per submission and moves staged uploads into it.
#[derive(Debug)]
pub struct DocumentArchiver<D> {
    drive: Arc<D>,
    parent_folder_id: String,
    retain_failed: bool,
}

impl<D> DocumentArchiver<D>
where
    D: DriveGateway + 'static,
{
    pub fn new(drive: Arc<D>, parent_folder_id: impl Into<String>) -> Self {
        Self {
            drive,
            parent_folder_id: parent_folder_id.into(),
            retain_failed: false,
        }
    }

    /// Keep staged files on disk when their upload fails.
    pub fn retain_failed_uploads(mut self, retain: bool) -> Self {
        self.retain_failed = retain;
        self
    }

    pub fn container_name(guardian_name: &str, guardian_id: &Rut, date: NaiveDate) -> String {
        format!(
            "{} - {} - {}",
            guardian_name,
            guardian_id,
            date.format(DATE_FORMAT)
        )
    }

    /// Create a fresh folder for this submission. Never reuses an existing one.
    pub async fn provision_container(
        &self,
        guardian_name: &str,
        guardian_id: &Rut,
        date: NaiveDate,
    ) -> Result<StorageContainer, ArchiveError> {
        let name = Self::container_name(guardian_name, guardian_id, date);
        let id = self
            .drive
            .create_folder(&name, &self.parent_folder_id)
            .await
            .map_err(|source| ArchiveError::Provision {
                name: name.clone(),
                source,
            })?;

        debug!(folder_id = %id, folder = %name, "storage container created");
        Ok(StorageContainer { id, name })
    }

    /// Upload one staged file into `container` under `display_name`.
    ///
    /// The staged copy is deleted once Drive accepts it; a failed delete is
    /// only logged.
    pub async fn archive(
        &self,
        mut upload: StagedUpload,
        container: &StorageContainer,
        display_name: &str,
    ) -> Result<ArchivedDocument, ArchiveError> {
        let bytes = match upload.read_bytes().await {
            Ok(bytes) => bytes,
            Err(source) => {
                error!(path = %upload.path().display(), error = %source, "staged upload unreadable");
                self.release_failed(upload);
                return Err(ArchiveError::Unreadable {
                    name: display_name.to_string(),
                    source,
                });
            }
        };

        let content_type = upload.content_type().clone();
        let stored = match self
            .drive
            .upload_file(display_name, &container.id, &content_type, bytes)
            .await
        {
            Ok(stored) => stored,
            Err(source) => {
                error!(file = %display_name, error = %source, "upload to storage failed");
                self.release_failed(upload);
                return Err(ArchiveError::Upload {
                    name: display_name.to_string(),
                    source,
                });
            }
        };

        let path = upload.path().to_path_buf();
        if let Err(err) = upload.discard() {
            warn!(path = %path.display(), error = %err, "failed to delete staged upload");
        }

        debug!(file_id = %stored.file_id, file = %display_name, "document archived");
        Ok(ArchivedDocument {
            storage_id: stored.file_id,
            view_link: stored.web_view_link,
            display_name: display_name.to_string(),
        })
    }

    fn release_failed(&self, upload: StagedUpload) {
        if !self.retain_failed {
            return;
        }
        match upload.retain() {
            Ok(path) => warn!(path = %path.display(), "staged upload kept for recovery"),
            Err(err) => warn!(error = %err, "could not keep staged upload"),
        }
    }
}
