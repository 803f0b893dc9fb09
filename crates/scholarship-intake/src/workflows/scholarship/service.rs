use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::archive::{ArchiveError, DocumentArchiver, DriveGateway, StagedUpload};
use super::audit::{AuditLogEntry, Clock, SystemClock};
use super::domain::{
    child_document_name, guardian_document_name, ArchivedDocument, StorageContainer,
};
use super::duplicates::{DuplicateCheckError, DuplicateGuard, DuplicateIdentifier};
use super::intake::{SubmissionForm, ValidationError};
use super::rows::build_row;
use super::store::{StoreError, Table, TabularStore};
use crate::config::UploadConfig;

pub const SUCCESS_MESSAGE: &str = "Postulación registrada exitosamente";
pub const FILE_FAILURE_MESSAGE: &str = "No se pudo procesar el archivo";
pub const GENERIC_FAILURE_MESSAGE: &str = "Error al procesar la postulación";

/// Linear progress of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Received,
    DuplicateChecked,
    ContainerCreated,
    DocumentsArchived,
    RowsBuilt,
    RowsAppended,
}

impl SubmissionStage {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStage::Received => "received",
            SubmissionStage::DuplicateChecked => "duplicate_checked",
            SubmissionStage::ContainerCreated => "container_created",
            SubmissionStage::DocumentsArchived => "documents_archived",
            SubmissionStage::RowsBuilt => "rows_built",
            SubmissionStage::RowsAppended => "rows_appended",
        }
    }
}

/// What an accepted submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub container: StorageContainer,
    pub documents: Vec<ArchivedDocument>,
    pub first_row: u32,
    pub rows_written: usize,
}

/// Error raised while processing a submission.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Duplicate(#[from] DuplicateIdentifier),
    #[error("storage provisioning failed: {0}")]
    StorageProvision(#[source] ArchiveError),
    #[error("storage upload failed: {0}")]
    StorageUpload(#[source] ArchiveError),
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

impl SubmissionError {
    /// Message safe to return to the submitter.
    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::Validation(err) => err.to_string(),
            SubmissionError::Duplicate(err) => err.to_string(),
            SubmissionError::StorageProvision(_) | SubmissionError::StorageUpload(_) => {
                FILE_FAILURE_MESSAGE.to_string()
            }
            SubmissionError::Persistence(_) => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl From<DuplicateCheckError> for SubmissionError {
    fn from(value: DuplicateCheckError) -> Self {
        match value {
            DuplicateCheckError::Duplicate(duplicate) => Self::Duplicate(duplicate),
            DuplicateCheckError::Store(store) => Self::Persistence(store),
        }
    }
}

/// Settings the orchestrator needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct IntakeSettings {
    pub parent_folder_id: String,
    pub uploads: UploadConfig,
}

/// Sequences duplicate screening, archiving and row persistence for one
/// submission, and records every attempt in the logs table.
pub struct ScholarshipIntakeService<S, D> {
    store: Arc<S>,
    guard: DuplicateGuard<S>,
    archiver: DocumentArchiver<D>,
    clock: Arc<dyn Clock>,
    uploads: UploadConfig,
    intake_lock: Mutex<()>,
}

impl<S, D> ScholarshipIntakeService<S, D>
where
    S: TabularStore + 'static,
    D: DriveGateway + 'static,
{
    pub fn new(store: Arc<S>, drive: Arc<D>, settings: IntakeSettings) -> Self {
        Self::with_clock(store, drive, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<S>,
        drive: Arc<D>,
        settings: IntakeSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let archiver = DocumentArchiver::new(drive, settings.parent_folder_id)
            .retain_failed_uploads(settings.uploads.retain_failed);

        Self {
            guard: DuplicateGuard::new(store.clone()),
            store,
            archiver,
            clock,
            uploads: settings.uploads,
            intake_lock: Mutex::new(()),
        }
    }

    pub fn uploads(&self) -> &UploadConfig {
        &self.uploads
    }

    /// Process one submission end to end. Exactly one audit entry is written
    /// whatever the outcome.
    pub async fn submit(
        &self,
        form: SubmissionForm,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let payload = form.snapshot();
        let mut stage = SubmissionStage::Received;

        let outcome = self.process(form, &mut stage).await;
        match &outcome {
            Ok(receipt) => {
                info!(
                    container = %receipt.container.name,
                    first_row = receipt.first_row,
                    rows = receipt.rows_written,
                    documents = receipt.documents.len(),
                    "submission accepted"
                );
                self.record(AuditLogEntry::success(self.clock.now(), payload))
                    .await;
            }
            Err(err) => {
                warn!(stage = stage.label(), error = %err, "submission rejected");
                self.record(AuditLogEntry::failure(
                    self.clock.now(),
                    err.to_string(),
                    payload,
                ))
                .await;
            }
        }
        outcome
    }

    /// Record an attempt that never reached validation, e.g. an unreadable
    /// multipart body.
    pub async fn reject(&self, form: SubmissionForm, error: ValidationError) -> SubmissionError {
        let error = SubmissionError::Validation(error);
        warn!(
            stage = SubmissionStage::Received.label(),
            error = %error,
            "submission rejected before validation"
        );
        self.record(AuditLogEntry::failure(
            self.clock.now(),
            error.to_string(),
            form.snapshot(),
        ))
        .await;
        error
    }

    async fn process(
        &self,
        form: SubmissionForm,
        stage: &mut SubmissionStage,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let started_at = self.clock.now();
        let submission = form.into_submission(started_at.date(), &self.uploads)?;
        let guardian = &submission.guardian;

        // Held from the duplicate read through the row append.
        let _permit = self.intake_lock.lock().await;

        self.guard
            .check(&guardian.rut, &submission.child_identifiers())
            .await?;
        self.advance(stage, SubmissionStage::DuplicateChecked);

        let container = self
            .archiver
            .provision_container(&guardian.name, &guardian.rut, started_at.date())
            .await
            .map_err(SubmissionError::StorageProvision)?;
        self.advance(stage, SubmissionStage::ContainerCreated);

        let mut documents = Vec::new();
        let guardian_link = match submission.guardian_document {
            Some(upload) => {
                let name = guardian_document_name(&guardian.name);
                let document = self.archive(upload, &container, &name).await?;
                let link = document.view_link.clone();
                documents.push(document);
                Some(link)
            }
            None => None,
        };

        let mut child_links = Vec::with_capacity(submission.children.len());
        let mut records = Vec::with_capacity(submission.children.len());
        for child in submission.children {
            let link = match child.document {
                Some(upload) => {
                    let name = child_document_name(&child.record.name);
                    let document = self.archive(upload, &container, &name).await?;
                    let link = document.view_link.clone();
                    documents.push(document);
                    Some(link)
                }
                None => None,
            };
            child_links.push(link);
            records.push(child.record);
        }
        self.advance(stage, SubmissionStage::DocumentsArchived);

        let submitted_at = self.clock.now();
        let rows: Vec<Vec<String>> = records
            .iter()
            .zip(&child_links)
            .enumerate()
            .map(|(index, (record, link))| {
                build_row(
                    index as u32 + 1,
                    guardian,
                    records.len(),
                    record,
                    guardian_link.as_deref(),
                    link.as_deref(),
                    submitted_at,
                )
                .to_cells()
            })
            .collect();
        let rows_written = rows.len();
        self.advance(stage, SubmissionStage::RowsBuilt);

        let first_row = self
            .store
            .append_after_last(Table::Applications, rows)
            .await
            .map_err(|err| {
                error!(
                    container = %container.name,
                    error = %err,
                    "rows not written; archived documents left without a row"
                );
                SubmissionError::Persistence(err)
            })?;
        self.advance(stage, SubmissionStage::RowsAppended);

        Ok(SubmissionReceipt {
            container,
            documents,
            first_row,
            rows_written,
        })
    }

    async fn archive(
        &self,
        upload: StagedUpload,
        container: &StorageContainer,
        display_name: &str,
    ) -> Result<ArchivedDocument, SubmissionError> {
        let document = self
            .archiver
            .archive(upload, container, display_name)
            .await
            .map_err(SubmissionError::StorageUpload)?;

        if let Err(err) = self
            .store
            .append(Table::Files, vec![document.tracking_cells()])
            .await
        {
            warn!(file = %document.display_name, error = %err, "failed to track archived file");
        }

        Ok(document)
    }

    fn advance(&self, stage: &mut SubmissionStage, next: SubmissionStage) {
        debug!(from = stage.label(), to = next.label(), "submission stage");
        *stage = next;
    }

    async fn record(&self, entry: AuditLogEntry) {
        if let Err(err) = self.store.append(Table::Logs, vec![entry.to_cells()]).await {
            error!(status = entry.status.label(), error = %err, "failed to write audit log entry");
        }
    }
}
