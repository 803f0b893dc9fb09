//! Scholarship application intake.
//!
//! A submission flows through duplicate screening against the applications
//! table, provisioning of a per-guardian Drive folder, document archiving, row
//! construction and a single multi-row append. Every attempt, accepted or not,
//! leaves one entry in the logs table.
//!
//! Nothing here compensates for late failures: a failed append leaves the
//! folder and its documents in Drive with no matching row.

pub mod archive;
pub mod audit;
pub mod domain;
pub mod duplicates;
pub mod identity;
pub mod intake;
pub mod router;
pub mod rows;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use archive::{
    ArchiveError, DocumentArchiver, DriveFile, DriveGateway, DriveOperationError,
    GoogleDriveClient, StagedUpload,
};
pub use audit::{AuditLogEntry, AuditStatus, Clock, SystemClock};
pub use domain::{
    ArchivedDocument, ChildApplication, ChildRecord, Guardian, StorageContainer, Submission,
};
pub use duplicates::{DuplicateCheckError, DuplicateGuard, DuplicateIdentifier};
pub use identity::{Rut, RutError};
pub use intake::{read_multipart, SubmissionForm, ValidationError};
pub use router::{cors_layer, intake_router, SUBMISSION_PATH};
pub use rows::{build_row, ApplicationRow, NO_DOCUMENT_PLACEHOLDER};
pub use service::{
    IntakeSettings, ScholarshipIntakeService, SubmissionError, SubmissionReceipt,
    SubmissionStage,
};
pub use store::{GoogleSheetsStore, Row, StoreError, Table, TabularStore};
