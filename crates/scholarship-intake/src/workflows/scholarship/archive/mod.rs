pub mod archiver;
pub mod drive;
pub mod staging;

pub use archiver::{ArchiveError, DocumentArchiver};
pub use drive::{DriveFile, DriveGateway, DriveOperationError, GoogleDriveClient};
pub use staging::{resolve_content_type, StagedUpload};
