use std::fmt::Debug;
use std::io::Cursor;

use async_trait::async_trait;
use google_drive3::{api::File, api::Scope, DriveHub};
use mime::Mime;

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A file created in Drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveFile {
    pub file_id: String,
    pub name: String,
    pub web_view_link: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DriveOperationError {
    #[error("drive operation failed: {0}")]
    Backend(String),
    #[error("drive response missing {0}")]
    MissingField(&'static str),
}

#[async_trait]
pub trait DriveGateway: Debug + Send + Sync {
    /// Create a folder under `parent_folder_id`, returning the new folder id.
    async fn create_folder(
        &self,
        name: &str,
        parent_folder_id: &str,
    ) -> Result<String, DriveOperationError>;

    async fn upload_file(
        &self,
        name: &str,
        parent_folder_id: &str,
        content_type: &Mime,
        bytes: Vec<u8>,
    ) -> Result<DriveFile, DriveOperationError>;
}

/// Thin wrapper around the generated google-drive3 client.
pub struct GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    hub: DriveHub<C>,
}

impl<C> GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    pub fn new(hub: DriveHub<C>) -> Self {
        Self { hub }
    }

    fn map_error<E: std::fmt::Display>(err: E) -> DriveOperationError {
        DriveOperationError::Backend(err.to_string())
    }
}

impl<C> std::fmt::Debug for GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDriveClient").finish_non_exhaustive()
    }
}

/// Folders are created as empty uploads carrying the folder MIME type.
fn folder_mime_type() -> Result<Mime, DriveOperationError> {
    FOLDER_MIME_TYPE
        .parse::<Mime>()
        .map_err(|err| DriveOperationError::Backend(format!("invalid folder mime type: {err}")))
}

/// Link used when Drive omits `webViewLink` from the create response.
pub fn fallback_view_link(file_id: &str) -> String {
    format!("https://drive.google.com/file/d/{file_id}/view")
}

#[async_trait]
impl<C> DriveGateway for GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    async fn create_folder(
        &self,
        name: &str,
        parent_folder_id: &str,
    ) -> Result<String, DriveOperationError> {
        let metadata = File {
            name: Some(name.to_string()),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            parents: Some(vec![parent_folder_id.to_string()]),
            ..File::default()
        };

        let (_, folder) = self
            .hub
            .files()
            .create(metadata)
            .param("fields", "id")
            .supports_all_drives(true)
            .add_scope(Scope::Full)
            .upload(Cursor::new(Vec::<u8>::new()), folder_mime_type()?)
            .await
            .map_err(GoogleDriveClient::<C>::map_error)?;

        folder.id.ok_or(DriveOperationError::MissingField("id"))
    }

    async fn upload_file(
        &self,
        name: &str,
        parent_folder_id: &str,
        content_type: &Mime,
        bytes: Vec<u8>,
    ) -> Result<DriveFile, DriveOperationError> {
        let metadata = File {
            name: Some(name.to_string()),
            parents: Some(vec![parent_folder_id.to_string()]),
            ..File::default()
        };

        let (_, file) = self
            .hub
            .files()
            .create(metadata)
            .param("fields", "id,name,webViewLink")
            .supports_all_drives(true)
            .add_scope(Scope::Full)
            .upload(Cursor::new(bytes), content_type.clone())
            .await
            .map_err(GoogleDriveClient::<C>::map_error)?;

        let file_id = file.id.ok_or(DriveOperationError::MissingField("id"))?;
        let web_view_link = file
            .web_view_link
            .unwrap_or_else(|| fallback_view_link(&file_id));

        Ok(DriveFile {
            name: file.name.unwrap_or_else(|| name.to_string()),
            file_id,
            web_view_link,
        })
    }
}
