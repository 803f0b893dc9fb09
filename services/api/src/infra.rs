use async_trait::async_trait;
use google_drive3::hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use google_drive3::hyper_util::client::legacy::connect::HttpConnector;
use google_drive3::hyper_util::client::legacy::Client;
use google_drive3::hyper_util::rt::TokioExecutor;
use google_drive3::yup_oauth2::{self, ServiceAccountAuthenticator, ServiceAccountKey};
use google_drive3::DriveHub;
use google_sheets4::Sheets;
use metrics_exporter_prometheus::PrometheusHandle;
use scholarship_intake::config::GoogleConfig;
use scholarship_intake::error::AppError;
use scholarship_intake::workflows::scholarship::{
    DriveFile, DriveGateway, DriveOperationError, GoogleDriveClient, GoogleSheetsStore, Row,
    StoreError, Table, TabularStore,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

pub(crate) type GoogleConnector = HttpsConnector<HttpConnector>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Spreadsheet stand-in for `--offline` runs. Rows live for the process lifetime.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemoryTabularStore {
    tables: Arc<Mutex<HashMap<Table, Vec<Row>>>>,
}

impl InMemoryTabularStore {
    fn with_tables<T>(
        &self,
        f: impl FnOnce(&mut HashMap<Table, Vec<Row>>) -> T,
    ) -> Result<T, StoreError> {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store poisoned".to_string()))?;
        Ok(f(&mut guard))
    }
}

#[async_trait]
impl TabularStore for InMemoryTabularStore {
    async fn read_column(&self, table: Table, column: usize) -> Result<Vec<String>, StoreError> {
        self.with_tables(|tables| {
            tables
                .get(&table)
                .map(|rows| {
                    rows.iter()
                        .map(|row| row.get(column).cloned().unwrap_or_default())
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    async fn append(&self, table: Table, rows: Vec<Row>) -> Result<(), StoreError> {
        self.with_tables(|tables| tables.entry(table).or_default().extend(rows))
    }

    async fn append_after_last(&self, table: Table, rows: Vec<Row>) -> Result<u32, StoreError> {
        self.with_tables(|tables| {
            let existing = tables.entry(table).or_default();
            let start = existing.len() as u32 + 1;
            existing.extend(rows);
            start
        })
    }
}

/// Drive stand-in for `--offline` runs. Uploaded bytes are counted, not kept.
#[derive(Debug, Default)]
pub(crate) struct InMemoryDrive {
    entries: Mutex<Vec<(String, String, usize)>>,
}

impl InMemoryDrive {
    fn record(&self, name: &str, parent: &str, size: usize) -> Result<String, DriveOperationError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| DriveOperationError::Backend("in-memory drive poisoned".to_string()))?;
        guard.push((name.to_string(), parent.to_string(), size));
        Ok(format!("offline-{}", guard.len()))
    }
}

#[async_trait]
impl DriveGateway for InMemoryDrive {
    async fn create_folder(
        &self,
        name: &str,
        parent_folder_id: &str,
    ) -> Result<String, DriveOperationError> {
        self.record(name, parent_folder_id, 0)
    }

    async fn upload_file(
        &self,
        name: &str,
        parent_folder_id: &str,
        _content_type: &mime::Mime,
        bytes: Vec<u8>,
    ) -> Result<DriveFile, DriveOperationError> {
        let file_id = self.record(name, parent_folder_id, bytes.len())?;
        Ok(DriveFile {
            web_view_link: format!("offline://{file_id}"),
            file_id,
            name: name.to_string(),
        })
    }
}

/// Authenticated Sheets and Drive clients sharing one HTTPS connector setup.
pub(crate) async fn google_clients(
    config: &GoogleConfig,
) -> Result<
    (
        GoogleSheetsStore<GoogleConnector>,
        GoogleDriveClient<GoogleConnector>,
    ),
    AppError,
> {
    let key: ServiceAccountKey = serde_json::from_value(json!({
        "type": "service_account",
        "client_email": config.client_email,
        "private_key": config.private_key,
        "token_uri": TOKEN_URI,
    }))
    .map_err(|err| AppError::Backend(format!("invalid service account key: {err}")))?;

    let connector = HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|err| AppError::Backend(format!("tls roots unavailable: {err}")))?
        .https_or_http()
        .enable_http1()
        .build();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let sheets_auth = authenticator(key.clone()).await?;
    let drive_auth = authenticator(key).await?;

    let store = GoogleSheetsStore::new(
        Sheets::new(client.clone(), sheets_auth),
        config.spreadsheet_id.clone(),
    );
    let drive = GoogleDriveClient::new(DriveHub::new(client, drive_auth));
    Ok((store, drive))
}

async fn authenticator(
    key: ServiceAccountKey,
) -> Result<yup_oauth2::authenticator::Authenticator<GoogleConnector>, AppError> {
    ServiceAccountAuthenticator::builder(key)
        .build()
        .await
        .map_err(|err| AppError::Backend(format!("service account auth failed: {err}")))
}
