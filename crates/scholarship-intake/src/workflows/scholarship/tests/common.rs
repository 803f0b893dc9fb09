use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use mime::Mime;
use serde_json::{json, Value};

use crate::config::UploadConfig;
use crate::workflows::scholarship::archive::{
    DriveFile, DriveGateway, DriveOperationError, StagedUpload,
};
use crate::workflows::scholarship::audit::Clock;
use crate::workflows::scholarship::intake::SubmissionForm;
use crate::workflows::scholarship::rows::columns;
use crate::workflows::scholarship::service::{IntakeSettings, ScholarshipIntakeService};
use crate::workflows::scholarship::store::{Row, StoreError, Table, TabularStore};

pub(super) const GUARDIAN_RUT: &str = "12.345.678-5";
pub(super) const FIRST_CHILD_RUT: &str = "20.000.003-K";
pub(super) const SECOND_CHILD_RUT: &str = "15.000.001-7";
pub(super) const PARENT_FOLDER: &str = "folder-root";

#[derive(Default)]
pub(super) struct MemoryStore {
    tables: Mutex<HashMap<Table, Vec<Row>>>,
    column_reads: AtomicUsize,
    block_appends: AtomicUsize,
    pub(super) fail_reads: AtomicBool,
    pub(super) fail_block_append: AtomicBool,
    pub(super) fail_logs: AtomicBool,
}

impl MemoryStore {
    pub(super) fn rows(&self, table: Table) -> Vec<Row> {
        self.tables
            .lock()
            .expect("store mutex")
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    pub(super) fn seed_application(&self, guardian_rut: &str, child_rut: &str) {
        let mut row = vec![String::new(); Table::Applications.width()];
        row[columns::SEQUENCE] = "1".to_string();
        row[columns::GUARDIAN_RUT] = guardian_rut.to_string();
        row[columns::CHILD_RUT] = child_rut.to_string();
        self.tables
            .lock()
            .expect("store mutex")
            .entry(Table::Applications)
            .or_default()
            .push(row);
    }

    pub(super) fn column_reads(&self) -> usize {
        self.column_reads.load(Ordering::SeqCst)
    }

    pub(super) fn block_appends(&self) -> usize {
        self.block_appends.load(Ordering::SeqCst)
    }

    pub(super) fn log_statuses(&self) -> Vec<String> {
        self.rows(Table::Logs)
            .into_iter()
            .map(|row| row[1].clone())
            .collect()
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn read_column(&self, table: Table, column: usize) -> Result<Vec<String>, StoreError> {
        self.column_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("read quota exceeded".to_string()));
        }
        Ok(self
            .rows(table)
            .iter()
            .map(|row| row.get(column).cloned().unwrap_or_default())
            .collect())
    }

    async fn append(&self, table: Table, rows: Vec<Row>) -> Result<(), StoreError> {
        if table == Table::Logs && self.fail_logs.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("logs sheet locked".to_string()));
        }
        self.tables
            .lock()
            .expect("store mutex")
            .entry(table)
            .or_default()
            .extend(rows);
        Ok(())
    }

    async fn append_after_last(&self, table: Table, rows: Vec<Row>) -> Result<u32, StoreError> {
        self.block_appends.fetch_add(1, Ordering::SeqCst);
        if self.fail_block_append.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write rejected".to_string()));
        }
        let mut tables = self.tables.lock().expect("store mutex");
        let existing = tables.entry(table).or_default();
        let start = existing.len() as u32 + 1;
        existing.extend(rows);
        Ok(start)
    }
}

#[derive(Debug, Clone)]
pub(super) struct StoredFile {
    pub(super) id: String,
    pub(super) name: String,
    pub(super) folder_id: String,
    pub(super) content_type: String,
    pub(super) bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub(super) struct MemoryDrive {
    folders: Mutex<Vec<(String, String, String)>>,
    files: Mutex<Vec<StoredFile>>,
    pub(super) fail_folders: AtomicBool,
    pub(super) fail_uploads: AtomicBool,
}

impl MemoryDrive {
    /// `(id, name, parent)` for every folder created.
    pub(super) fn folders(&self) -> Vec<(String, String, String)> {
        self.folders.lock().expect("drive mutex").clone()
    }

    pub(super) fn files(&self) -> Vec<StoredFile> {
        self.files.lock().expect("drive mutex").clone()
    }
}

#[async_trait]
impl DriveGateway for MemoryDrive {
    async fn create_folder(
        &self,
        name: &str,
        parent_folder_id: &str,
    ) -> Result<String, DriveOperationError> {
        if self.fail_folders.load(Ordering::SeqCst) {
            return Err(DriveOperationError::Backend("quota exceeded".to_string()));
        }
        let mut folders = self.folders.lock().expect("drive mutex");
        let id = format!("folder-{}", folders.len() + 1);
        folders.push((id.clone(), name.to_string(), parent_folder_id.to_string()));
        Ok(id)
    }

    async fn upload_file(
        &self,
        name: &str,
        parent_folder_id: &str,
        content_type: &Mime,
        bytes: Vec<u8>,
    ) -> Result<DriveFile, DriveOperationError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(DriveOperationError::Backend("connection reset".to_string()));
        }
        let mut files = self.files.lock().expect("drive mutex");
        let id = format!("file-{}", files.len() + 1);
        files.push(StoredFile {
            id: id.clone(),
            name: name.to_string(),
            folder_id: parent_folder_id.to_string(),
            content_type: content_type.essence_str().to_string(),
            bytes,
        });
        Ok(DriveFile {
            web_view_link: format!("https://drive.test/{id}/view"),
            file_id: id,
            name: name.to_string(),
        })
    }
}

pub(super) struct FixedClock(pub(super) NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub(super) fn submitted_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 11, 4)
        .and_then(|date| date.and_hms_opt(16, 42, 5))
        .expect("valid timestamp")
}

pub(super) fn upload_config(directory: &Path) -> UploadConfig {
    UploadConfig {
        directory: directory.to_path_buf(),
        max_file_bytes: 1024,
        retain_failed: false,
    }
}

pub(super) fn build_service(
    store: Arc<MemoryStore>,
    drive: Arc<MemoryDrive>,
    uploads: UploadConfig,
) -> ScholarshipIntakeService<MemoryStore, MemoryDrive> {
    ScholarshipIntakeService::with_clock(
        store,
        drive,
        IntakeSettings {
            parent_folder_id: PARENT_FOLDER.to_string(),
            uploads,
        },
        Arc::new(FixedClock(submitted_at())),
    )
}

pub(super) fn child_json(name: &str, rut: &str) -> String {
    json!({
        "childName": name,
        "childRUT": rut,
        "birthDate": "2014-03-09",
        "gender": "Femenino",
        "educationLevel": "4° básico",
        "school": "Escuela Lo Prado",
        "document": Value::Null,
    })
    .to_string()
}

pub(super) fn guardian_fields() -> Vec<(&'static str, String)> {
    vec![
        ("parentName", "María Soto".to_string()),
        ("parentRUT", GUARDIAN_RUT.to_string()),
        ("address", "Av. Los Pajaritos 1234".to_string()),
        ("phone", "+56912345678".to_string()),
        ("email", "maria@example.cl".to_string()),
        ("parentRelationship", "Madre".to_string()),
    ]
}

/// A valid form with `children` children (1 or 2) and no documents.
pub(super) fn base_form(children: usize) -> SubmissionForm {
    let mut form = SubmissionForm::new();
    for (name, value) in guardian_fields() {
        form.insert_field(name, value);
    }
    form.insert_field("childrenCount", children.to_string());
    form.insert_field("child0", child_json("Ana Soto", FIRST_CHILD_RUT));
    if children > 1 {
        form.insert_field("child1", child_json("Luis Soto", SECOND_CHILD_RUT));
    }
    form
}

pub(super) fn stage(directory: &Path, field: &str, file_name: &str, bytes: &[u8]) -> StagedUpload {
    let content_type = crate::workflows::scholarship::archive::resolve_content_type(None, file_name);
    StagedUpload::from_bytes(directory, field, file_name, content_type, bytes)
        .expect("stage upload")
}

/// Files currently staged in `directory`.
pub(super) fn staged_files(directory: &Path) -> usize {
    std::fs::read_dir(directory)
        .map(|entries| entries.count())
        .unwrap_or(0)
}

pub(super) const BOUNDARY: &str = "----scholarship-test-boundary";

pub(super) fn multipart_body(
    fields: &[(&str, String)],
    files: &[(&str, &str, &str, &[u8])],
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, content_type, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
