//! Tabular backing store: the applications, logs and files sheets.

pub mod sheets;

use async_trait::async_trait;

pub use sheets::GoogleSheetsStore;

/// One row of cells, left to right.
pub type Row = Vec<String>;

/// Logical tables the intake pipeline writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Applications,
    Logs,
    Files,
}

impl Table {
    pub const fn sheet_name(self) -> &'static str {
        match self {
            Table::Applications => "formulario",
            Table::Logs => "logs",
            Table::Files => "files",
        }
    }

    /// Number of columns every row of this table carries.
    pub const fn width(self) -> usize {
        match self {
            Table::Applications => 25,
            Table::Logs => 4,
            Table::Files => 3,
        }
    }
}

/// Range-based reads and append-only writes against the backing store.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Every cell of one column, top to bottom. Blank cells come back as `""`.
    async fn read_column(&self, table: Table, column: usize) -> Result<Vec<String>, StoreError>;

    /// Append rows after whatever the store considers the end of the table.
    async fn append(&self, table: Table, rows: Vec<Row>) -> Result<(), StoreError>;

    /// Write `rows` as one contiguous block directly after the last occupied
    /// row and return the 1-based position of the first written row.
    async fn append_after_last(&self, table: Table, rows: Vec<Row>) -> Result<u32, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("row for {table:?} has {found} cells, expected {expected}")]
    RowWidth {
        table: Table,
        expected: usize,
        found: usize,
    },
}

/// Reject rows whose width does not match the table layout.
pub fn ensure_width(table: Table, rows: &[Row]) -> Result<(), StoreError> {
    match rows.iter().find(|row| row.len() != table.width()) {
        Some(row) => Err(StoreError::RowWidth {
            table,
            expected: table.width(),
            found: row.len(),
        }),
        None => Ok(()),
    }
}

/// Spreadsheet column letter for a zero-based index (`0` → `A`, `26` → `AA`).
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = index + 1;
    while remaining > 0 {
        let offset = (remaining - 1) % 26;
        letters.push(char::from(b'A' + offset as u8));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}
