use async_trait::async_trait;
use google_sheets4::api::{Scope, ValueRange};
use google_sheets4::Sheets;
use serde_json::Value;
use tracing::debug;

use super::{column_letter, ensure_width, Row, StoreError, Table, TabularStore};

const VALUE_INPUT_OPTION: &str = "USER_ENTERED";
const FORMULA_LEADERS: [char; 4] = ['=', '+', '-', '@'];

/// Google Sheets implementation of [`TabularStore`].
///
/// `append_after_last` is a read-then-write against the spreadsheet; callers
/// needing exclusivity must serialize around it.
pub struct GoogleSheetsStore<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    hub: Sheets<C>,
    spreadsheet_id: String,
}

impl<C> GoogleSheetsStore<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    pub fn new(hub: Sheets<C>, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            hub,
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    fn map_error<E: std::fmt::Display>(err: E) -> StoreError {
        StoreError::Unavailable(err.to_string())
    }

    fn full_width_range(table: Table) -> String {
        format!(
            "{}!A:{}",
            table.sheet_name(),
            column_letter(table.width() - 1)
        )
    }

    fn block_range(table: Table, start: u32, rows: usize) -> String {
        let end = start + rows.saturating_sub(1) as u32;
        format!(
            "{}!A{}:{}{}",
            table.sheet_name(),
            start,
            column_letter(table.width() - 1),
            end
        )
    }
}

impl<C> std::fmt::Debug for GoogleSheetsStore<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsStore")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .finish_non_exhaustive()
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Keeps applicant text from being parsed as a formula under `USER_ENTERED`.
/// Sheets strips the leading apostrophe and stores the text as typed.
fn literal_cell(cell: String) -> String {
    if cell.starts_with(FORMULA_LEADERS) {
        format!("'{cell}")
    } else {
        cell
    }
}

fn to_value_range(rows: Vec<Row>) -> ValueRange {
    ValueRange {
        values: Some(
            rows.into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|cell| Value::String(literal_cell(cell)))
                        .collect()
                })
                .collect(),
        ),
        ..ValueRange::default()
    }
}

#[async_trait]
impl<C> TabularStore for GoogleSheetsStore<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    async fn read_column(&self, table: Table, column: usize) -> Result<Vec<String>, StoreError> {
        let letter = column_letter(column);
        let range = format!("{}!{letter}:{letter}", table.sheet_name());

        let (_, response) = self
            .hub
            .spreadsheets()
            .values_get(&self.spreadsheet_id, &range)
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(GoogleSheetsStore::<C>::map_error)?;

        Ok(response
            .values
            .unwrap_or_default()
            .iter()
            .map(|row| row.first().map(cell_text).unwrap_or_default())
            .collect())
    }

    async fn append(&self, table: Table, rows: Vec<Row>) -> Result<(), StoreError> {
        ensure_width(table, &rows)?;
        let range = Self::full_width_range(table);

        self.hub
            .spreadsheets()
            .values_append(to_value_range(rows), &self.spreadsheet_id, &range)
            .value_input_option(VALUE_INPUT_OPTION)
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(GoogleSheetsStore::<C>::map_error)?;

        Ok(())
    }

    async fn append_after_last(&self, table: Table, rows: Vec<Row>) -> Result<u32, StoreError> {
        ensure_width(table, &rows)?;

        let occupied = self.read_column(table, 0).await?.len() as u32;
        let start = occupied + 1;
        let range = Self::block_range(table, start, rows.len());
        debug!(%range, "writing rows after last occupied row");

        self.hub
            .spreadsheets()
            .values_update(to_value_range(rows), &self.spreadsheet_id, &range)
            .value_input_option(VALUE_INPUT_OPTION)
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(GoogleSheetsStore::<C>::map_error)?;

        Ok(start)
    }
}
