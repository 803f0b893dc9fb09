//! Applications-table row layout.
//!
//! Rows are built as [`ApplicationRow`] values and only flattened to positional
//! cells by [`ApplicationRow::to_cells`]. The sheet is 25 columns wide (A..Y);
//! columns Q..W are reserved and always written blank.

use chrono::{NaiveDate, NaiveDateTime};

use super::audit::{DATE_FORMAT, TIME_FORMAT};
use super::domain::{ChildRecord, Guardian};
use super::store::Table;

/// Written in document columns when nothing was uploaded.
pub const NO_DOCUMENT_PLACEHOLDER: &str = "No se subió archivo";

pub const APPLICATION_ROW_WIDTH: usize = Table::Applications.width();

/// Zero-based column positions in the applications table.
pub mod columns {
    use std::ops::Range;

    pub const SEQUENCE: usize = 0;
    pub const GUARDIAN_NAME: usize = 1;
    pub const GUARDIAN_RUT: usize = 2;
    pub const ADDRESS: usize = 3;
    pub const PHONE: usize = 4;
    pub const EMAIL: usize = 5;
    pub const CHILDREN_COUNT: usize = 6;
    pub const GUARDIAN_DOCUMENT: usize = 7;
    pub const RELATIONSHIP: usize = 8;
    pub const CHILD_NAME: usize = 9;
    pub const CHILD_RUT: usize = 10;
    pub const BIRTH_DATE: usize = 11;
    pub const GENDER: usize = 12;
    pub const EDUCATION_LEVEL: usize = 13;
    pub const SCHOOL: usize = 14;
    pub const CHILD_DOCUMENT: usize = 15;
    pub const RESERVED: Range<usize> = 16..23;
    /// Second-child identifier slot from the earlier two-children-per-row
    /// layout. Still screened for duplicates; never written.
    pub const LEGACY_SECOND_CHILD_RUT: usize = 17;
    pub const SUBMITTED_DATE: usize = 23;
    pub const SUBMITTED_TIME: usize = 24;
}

/// One child's line in the applications table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRow {
    pub sequence: u32,
    pub guardian_name: String,
    pub guardian_rut: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub children_count: usize,
    pub guardian_document: Option<String>,
    pub relationship: String,
    pub child_name: String,
    pub child_rut: String,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub education_level: String,
    pub school: String,
    pub child_document: Option<String>,
    pub submitted_at: NaiveDateTime,
}

/// Assemble the row for `child`. Pure: identical inputs give identical rows.
pub fn build_row(
    sequence: u32,
    guardian: &Guardian,
    children_count: usize,
    child: &ChildRecord,
    guardian_document_link: Option<&str>,
    child_document_link: Option<&str>,
    submitted_at: NaiveDateTime,
) -> ApplicationRow {
    ApplicationRow {
        sequence,
        guardian_name: guardian.name.clone(),
        guardian_rut: guardian.rut.display_form(),
        address: guardian.address.clone(),
        phone: guardian.phone.clone(),
        email: guardian.email.clone(),
        children_count,
        guardian_document: guardian_document_link.map(str::to_string),
        relationship: guardian.relationship.clone(),
        child_name: child.name.clone(),
        child_rut: child.rut.display_form(),
        birth_date: child.birth_date,
        gender: child.gender.clone(),
        education_level: child.education_level.clone(),
        school: child.school.clone(),
        child_document: child_document_link.map(str::to_string),
        submitted_at,
    }
}

fn document_cell(link: &Option<String>) -> String {
    link.clone()
        .unwrap_or_else(|| NO_DOCUMENT_PLACEHOLDER.to_string())
}

impl ApplicationRow {
    pub fn to_cells(&self) -> Vec<String> {
        let mut cells = vec![String::new(); APPLICATION_ROW_WIDTH];

        cells[columns::SEQUENCE] = self.sequence.to_string();
        cells[columns::GUARDIAN_NAME] = self.guardian_name.clone();
        cells[columns::GUARDIAN_RUT] = self.guardian_rut.clone();
        cells[columns::ADDRESS] = self.address.clone();
        cells[columns::PHONE] = self.phone.clone();
        cells[columns::EMAIL] = self.email.clone();
        cells[columns::CHILDREN_COUNT] = self.children_count.to_string();
        cells[columns::GUARDIAN_DOCUMENT] = document_cell(&self.guardian_document);
        cells[columns::RELATIONSHIP] = self.relationship.clone();
        cells[columns::CHILD_NAME] = self.child_name.clone();
        cells[columns::CHILD_RUT] = self.child_rut.clone();
        cells[columns::BIRTH_DATE] = self.birth_date.format(DATE_FORMAT).to_string();
        cells[columns::GENDER] = self.gender.clone();
        cells[columns::EDUCATION_LEVEL] = self.education_level.clone();
        cells[columns::SCHOOL] = self.school.clone();
        cells[columns::CHILD_DOCUMENT] = document_cell(&self.child_document);
        cells[columns::SUBMITTED_DATE] = self.submitted_at.format(DATE_FORMAT).to_string();
        cells[columns::SUBMITTED_TIME] = self.submitted_at.format(TIME_FORMAT).to_string();

        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::scholarship::identity::Rut;

    fn guardian() -> Guardian {
        Guardian {
            name: "María Soto".to_string(),
            rut: Rut::parse("12345678-5").unwrap(),
            address: "Av. Los Pajaritos 1234".to_string(),
            phone: "+56912345678".to_string(),
            email: "maria@example.cl".to_string(),
            relationship: "Madre".to_string(),
        }
    }

    fn child() -> ChildRecord {
        ChildRecord {
            name: "Tomás Soto".to_string(),
            rut: Rut::parse("20000003-K").unwrap(),
            birth_date: NaiveDate::from_ymd_opt(2014, 3, 9).unwrap(),
            gender: "Masculino".to_string(),
            education_level: "4° básico".to_string(),
            school: "Escuela Lo Prado".to_string(),
        }
    }

    fn submitted_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, 4)
            .unwrap()
            .and_hms_opt(16, 42, 0)
            .unwrap()
    }

    #[test]
    fn places_fields_at_fixed_positions() {
        let row = build_row(
            1,
            &guardian(),
            1,
            &child(),
            Some("https://drive/g"),
            Some("https://drive/c"),
            submitted_at(),
        );
        let cells = row.to_cells();

        assert_eq!(cells.len(), 25);
        assert_eq!(cells[0], "1");
        assert_eq!(cells[2], "12.345.678-5");
        assert_eq!(cells[6], "1");
        assert_eq!(cells[7], "https://drive/g");
        assert_eq!(cells[8], "Madre");
        assert_eq!(cells[10], "20.000.003-K");
        assert_eq!(cells[11], "2014-03-09");
        assert_eq!(cells[13], "4° básico");
        assert_eq!(cells[14], "Escuela Lo Prado");
        assert_eq!(cells[15], "https://drive/c");
        assert!(cells[columns::RESERVED].iter().all(String::is_empty));
        assert_eq!(cells[23], "2024-11-04");
        assert_eq!(cells[24], "16:42:00");
    }

    #[test]
    fn missing_documents_render_placeholder() {
        let cells = build_row(2, &guardian(), 2, &child(), None, None, submitted_at()).to_cells();
        assert_eq!(cells[columns::GUARDIAN_DOCUMENT], NO_DOCUMENT_PLACEHOLDER);
        assert_eq!(cells[columns::CHILD_DOCUMENT], NO_DOCUMENT_PLACEHOLDER);
    }

    #[test]
    fn building_is_deterministic() {
        let first = build_row(1, &guardian(), 1, &child(), None, Some("l"), submitted_at());
        let second = build_row(1, &guardian(), 1, &child(), None, Some("l"), submitted_at());
        assert_eq!(first, second);
        assert_eq!(first.to_cells(), second.to_cells());
    }
}
