use chrono::NaiveDate;
use serde::Serialize;

use super::archive::StagedUpload;
use super::identity::Rut;

/// Upper bound on children per submission.
pub const MAX_CHILDREN: usize = 2;

/// Relationship value that obliges the guardian to attach proof of custody.
pub const RELATIONSHIP_REQUIRING_PROOF: &str = "Otro familiar";

/// Guardian identity and contact data as captured on the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Guardian {
    pub name: String,
    pub rut: Rut,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub relationship: String,
}

/// One child applying for the scholarship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildRecord {
    pub name: String,
    pub rut: Rut,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub education_level: String,
    pub school: String,
}

/// A child together with the school document uploaded for them, if any.
#[derive(Debug)]
pub struct ChildApplication {
    pub record: ChildRecord,
    pub document: Option<StagedUpload>,
}

/// Structurally validated submission ready for duplicate screening.
#[derive(Debug)]
pub struct Submission {
    pub guardian: Guardian,
    pub guardian_document: Option<StagedUpload>,
    pub children: Vec<ChildApplication>,
}

impl Submission {
    pub fn child_identifiers(&self) -> Vec<&Rut> {
        self.children
            .iter()
            .map(|child| &child.record.rut)
            .collect()
    }
}

/// Per-submission folder in document storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageContainer {
    pub id: String,
    pub name: String,
}

/// A document that now lives inside a storage container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedDocument {
    pub storage_id: String,
    pub view_link: String,
    pub display_name: String,
}

impl ArchivedDocument {
    /// Cells for the files table: name, storage id, link.
    pub fn tracking_cells(&self) -> Vec<String> {
        vec![
            self.display_name.clone(),
            self.storage_id.clone(),
            self.view_link.clone(),
        ]
    }
}

pub fn guardian_document_name(guardian_name: &str) -> String {
    format!("{guardian_name} - Cuidado Personal")
}

pub fn child_document_name(child_name: &str) -> String {
    format!("{child_name} - Documento Estudiantil")
}
