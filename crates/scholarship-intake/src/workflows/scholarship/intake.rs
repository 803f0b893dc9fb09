//! Multipart intake and structural re-validation of the submission form.

use std::collections::{BTreeMap, HashSet};

use axum::extract::Multipart;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::archive::{resolve_content_type, StagedUpload};
use super::domain::{
    ChildApplication, ChildRecord, Guardian, Submission, MAX_CHILDREN,
    RELATIONSHIP_REQUIRING_PROOF,
};
use super::identity::{Rut, RutError};
use crate::config::UploadConfig;

pub const GUARDIAN_DOCUMENT_FIELD: &str = "parentDocument";
pub const CHILDREN_COUNT_FIELD: &str = "childrenCount";

const ACCEPTED_DOCUMENT_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/png"];

pub fn child_field(index: usize) -> String {
    format!("child{index}")
}

pub fn child_document_field(index: usize) -> String {
    format!("document{index}")
}

fn is_document_field(name: &str) -> bool {
    name == GUARDIAN_DOCUMENT_FIELD
        || (0..MAX_CHILDREN).any(|index| name == child_document_field(index))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("El campo {0} es obligatorio")]
    MissingField(String),
    #[error("El campo {field} es inválido: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("{field}: {source}")]
    Identifier {
        field: String,
        #[source]
        source: RutError,
    },
    #[error("Número de niños/as inválido: {0}")]
    ChildrenCount(String),
    #[error("Los datos de {field} no son válidos: {reason}")]
    MalformedChild { field: String, reason: String },
    #[error("El RUT {0} está repetido en la postulación")]
    RepeatedIdentifier(String),
    #[error("Debe adjuntar documento que acredite la relación con el menor")]
    MissingCustodyProof,
    #[error("El archivo {field} es muy grande")]
    FileTooLarge { field: String },
    #[error("Formato no soportado para {field}: {content_type}")]
    UnsupportedFileType { field: String, content_type: String },
    #[error("No se pudo leer la solicitud: {0}")]
    Transport(String),
}

/// Raw text fields and staged files exactly as received.
#[derive(Debug, Default)]
pub struct SubmissionForm {
    fields: BTreeMap<String, String>,
    uploads: BTreeMap<String, StagedUpload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ChildPayload {
    child_name: String,
    #[serde(rename = "childRUT")]
    child_rut: String,
    birth_date: String,
    gender: String,
    education_level: String,
    school: String,
}

impl SubmissionForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn insert_upload(&mut self, upload: StagedUpload) {
        self.uploads.insert(upload.field().to_string(), upload);
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn upload(&self, name: &str) -> Option<&StagedUpload> {
        self.uploads.get(name)
    }

    /// JSON object of the text fields, recorded verbatim in the audit log.
    pub fn snapshot(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        Value::Object(map)
    }

    /// Validate the raw form into a [`Submission`]. `today` bounds birth dates.
    pub fn into_submission(
        mut self,
        today: NaiveDate,
        policy: &UploadConfig,
    ) -> Result<Submission, ValidationError> {
        let guardian = self.guardian()?;

        let raw_count = self.required(CHILDREN_COUNT_FIELD)?;
        let children_count = raw_count
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|count| (1..=MAX_CHILDREN).contains(count))
            .ok_or_else(|| ValidationError::ChildrenCount(raw_count.clone()))?;

        let mut records = Vec::with_capacity(children_count);
        for index in 0..children_count {
            records.push(self.child(index, today)?);
        }

        let mut seen = HashSet::new();
        for rut in std::iter::once(&guardian.rut).chain(records.iter().map(|child| &child.rut)) {
            if !seen.insert(rut.compact()) {
                return Err(ValidationError::RepeatedIdentifier(rut.display_form()));
            }
        }

        let guardian_document = self.take_document(GUARDIAN_DOCUMENT_FIELD, policy)?;
        if guardian.relationship == RELATIONSHIP_REQUIRING_PROOF && guardian_document.is_none() {
            return Err(ValidationError::MissingCustodyProof);
        }

        let mut children = Vec::with_capacity(children_count);
        for (index, record) in records.into_iter().enumerate() {
            let document = self.take_document(&child_document_field(index), policy)?;
            children.push(ChildApplication { record, document });
        }

        Ok(Submission {
            guardian,
            guardian_document,
            children,
        })
    }

    fn required(&self, field: &str) -> Result<String, ValidationError> {
        match self.field(field).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(ValidationError::MissingField(field.to_string())),
        }
    }

    fn guardian(&self) -> Result<Guardian, ValidationError> {
        let name = self.required("parentName")?;
        ensure_min_chars("parentName", &name, 2)?;
        let rut = parse_rut("parentRUT", &self.required("parentRUT")?)?;
        let address = self.required("address")?;
        ensure_min_chars("address", &address, 5)?;
        let phone = self.required("phone")?;
        if !is_phone_number(&phone) {
            return Err(invalid("phone", "formato de teléfono inválido"));
        }
        let email = self.required("email")?;
        if !is_email(&email) {
            return Err(invalid("email", "correo inválido"));
        }
        let relationship = self.required("parentRelationship")?;

        Ok(Guardian {
            name,
            rut,
            address,
            phone,
            email,
            relationship,
        })
    }

    fn child(&self, index: usize, today: NaiveDate) -> Result<ChildRecord, ValidationError> {
        let field = child_field(index);
        let raw = self.required(&field)?;
        let payload: ChildPayload =
            serde_json::from_str(&raw).map_err(|err| ValidationError::MalformedChild {
                field: field.clone(),
                reason: err.to_string(),
            })?;

        let scoped = |name: &str| format!("{field}.{name}");
        let required = |name: &str, value: &str| {
            let value = value.trim();
            if value.is_empty() {
                Err(ValidationError::MissingField(scoped(name)))
            } else {
                Ok(value.to_string())
            }
        };

        let name = required("childName", &payload.child_name)?;
        ensure_min_chars(&scoped("childName"), &name, 2)?;
        let rut = parse_rut(&scoped("childRUT"), &payload.child_rut)?;

        let raw_birth_date = required("birthDate", &payload.birth_date)?;
        let birth_date = NaiveDate::parse_from_str(&raw_birth_date, "%Y-%m-%d")
            .map_err(|_| invalid(&scoped("birthDate"), "se espera AAAA-MM-DD"))?;
        if birth_date > today {
            return Err(invalid(&scoped("birthDate"), "la fecha no puede ser futura"));
        }

        let gender = required("gender", &payload.gender)?;
        let education_level = required("educationLevel", &payload.education_level)?;
        let school = required("school", &payload.school)?;
        ensure_min_chars(&scoped("school"), &school, 3)?;

        Ok(ChildRecord {
            name,
            rut,
            birth_date,
            gender,
            education_level,
            school,
        })
    }

    fn take_document(
        &mut self,
        field: &str,
        policy: &UploadConfig,
    ) -> Result<Option<StagedUpload>, ValidationError> {
        let Some(upload) = self.uploads.remove(field) else {
            return Ok(None);
        };

        if upload.size() > policy.max_file_bytes {
            return Err(ValidationError::FileTooLarge {
                field: field.to_string(),
            });
        }
        let essence = upload.content_type().essence_str();
        if !ACCEPTED_DOCUMENT_TYPES.contains(&essence) {
            return Err(ValidationError::UnsupportedFileType {
                field: field.to_string(),
                content_type: essence.to_string(),
            });
        }

        Ok(Some(upload))
    }
}

fn invalid(field: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn ensure_min_chars(field: &str, value: &str, min: usize) -> Result<(), ValidationError> {
    if value.chars().count() < min {
        return Err(invalid(
            field,
            &format!("debe tener al menos {min} caracteres"),
        ));
    }
    Ok(())
}

fn parse_rut(field: &str, raw: &str) -> Result<Rut, ValidationError> {
    Rut::parse(raw).map_err(|source| ValidationError::Identifier {
        field: field.to_string(),
        source,
    })
}

fn is_phone_number(value: &str) -> bool {
    let digits = value.strip_prefix('+').unwrap_or(value);
    (9..=12).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !local.is_empty()
        && !host.is_empty()
        && !tld.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
}

/// Drain a multipart body into `form`, staging document parts on disk.
///
/// Parts read before a failure stay in `form` so the rejected attempt can
/// still be logged with what was received.
pub async fn read_multipart(
    multipart: &mut Multipart,
    policy: &UploadConfig,
    form: &mut SubmissionForm,
) -> Result<(), ValidationError> {
    let transport = |err: axum::extract::multipart::MultipartError| {
        ValidationError::Transport(err.body_text())
    };

    while let Some(mut field) = multipart.next_field().await.map_err(transport)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field.text().await.map_err(transport)?;
            form.insert_field(name, value);
            continue;
        };

        if !is_document_field(&name) {
            while field.chunk().await.map_err(transport)?.is_some() {}
            continue;
        }

        let content_type = resolve_content_type(field.content_type(), &file_name);
        let mut staged = StagedUpload::create_in(&policy.directory, &name, &file_name, content_type)
            .map_err(|err| ValidationError::Transport(err.to_string()))?;

        while let Some(chunk) = field.chunk().await.map_err(transport)? {
            if staged.size() + chunk.len() as u64 > policy.max_file_bytes {
                return Err(ValidationError::FileTooLarge { field: name });
            }
            staged
                .write_chunk(&chunk)
                .map_err(|err| ValidationError::Transport(err.to_string()))?;
        }

        form.insert_upload(staged);
    }

    Ok(())
}
