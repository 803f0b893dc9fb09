use chrono::NaiveDate;
use tempfile::tempdir;

use super::common::*;
use crate::workflows::scholarship::identity::RutError;
use crate::workflows::scholarship::intake::ValidationError;

fn today() -> NaiveDate {
    submitted_at().date()
}

#[test]
fn valid_form_becomes_a_canonical_submission() {
    let dir = tempdir().expect("tempdir");
    let mut form = base_form(2);
    form.insert_field("parentRUT", "12345678-5");
    form.insert_upload(stage(dir.path(), "document1", "matricula.pdf", b"%PDF-1.4"));

    let submission = form
        .into_submission(today(), &upload_config(dir.path()))
        .expect("valid submission");

    assert_eq!(submission.guardian.rut.to_string(), GUARDIAN_RUT);
    assert_eq!(submission.guardian.relationship, "Madre");
    assert!(submission.guardian_document.is_none());
    assert_eq!(submission.children.len(), 2);
    assert!(submission.children[0].document.is_none());
    assert_eq!(
        submission.children[1]
            .document
            .as_ref()
            .map(|upload| upload.original_name()),
        Some("matricula.pdf")
    );
    assert_eq!(submission.children[0].record.rut.to_string(), FIRST_CHILD_RUT);
    assert_eq!(
        submission.children[0].record.birth_date,
        NaiveDate::from_ymd_opt(2014, 3, 9).expect("date")
    );
}

#[test]
fn missing_guardian_field_is_named() {
    let dir = tempdir().expect("tempdir");
    let mut form = base_form(1);
    form.insert_field("address", "   ");

    match form.into_submission(today(), &upload_config(dir.path())) {
        Err(ValidationError::MissingField(field)) => assert_eq!(field, "address"),
        other => panic!("expected missing address, got {other:?}"),
    }
}

#[test]
fn children_count_outside_one_to_two_is_rejected() {
    let dir = tempdir().expect("tempdir");
    for raw in ["0", "3", "dos"] {
        let mut form = base_form(1);
        form.insert_field("childrenCount", raw);

        match form.into_submission(today(), &upload_config(dir.path())) {
            Err(ValidationError::ChildrenCount(value)) => assert_eq!(value, raw),
            other => panic!("expected children count error for {raw}, got {other:?}"),
        }
    }
}

#[test]
fn declared_child_without_payload_is_missing() {
    let dir = tempdir().expect("tempdir");
    let mut form = base_form(1);
    form.insert_field("childrenCount", "2");

    match form.into_submission(today(), &upload_config(dir.path())) {
        Err(ValidationError::MissingField(field)) => assert_eq!(field, "child1"),
        other => panic!("expected missing child1, got {other:?}"),
    }
}

#[test]
fn child_payload_must_be_json() {
    let dir = tempdir().expect("tempdir");
    let mut form = base_form(1);
    form.insert_field("child0", "{not json");

    match form.into_submission(today(), &upload_config(dir.path())) {
        Err(ValidationError::MalformedChild { field, .. }) => assert_eq!(field, "child0"),
        other => panic!("expected malformed child, got {other:?}"),
    }
}

#[test]
fn child_identifier_checksum_is_verified() {
    let dir = tempdir().expect("tempdir");
    let mut form = base_form(1);
    form.insert_field("child0", child_json("Ana Soto", "20.000.003-1"));

    match form.into_submission(today(), &upload_config(dir.path())) {
        Err(ValidationError::Identifier { field, source }) => {
            assert_eq!(field, "child0.childRUT");
            assert!(matches!(source, RutError::ChecksumMismatch(_)));
        }
        other => panic!("expected checksum failure, got {other:?}"),
    }
}

#[test]
fn future_birth_date_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let mut form = base_form(1);
    let child = child_json("Ana Soto", FIRST_CHILD_RUT).replace("2014-03-09", "2030-01-01");
    form.insert_field("child0", child);

    match form.into_submission(today(), &upload_config(dir.path())) {
        Err(ValidationError::InvalidField { field, .. }) => assert_eq!(field, "child0.birthDate"),
        other => panic!("expected future birth date rejection, got {other:?}"),
    }
}

#[test]
fn same_identifier_twice_in_one_submission_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let mut form = base_form(2);
    form.insert_field("child1", child_json("Luis Soto", "20000003k"));

    match form.into_submission(today(), &upload_config(dir.path())) {
        Err(ValidationError::RepeatedIdentifier(rut)) => assert_eq!(rut, FIRST_CHILD_RUT),
        other => panic!("expected repeated identifier, got {other:?}"),
    }
}

#[test]
fn other_relative_must_attach_custody_proof() {
    let dir = tempdir().expect("tempdir");
    let mut form = base_form(1);
    form.insert_field("parentRelationship", "Otro familiar");

    match form.into_submission(today(), &upload_config(dir.path())) {
        Err(ValidationError::MissingCustodyProof) => {}
        other => panic!("expected missing custody proof, got {other:?}"),
    }

    let mut form = base_form(1);
    form.insert_field("parentRelationship", "Otro familiar");
    form.insert_upload(stage(dir.path(), "parentDocument", "tuicion.png", b"\x89PNG"));
    let submission = form
        .into_submission(today(), &upload_config(dir.path()))
        .expect("proof attached");
    assert!(submission.guardian_document.is_some());
}

#[test]
fn documents_are_limited_by_type_and_size() {
    let dir = tempdir().expect("tempdir");

    let mut form = base_form(1);
    form.insert_upload(stage(dir.path(), "document0", "notas.docx", b"PK"));
    match form.into_submission(today(), &upload_config(dir.path())) {
        Err(ValidationError::UnsupportedFileType { field, .. }) => assert_eq!(field, "document0"),
        other => panic!("expected unsupported type, got {other:?}"),
    }

    let mut form = base_form(1);
    form.insert_upload(stage(dir.path(), "document0", "notas.pdf", &[0u8; 2048]));
    match form.into_submission(today(), &upload_config(dir.path())) {
        Err(ValidationError::FileTooLarge { field }) => assert_eq!(field, "document0"),
        other => panic!("expected oversized file, got {other:?}"),
    }

    assert_eq!(staged_files(dir.path()), 0);
}

#[test]
fn snapshot_keeps_text_fields_only() {
    let dir = tempdir().expect("tempdir");
    let mut form = base_form(1);
    form.insert_upload(stage(dir.path(), "document0", "notas.pdf", b"%PDF"));

    let snapshot = form.snapshot();
    assert_eq!(snapshot["parentRUT"], GUARDIAN_RUT);
    assert_eq!(snapshot["childrenCount"], "1");
    assert!(snapshot.get("document0").is_none());
    assert_eq!(
        form.upload("document0").map(|upload| upload.original_name()),
        Some("notas.pdf")
    );
    assert!(form.upload("parentDocument").is_none());
}
