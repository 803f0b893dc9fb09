use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::common::*;
use crate::workflows::scholarship::duplicates::{DuplicateCheckError, DuplicateGuard};
use crate::workflows::scholarship::identity::Rut;
use crate::workflows::scholarship::rows::columns;
use crate::workflows::scholarship::store::{Table, TabularStore};

fn rut(raw: &str) -> Rut {
    Rut::parse(raw).expect("valid rut")
}

#[tokio::test]
async fn clean_table_passes() {
    let store = Arc::new(MemoryStore::default());
    let guard = DuplicateGuard::new(store.clone());

    guard
        .check(&rut(GUARDIAN_RUT), &[&rut(FIRST_CHILD_RUT)])
        .await
        .expect("no duplicates");
    assert_eq!(store.column_reads(), 3);
}

#[tokio::test]
async fn stored_identifiers_match_regardless_of_formatting() {
    let store = Arc::new(MemoryStore::default());
    store.seed_application("11.111.111-1", "20000003-k");
    let guard = DuplicateGuard::new(store);

    match guard
        .check(&rut(GUARDIAN_RUT), &[&rut(FIRST_CHILD_RUT)])
        .await
    {
        Err(DuplicateCheckError::Duplicate(duplicate)) => {
            assert_eq!(duplicate.0, FIRST_CHILD_RUT);
            assert_eq!(
                duplicate.to_string(),
                "El RUT 20.000.003-K ya está registrado en el sistema"
            );
        }
        other => panic!("expected duplicate child, got {other:?}"),
    }
}

#[tokio::test]
async fn guardian_is_reported_before_children() {
    let store = Arc::new(MemoryStore::default());
    store.seed_application(GUARDIAN_RUT, FIRST_CHILD_RUT);
    let guard = DuplicateGuard::new(store);

    match guard
        .check(&rut(GUARDIAN_RUT), &[&rut(FIRST_CHILD_RUT)])
        .await
    {
        Err(DuplicateCheckError::Duplicate(duplicate)) => assert_eq!(duplicate.0, GUARDIAN_RUT),
        other => panic!("expected duplicate guardian, got {other:?}"),
    }
}

#[tokio::test]
async fn legacy_second_child_column_is_screened() {
    let store = Arc::new(MemoryStore::default());
    let mut row = vec![String::new(); Table::Applications.width()];
    row[columns::LEGACY_SECOND_CHILD_RUT] = "15.000.001-7".to_string();
    store
        .append(Table::Applications, vec![row])
        .await
        .expect("seed legacy row");
    let guard = DuplicateGuard::new(store);

    match guard
        .check(&rut(GUARDIAN_RUT), &[&rut(FIRST_CHILD_RUT), &rut(SECOND_CHILD_RUT)])
        .await
    {
        Err(DuplicateCheckError::Duplicate(duplicate)) => {
            assert_eq!(duplicate.0, SECOND_CHILD_RUT)
        }
        other => panic!("expected legacy duplicate, got {other:?}"),
    }
}

#[tokio::test]
async fn child_names_are_not_mistaken_for_identifiers() {
    let store = Arc::new(MemoryStore::default());
    let mut row = vec![String::new(); Table::Applications.width()];
    row[columns::CHILD_NAME] = "123456785".to_string();
    store
        .append(Table::Applications, vec![row])
        .await
        .expect("seed row");
    let guard = DuplicateGuard::new(store);

    guard
        .check(&rut(GUARDIAN_RUT), &[])
        .await
        .expect("name column is not screened");
}

#[tokio::test]
async fn unreadable_table_is_a_store_error() {
    let store = Arc::new(MemoryStore::default());
    store.fail_reads.store(true, Ordering::SeqCst);
    let guard = DuplicateGuard::new(store);

    assert!(matches!(
        guard.check(&rut(GUARDIAN_RUT), &[]).await,
        Err(DuplicateCheckError::Store(_))
    ));
}
