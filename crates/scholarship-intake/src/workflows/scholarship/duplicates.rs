use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::identity::{compact_form, Rut};
use super::rows::columns;
use super::store::{StoreError, Table, TabularStore};

/// Applications-table columns holding identifiers that must stay unique.
pub const IDENTIFIER_COLUMNS: [usize; 3] = [
    columns::GUARDIAN_RUT,
    columns::CHILD_RUT,
    columns::LEGACY_SECOND_CHILD_RUT,
];

/// An identifier that already appears in the applications table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("El RUT {0} ya está registrado en el sistema")]
pub struct DuplicateIdentifier(pub String);

#[derive(Debug, thiserror::Error)]
pub enum DuplicateCheckError {
    #[error(transparent)]
    Duplicate(#[from] DuplicateIdentifier),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Point-in-time screen of new identifiers against accepted submissions.
#[derive(Debug)]
pub struct DuplicateGuard<S> {
    store: Arc<S>,
}

impl<S> DuplicateGuard<S>
where
    S: TabularStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Fails on the first collision: the guardian first, then children in
    /// submission order.
    pub async fn check(&self, guardian: &Rut, children: &[&Rut]) -> Result<(), DuplicateCheckError> {
        let existing = self.existing_identifiers().await?;
        debug!(known = existing.len(), "loaded existing identifiers");

        if existing.contains(&guardian.compact()) {
            return Err(DuplicateIdentifier(guardian.display_form()).into());
        }

        for child in children {
            if existing.contains(&child.compact()) {
                return Err(DuplicateIdentifier(child.display_form()).into());
            }
        }

        Ok(())
    }

    async fn existing_identifiers(&self) -> Result<HashSet<String>, StoreError> {
        let mut identifiers = HashSet::new();
        for column in IDENTIFIER_COLUMNS {
            let cells = self.store.read_column(Table::Applications, column).await?;
            identifiers.extend(
                cells
                    .iter()
                    .map(|cell| compact_form(cell))
                    .filter(|cell| !cell.is_empty()),
            );
        }
        Ok(identifiers)
    }
}
