//! The narrow store interface the engine drives.
//!
//! Every call blocks until the store answers; there is no cancellation.

use crate::diff::LiveShape;
use crate::error::StoreError;

pub trait SchemaStore {
    /// # Errors
    /// Returns an error when the store's catalog cannot be read, or when
    /// the name belongs to an object that is not a table.
    fn table_exists(&self, table: &str) -> Result<bool, StoreError>;

    /// Column names of `table` as reported by a zero-row projection.
    ///
    /// # Errors
    /// Returns an error when the table is missing or the query fails.
    fn column_names(&self, table: &str) -> Result<Vec<String>, StoreError>;

    /// # Errors
    /// Returns an error when a transaction cannot be started.
    fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>, StoreError>;

    /// # Errors
    /// Same as [`SchemaStore::column_names`].
    fn live_shape(&self, table: &str) -> Result<LiveShape, StoreError> {
        self.column_names(table).map(LiveShape::new)
    }
}

/// An open transaction. Dropping it without committing rolls it back.
pub trait StoreTransaction {
    /// Execute one statement and return the number of rows it changed.
    ///
    /// # Errors
    /// Returns the store's error for the statement.
    fn exec(&mut self, sql: &str) -> Result<usize, StoreError>;

    /// # Errors
    /// Returns an error when the commit fails; the transaction is then gone.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// # Errors
    /// Returns an error when the rollback itself fails.
    fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Roll back, logging a rollback failure instead of returning it so the
/// error that caused the rollback is the one callers see.
pub fn rollback_quietly(tx: Box<dyn StoreTransaction + '_>) {
    if let Err(err) = tx.rollback() {
        tracing::error!(error = %err, "rollback failed");
    }
}

/// Run `statements` in order inside `tx`, rolling back on the first failure.
///
/// # Errors
/// Returns the failing statement alongside the store error.
pub fn exec_all(
    mut tx: Box<dyn StoreTransaction + '_>,
    statements: &[String],
) -> Result<(), (String, StoreError)> {
    for statement in statements {
        tracing::debug!(%statement, "executing");
        if let Err(err) = tx.exec(statement) {
            rollback_quietly(tx);
            return Err((statement.clone(), err));
        }
    }
    tx.commit().map_err(|err| ("COMMIT".to_string(), err))
}
