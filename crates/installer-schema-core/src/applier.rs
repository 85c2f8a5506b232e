use serde::{Deserialize, Serialize};

use crate::ddl;
use crate::descriptor::EntityDescriptor;
use crate::diff::{diff, ColumnDiff};
use crate::error::SchemaError;
use crate::store::{exec_all, SchemaStore};

/// Columns one table gained and lost in a reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct AppliedDiff {
    pub table: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl AppliedDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Apply one table's diff inside a single transaction.
///
/// An empty diff opens no transaction and issues no statement. Otherwise all
/// drops run before all adds, and any failure rolls the table back to the
/// shape it had before the call.
///
/// # Errors
/// Returns `SchemaError::Ddl` with the failing statement.
pub fn apply_column_diff(
    store: &mut dyn SchemaStore,
    table: &str,
    diff: &ColumnDiff,
) -> Result<AppliedDiff, SchemaError> {
    let applied = AppliedDiff {
        table: table.to_string(),
        added: diff.to_add.iter().map(|column| column.name.clone()).collect(),
        removed: diff.to_remove.clone(),
    };
    if diff.is_empty() {
        return Ok(applied);
    }

    let statements = ddl::column_diff_statements(table, diff);
    let tx = store.begin().map_err(|source| SchemaError::Ddl {
        table: table.to_string(),
        statement: "BEGIN".to_string(),
        source,
    })?;
    exec_all(tx, &statements).map_err(|(statement, source)| SchemaError::Ddl {
        table: table.to_string(),
        statement,
        source,
    })?;

    tracing::info!(
        table,
        added = ?applied.added,
        removed = ?applied.removed,
        "reconciled table columns"
    );
    Ok(applied)
}

/// Introspect `table`, diff it against `descriptor` and apply the result.
///
/// # Errors
/// Returns `SchemaError::StoreQuery` when introspection fails and
/// `SchemaError::Ddl` when applying fails.
pub fn reconcile_table(
    store: &mut dyn SchemaStore,
    table: &str,
    descriptor: &EntityDescriptor,
) -> Result<AppliedDiff, SchemaError> {
    let live = store
        .live_shape(table)
        .map_err(|source| SchemaError::StoreQuery { table: table.to_string(), source })?;
    let diff = diff(descriptor, &live);
    apply_column_diff(store, table, &diff)
}
