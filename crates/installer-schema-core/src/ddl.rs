//! Rendering of the small SQL dialect the engine issues.

use crate::descriptor::{ColumnSpec, EntityDescriptor};
use crate::diff::ColumnDiff;

#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Zero-row projection used to read a table's live columns.
#[must_use]
pub fn select_no_rows(table: &str) -> String {
    format!("SELECT * FROM {} LIMIT 0", quote_ident(table))
}

#[must_use]
pub fn create_table(table: &str, descriptor: &EntityDescriptor) -> String {
    let columns = descriptor
        .fields()
        .iter()
        .map(|field| format!("{} {}", quote_ident(&field.name), field.storage.column_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({columns})", quote_ident(table))
}

/// Index names share one namespace across tables, so they carry the table name.
#[must_use]
pub fn index_name(table: &str, column: &str) -> String {
    format!("idx_{table}_{column}")
}

#[must_use]
pub fn create_index(table: &str, column: &str) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        quote_ident(&index_name(table, column)),
        quote_ident(table),
        quote_ident(column)
    )
}

#[must_use]
pub fn drop_index(table: &str, column: &str) -> String {
    format!("DROP INDEX IF EXISTS {}", quote_ident(&index_name(table, column)))
}

#[must_use]
pub fn add_column(table: &str, column: &ColumnSpec) -> String {
    format!(
        "ALTER TABLE {} ADD {} {}",
        quote_ident(table),
        quote_ident(&column.name),
        column.storage.column_type()
    )
}

#[must_use]
pub fn drop_column(table: &str, column: &str) -> String {
    format!("ALTER TABLE {} DROP COLUMN {}", quote_ident(table), quote_ident(column))
}

/// Base table plus its hinted indexes.
#[must_use]
pub fn create_table_statements(table: &str, descriptor: &EntityDescriptor) -> Vec<String> {
    let mut statements = vec![create_table(table, descriptor)];
    statements.extend(descriptor.indexed_columns().map(|column| create_index(table, &column.name)));
    statements
}

/// Statements for one table's diff: every removal first, then every addition.
///
/// A removed column loses its engine-managed index before the drop; an added
/// column with an index hint gets its index right after the add.
#[must_use]
pub fn column_diff_statements(table: &str, diff: &ColumnDiff) -> Vec<String> {
    let mut statements = Vec::with_capacity(diff.statement_count() * 2);
    for column in &diff.to_remove {
        statements.push(drop_index(table, column));
        statements.push(drop_column(table, column));
    }
    for column in &diff.to_add {
        statements.push(add_column(table, column));
        if column.indexed {
            statements.push(create_index(table, &column.name));
        }
    }
    statements
}
