use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::descriptor::{ColumnSpec, EntityDescriptor};

/// Column names of a table as the store currently reports them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct LiveShape {
    columns: Vec<String>,
}

impl LiveShape {
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    #[must_use]
    pub fn contains_any(&self, columns: &[&str]) -> bool {
        columns.iter().any(|column| self.contains(column))
    }
}

impl<S: Into<String>> FromIterator<S> for LiveShape {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { columns: iter.into_iter().map(Into::into).collect() }
    }
}

/// Columns to add and drop so a table matches its descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct ColumnDiff {
    pub to_add: Vec<ColumnSpec>,
    pub to_remove: Vec<String>,
}

impl ColumnDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

/// Compare a descriptor with a live shape by column name.
///
/// `to_add` keeps descriptor order and `to_remove` keeps live order. A
/// renamed field shows up as one drop plus one add, and a changed storage
/// type under the same name is not detected.
#[must_use]
pub fn diff(expected: &EntityDescriptor, actual: &LiveShape) -> ColumnDiff {
    let live: BTreeSet<&str> = actual.columns().iter().map(String::as_str).collect();

    let to_add =
        expected.fields().iter().filter(|field| !live.contains(field.name.as_str())).cloned().collect();
    let to_remove =
        actual.columns().iter().filter(|column| !expected.contains(column)).cloned().collect();

    ColumnDiff { to_add, to_remove }
}
