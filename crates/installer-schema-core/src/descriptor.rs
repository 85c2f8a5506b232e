use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityShape, FieldKind, StorageType};
use crate::error::ReflectionError;

/// One persisted column of a reflected entity.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct ColumnSpec {
    pub name: String,
    pub storage: StorageType,
    #[serde(default)]
    pub indexed: bool,
}

impl ColumnSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, storage: StorageType) -> Self {
        Self { name: name.into(), storage, indexed: false }
    }
}

/// Canonical persisted shape of an entity: columns in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct EntityDescriptor {
    entity: String,
    fields: Vec<ColumnSpec>,
}

impl EntityDescriptor {
    /// Reflect a declared shape into its persisted columns.
    ///
    /// Fields marked transient are dropped before any check runs, so an
    /// excluded field may reuse a name or carry a non-scalar kind.
    ///
    /// # Errors
    /// Returns an error when a persisted field is duplicated, has a
    /// non-scalar kind or an invalid name, or when nothing is persisted.
    pub fn reflect(shape: &EntityShape) -> Result<Self, ReflectionError> {
        let mut seen = BTreeSet::new();
        let mut fields = Vec::with_capacity(shape.fields.len());

        for decl in shape.fields.iter().filter(|decl| decl.persisted) {
            if !is_identifier(decl.name) {
                return Err(ReflectionError::InvalidName(decl.name.to_string()));
            }
            if !seen.insert(decl.name) {
                return Err(ReflectionError::DuplicateField(decl.name.to_string()));
            }
            let FieldKind::Scalar(storage) = decl.kind else {
                return Err(ReflectionError::UnsupportedType {
                    field: decl.name.to_string(),
                    kind: decl.kind.to_string(),
                });
            };
            fields.push(ColumnSpec { name: decl.name.to_string(), storage, indexed: decl.indexed });
        }

        if fields.is_empty() {
            return Err(ReflectionError::NoPersistedFields);
        }

        Ok(Self { entity: shape.name.to_string(), fields })
    }

    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[must_use]
    pub fn fields(&self) -> &[ColumnSpec] {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    pub fn indexed_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.fields.iter().filter(|field| field.indexed)
    }
}

/// Plain `[A-Za-z_][A-Za-z0-9_]*` identifier.
#[must_use]
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
