use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Semantic storage tag of a persisted column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Text,
    Integer,
    Boolean,
    Float,
    /// RFC 3339 text.
    Timestamp,
    Blob,
}

impl StorageType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Float => "float",
            Self::Timestamp => "timestamp",
            Self::Blob => "blob",
        }
    }

    /// Column type used in `CREATE TABLE` and `ALTER TABLE ... ADD`.
    #[must_use]
    pub fn column_type(self) -> &'static str {
        match self {
            Self::Text | Self::Timestamp => "TEXT",
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Float => "REAL",
            Self::Blob => "BLOB",
        }
    }
}

impl Display for StorageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared kind of a field. Only scalars map onto a column.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FieldKind {
    Scalar(StorageType),
    /// Pointer to another record, resolved in memory.
    Reference(&'static str),
    List(StorageType),
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(storage) => write!(f, "{storage}"),
            Self::Reference(target) => write!(f, "reference to {target}"),
            Self::List(storage) => write!(f, "list of {storage}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FieldDecl {
    pub name: &'static str,
    pub kind: FieldKind,
    pub persisted: bool,
    pub indexed: bool,
}

impl FieldDecl {
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, persisted: true, indexed: false }
    }

    #[must_use]
    pub const fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Scalar(StorageType::Text))
    }

    #[must_use]
    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, FieldKind::Scalar(StorageType::Integer))
    }

    #[must_use]
    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Scalar(StorageType::Boolean))
    }

    #[must_use]
    pub const fn timestamp(name: &'static str) -> Self {
        Self::new(name, FieldKind::Scalar(StorageType::Timestamp))
    }

    /// Excludes the field from persistence.
    #[must_use]
    pub const fn transient(mut self) -> Self {
        self.persisted = false;
        self
    }

    /// Requests an index on the column when the table is created.
    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// Declared shape of a record type, in field declaration order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct EntityShape {
    pub name: &'static str,
    pub fields: Vec<FieldDecl>,
}

impl EntityShape {
    #[must_use]
    pub fn new(name: &'static str, fields: Vec<FieldDecl>) -> Self {
        Self { name, fields }
    }
}

/// A record type that can describe its own persisted shape.
pub trait Entity {
    fn shape() -> EntityShape;
}
