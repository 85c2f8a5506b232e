use std::error::Error as StdError;
use std::fmt::{Display, Formatter};

use crate::orchestrator::Stage;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure reported by a backing store through the store traits.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct StoreError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl StoreError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }

    #[must_use]
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self { message: message.into(), source: Some(source.into()) }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ReflectionError {
    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),
    #[error("field `{field}` has unsupported storage type {kind}")]
    UnsupportedType { field: String, kind: String },
    #[error("field name `{0}` is not a valid column identifier")]
    InvalidName(String),
    #[error("entity declares no persisted fields")]
    NoPersistedFields,
}

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum RegistryError {
    #[error("table `{0}` is registered more than once")]
    DuplicateTable(String),
    #[error("table name `{0}` is not a valid identifier")]
    InvalidTable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("entity `{entity}` (table `{table}`) is malformed: {source}")]
    Reflection {
        entity: String,
        table: String,
        #[source]
        source: ReflectionError,
    },
    #[error("failed to introspect table `{table}`: {source}")]
    StoreQuery {
        table: String,
        #[source]
        source: StoreError,
    },
    #[error("DDL failed on table `{table}` at `{statement}`: {source}")]
    Ddl {
        table: String,
        statement: String,
        #[source]
        source: StoreError,
    },
    #[error("versioned migration {version} ({name}) failed: {source}")]
    DataMigration {
        version: u32,
        name: String,
        #[source]
        source: StoreError,
    },
    #[error("entity `{entity}` cannot use table `{table}`: {source}")]
    Catalog {
        entity: String,
        table: String,
        #[source]
        source: StoreError,
    },
    #[error("table creation batch failed at {statement}: {source}")]
    CreateBatch {
        statement: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("versioned migration {version} ({name}) is out of order after version {previous}")]
    StepOrder { version: u32, name: String, previous: u32 },
    #[error("failed to record versioned migration {version} in the ledger: {source}")]
    Ledger {
        version: u32,
        #[source]
        source: StoreError,
    },
}

impl SchemaError {
    /// Table the failure concerns, when there is one.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Reflection { table, .. }
            | Self::StoreQuery { table, .. }
            | Self::Ddl { table, .. }
            | Self::Catalog { table, .. } => Some(table),
            Self::CreateBatch { .. }
            | Self::DataMigration { .. }
            | Self::StepOrder { .. }
            | Self::Ledger { .. } => None,
        }
    }
}

/// The single error a reconciliation run surfaces: which stage failed and why.
#[derive(Debug)]
pub struct ReconcileError {
    pub stage: Stage,
    pub source: SchemaError,
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "schema reconciliation failed while {}: {}", self.stage, self.source)
    }
}

impl StdError for ReconcileError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}
