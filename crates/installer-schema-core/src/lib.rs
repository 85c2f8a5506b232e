//! Schema reconciliation for the installer's persisted records.
//!
//! A run creates every registered table, applies pending versioned data
//! migrations, then brings each table's columns in line with its entity's
//! declared shape. The store is reached only through [`SchemaStore`].

pub mod applier;
pub mod ddl;
pub mod descriptor;
pub mod diff;
pub mod entity;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod records;
pub mod registry;
pub mod steps;
pub mod store;

pub use applier::{apply_column_diff, reconcile_table, AppliedDiff};
pub use descriptor::{ColumnSpec, EntityDescriptor};
pub use diff::{diff, ColumnDiff, LiveShape};
pub use entity::{Entity, EntityShape, FieldDecl, FieldKind, StorageType};
pub use error::{ReconcileError, ReflectionError, RegistryError, SchemaError, StoreError};
pub use orchestrator::{
    Orchestrator, ReconcilePlan, ReconcileReport, Stage, StepPlan, StepRecord, StepStatus,
    TablePlan,
};
pub use registry::{RegisteredEntity, Registry};
pub use steps::{versioned_steps, EventResourceLinkage, MigrationStep, Precondition};
pub use store::{SchemaStore, StoreTransaction};
