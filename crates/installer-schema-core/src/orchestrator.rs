use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::applier::{reconcile_table, AppliedDiff};
use crate::ddl;
use crate::diff::{diff, ColumnDiff, LiveShape};
use crate::error::{ReconcileError, SchemaError, StoreError};
use crate::ledger;
use crate::registry::{Registry, TableDescriptors};
use crate::steps::{versioned_steps, MigrationStep, Precondition};
use crate::store::{rollback_quietly, SchemaStore};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CreatingTables,
    RunningVersionedMigrations,
    ReconcilingColumns,
    Done,
    Failed,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::CreatingTables => "creating tables",
            Self::RunningVersionedMigrations => "running versioned migrations",
            Self::ReconcilingColumns => "reconciling columns",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct StepRecord {
    pub version: u32,
    pub name: String,
}

impl StepRecord {
    fn of(step: &dyn MigrationStep) -> Self {
        Self { version: step.version(), name: step.name().to_string() }
    }
}

/// What a successful reconciliation run did.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct ReconcileReport {
    pub tables_created: Vec<String>,
    pub steps_applied: Vec<StepRecord>,
    pub steps_satisfied: Vec<StepRecord>,
    pub tables: Vec<AppliedDiff>,
}

impl ReconcileReport {
    pub fn changed_tables(&self) -> impl Iterator<Item = &AppliedDiff> {
        self.tables.iter().filter(|table| !table.is_empty())
    }

    /// True when the run found the store already conforming.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.tables_created.is_empty()
            && self.steps_applied.is_empty()
            && self.changed_tables().next().is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Satisfied,
    Pending,
    /// Some registered table is missing, so the precondition cannot be read yet.
    Undetermined,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct StepPlan {
    pub version: u32,
    pub name: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TablePlan {
    pub table: String,
    pub exists: bool,
    pub diff: ColumnDiff,
}

/// Dry-run view of a reconciliation. Table diffs are taken against the
/// current shapes, before any pending step has run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct ReconcilePlan {
    pub tables: Vec<TablePlan>,
    pub steps: Vec<StepPlan>,
}

impl ReconcilePlan {
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.tables.iter().any(|table| !table.exists || !table.diff.is_empty())
            || self.steps.iter().any(|step| step.status != StepStatus::Satisfied)
    }

    #[must_use]
    pub fn pending_versions(&self) -> Vec<u32> {
        self.steps
            .iter()
            .filter(|step| step.status != StepStatus::Satisfied)
            .map(|step| step.version)
            .collect()
    }
}

/// Drives a store through table creation, versioned steps and column sync.
pub struct Orchestrator {
    registry: Registry,
    steps: Vec<Box<dyn MigrationStep>>,
    stage: Stage,
}

impl Orchestrator {
    #[must_use]
    pub fn new(registry: Registry, steps: Vec<Box<dyn MigrationStep>>) -> Self {
        Self { registry, steps, stage: Stage::CreatingTables }
    }

    #[must_use]
    pub fn installer() -> Self {
        Self::new(Registry::installer(), versioned_steps())
    }

    /// Stage of the last run: `Done` or `Failed` once `reconcile` returns.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn latest_version(&self) -> u32 {
        self.steps.iter().map(|step| step.version()).max().unwrap_or(0)
    }

    /// Run every stage in order, stopping at the first failure.
    ///
    /// Each stage commits its own transactions, so a failure leaves earlier
    /// stages' effects in place. Callers must not serve traffic on error.
    ///
    /// # Errors
    /// Returns the failing stage together with the underlying `SchemaError`.
    pub fn reconcile(
        &mut self,
        store: &mut dyn SchemaStore,
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::default();

        // A misordered step list is rejected before anything is written.
        if let Err(source) = self.check_step_order() {
            self.stage = Stage::RunningVersionedMigrations;
            return Err(self.fail(source));
        }

        self.enter(Stage::CreatingTables);
        let created = self.create_tables(store);
        let (descriptors, tables_created) = created.map_err(|source| self.fail(source))?;
        report.tables_created = tables_created;

        self.enter(Stage::RunningVersionedMigrations);
        let ran = self.run_steps(store, &mut report);
        ran.map_err(|source| self.fail(source))?;

        self.enter(Stage::ReconcilingColumns);
        for (table, descriptor) in &descriptors {
            let applied = reconcile_table(store, table, descriptor);
            report.tables.push(applied.map_err(|source| self.fail(source))?);
        }

        self.enter(Stage::Done);
        Ok(report)
    }

    /// Compute what `reconcile` would do without writing anything.
    ///
    /// # Errors
    /// Returns reflection and introspection failures.
    pub fn plan(&self, store: &dyn SchemaStore) -> Result<ReconcilePlan, SchemaError> {
        self.check_step_order()?;
        let mut plan = ReconcilePlan::default();
        for (table, descriptor) in self.registry.descriptors()? {
            let exists = store
                .table_exists(table)
                .map_err(|source| SchemaError::StoreQuery { table: table.to_string(), source })?;
            let diff = if exists {
                let live = store
                    .live_shape(table)
                    .map_err(|source| SchemaError::StoreQuery { table: table.to_string(), source })?;
                diff(&descriptor, &live)
            } else {
                diff(&descriptor, &LiveShape::default())
            };
            plan.tables.push(TablePlan { table: table.to_string(), exists, diff });
        }

        let all_exist = plan.tables.iter().all(|table| table.exists);
        for step in &self.steps {
            let status = if all_exist {
                match step.precondition(store) {
                    Ok(Precondition::Satisfied) => StepStatus::Satisfied,
                    Ok(Precondition::Pending(_)) => StepStatus::Pending,
                    Err(source) => return Err(data_migration(step.as_ref(), source)),
                }
            } else {
                StepStatus::Undetermined
            };
            plan.steps.push(StepPlan {
                version: step.version(),
                name: step.name().to_string(),
                status,
            });
        }
        Ok(plan)
    }

    fn enter(&mut self, stage: Stage) {
        tracing::info!(%stage, "schema reconciliation stage");
        self.stage = stage;
    }

    fn fail(&mut self, source: SchemaError) -> ReconcileError {
        let stage = self.stage;
        self.stage = Stage::Failed;
        tracing::error!(%stage, table = source.table(), error = %source, "schema reconciliation failed");
        ReconcileError { stage, source }
    }

    /// Reflect every entity, then create missing tables, their indexes and
    /// the ledger in one transaction.
    fn create_tables(
        &self,
        store: &mut dyn SchemaStore,
    ) -> Result<(TableDescriptors, Vec<String>), SchemaError> {
        let descriptors = self.registry.descriptors()?;

        let mut created = Vec::new();
        let mut statements = vec![(ledger::LEDGER_TABLE, ledger::create_ledger_table())];
        for (table, descriptor) in &descriptors {
            let exists = store.table_exists(table).map_err(|source| SchemaError::Catalog {
                entity: descriptor.entity().to_string(),
                table: (*table).to_string(),
                source,
            })?;
            if exists {
                // Hinted columns an older table lacks get their index once
                // column reconciliation adds them.
                let live = store.live_shape(table).map_err(|source| SchemaError::StoreQuery {
                    table: (*table).to_string(),
                    source,
                })?;
                statements.extend(
                    descriptor
                        .indexed_columns()
                        .filter(|column| live.contains(&column.name))
                        .map(|column| (*table, ddl::create_index(table, &column.name))),
                );
            } else {
                created.push((*table).to_string());
                statements.extend(
                    ddl::create_table_statements(table, descriptor)
                        .into_iter()
                        .map(|statement| (*table, statement)),
                );
            }
        }

        let mut tx = store
            .begin()
            .map_err(|source| SchemaError::CreateBatch { statement: "BEGIN", source })?;
        for (table, statement) in statements {
            tracing::debug!(table, %statement, "executing");
            if let Err(source) = tx.exec(&statement) {
                rollback_quietly(tx);
                return Err(SchemaError::Ddl { table: table.to_string(), statement, source });
            }
        }
        tx.commit().map_err(|source| SchemaError::CreateBatch { statement: "COMMIT", source })?;

        if !created.is_empty() {
            tracing::info!(tables = ?created, "created tables");
        }
        Ok((descriptors, created))
    }

    /// Versions must strictly increase across the whole list.
    fn check_step_order(&self) -> Result<(), SchemaError> {
        let mut previous = 0;
        for step in &self.steps {
            let version = step.version();
            if version <= previous {
                return Err(SchemaError::StepOrder {
                    version,
                    name: step.name().to_string(),
                    previous,
                });
            }
            previous = version;
        }
        Ok(())
    }

    fn run_steps(
        &self,
        store: &mut dyn SchemaStore,
        report: &mut ReconcileReport,
    ) -> Result<(), SchemaError> {
        for step in &self.steps {
            let step = step.as_ref();
            let version = step.version();
            let precondition =
                step.precondition(store).map_err(|source| data_migration(step, source))?;
            let applied_at = ledger::now_rfc3339().map_err(|err| SchemaError::Ledger {
                version,
                source: StoreError::with_source("failed to format RFC3339 timestamp", err),
            })?;
            let record = ledger::record_step(version, step.name(), &applied_at);

            let mut tx = store.begin().map_err(|source| data_migration(step, source))?;
            let pending = match &precondition {
                Precondition::Satisfied => false,
                Precondition::Pending(live) => {
                    if let Err(source) = step.apply(tx.as_mut(), live) {
                        rollback_quietly(tx);
                        return Err(data_migration(step, source));
                    }
                    true
                }
            };
            if let Err(source) = tx.exec(&record) {
                rollback_quietly(tx);
                return Err(SchemaError::Ledger { version, source });
            }
            tx.commit().map_err(|source| data_migration(step, source))?;

            if pending {
                tracing::info!(version, name = step.name(), "applied versioned migration");
                report.steps_applied.push(StepRecord::of(step));
            } else {
                tracing::info!(version, name = step.name(), "versioned migration already satisfied");
                report.steps_satisfied.push(StepRecord::of(step));
            }
        }
        Ok(())
    }
}

fn data_migration(step: &dyn MigrationStep, source: StoreError) -> SchemaError {
    SchemaError::DataMigration { version: step.version(), name: step.name().to_string(), source }
}
