use std::path::Path;

use anyhow::{Context, Result};
use installer_schema_core::ddl;
use installer_schema_core::ledger::LEDGER_TABLE;
use installer_schema_core::{
    Orchestrator, ReconcileError, ReconcilePlan, ReconcileReport, SchemaError, SchemaStore,
    StoreError, StoreTransaction,
};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};

/// SQLite database holding the installer's records.
pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: u32,
    pub name: String,
    pub applied_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub fingerprint: String,
    pub latest_version: u32,
    pub applied: Vec<AppliedMigration>,
    pub pending_versions: Vec<u32>,
    pub missing_tables: Vec<String>,
    pub drifted_tables: Vec<String>,
    pub up_to_date: bool,
}

impl SqliteStore {
    /// Open a SQLite database file and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        tracing::debug!(path = %path.display(), "opened sqlite database");
        Ok(Self { conn })
    }

    /// Open for inspection only. A missing file is not created; it is
    /// reported as an empty database.
    ///
    /// # Errors
    /// Returns an error when an existing database cannot be opened.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "database file missing; inspecting an empty schema");
            return Self::open_in_memory();
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open sqlite database read-only at {}", path.display()))?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")
            .context("failed to configure sqlite pragmas")?;

        tracing::debug!(path = %path.display(), "opened sqlite database read-only");
        Ok(Self { conn })
    }

    /// # Errors
    /// Returns an error when the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;").context("failed to configure sqlite pragmas")?;
        Ok(Self { conn })
    }

    /// Connection for ordinary record queries once reconciliation has succeeded.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Bring the database in line with the installer's record shapes.
    ///
    /// # Errors
    /// Returns the first failure; the caller must not start serving.
    pub fn reconcile(&mut self) -> Result<ReconcileReport, ReconcileError> {
        Orchestrator::installer().reconcile(self)
    }

    /// # Errors
    /// Returns reflection and introspection failures.
    pub fn plan(&self) -> Result<ReconcilePlan, SchemaError> {
        Orchestrator::installer().plan(self)
    }

    /// Versioned steps recorded in the ledger, oldest first. Empty before the
    /// first reconciliation.
    ///
    /// # Errors
    /// Returns an error when the ledger cannot be read.
    pub fn applied_migrations(&self) -> Result<Vec<AppliedMigration>> {
        if !self.table_exists(LEDGER_TABLE)? {
            return Ok(Vec::new());
        }

        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT version, name, applied_at FROM {} ORDER BY version ASC",
                ddl::quote_ident(LEDGER_TABLE)
            ))
            .context("failed to prepare migration ledger query")?;
        let rows = stmt.query_map([], |row| {
            Ok(AppliedMigration { version: row.get(0)?, name: row.get(1)?, applied_at: row.get(2)? })
        })?;

        let mut applied = Vec::new();
        for row in rows {
            applied.push(row.context("failed to read migration ledger row")?);
        }
        Ok(applied)
    }

    /// Report the declared schema fingerprint, ledger contents and drift.
    ///
    /// # Errors
    /// Returns an error when the registry cannot be reflected or the
    /// database cannot be inspected.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        let orchestrator = Orchestrator::installer();
        let fingerprint =
            orchestrator.registry().fingerprint().context("failed to fingerprint registry")?;
        let plan = orchestrator.plan(self).context("failed to plan schema reconciliation")?;

        Ok(SchemaStatus {
            fingerprint,
            latest_version: orchestrator.latest_version(),
            applied: self.applied_migrations()?,
            pending_versions: plan.pending_versions(),
            missing_tables: plan
                .tables
                .iter()
                .filter(|table| !table.exists)
                .map(|table| table.table.clone())
                .collect(),
            drifted_tables: plan
                .tables
                .iter()
                .filter(|table| table.exists && !table.diff.is_empty())
                .map(|table| table.table.clone())
                .collect(),
            up_to_date: !plan.has_changes(),
        })
    }
}

impl SchemaStore for SqliteStore {
    fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let kind = self
            .conn
            .query_row(
                "SELECT type FROM sqlite_master WHERE name = ?1 AND type IN ('table', 'view')",
                params![table],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|err| {
                StoreError::with_source(format!("failed to check if table exists: {table}"), err)
            })?;
        match kind.as_deref() {
            None => Ok(false),
            Some("table") => Ok(true),
            Some(other) => Err(StoreError::new(format!("`{table}` is a {other}, not a table"))),
        }
    }

    fn column_names(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let stmt = self.conn.prepare(&ddl::select_no_rows(table)).map_err(|err| {
            StoreError::with_source(format!("failed to read columns of {table}"), err)
        })?;
        Ok(stmt.column_names().into_iter().map(str::to_string).collect())
    }

    fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|err| StoreError::with_source("failed to start transaction", err))?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

struct SqliteTransaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn exec(&mut self, sql: &str) -> Result<usize, StoreError> {
        self.tx
            .execute(sql, [])
            .map_err(|err| StoreError::with_source("failed to execute statement", err))
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().map_err(|err| StoreError::with_source("failed to commit transaction", err))
    }

    fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .map_err(|err| StoreError::with_source("failed to roll back transaction", err))
    }
}
