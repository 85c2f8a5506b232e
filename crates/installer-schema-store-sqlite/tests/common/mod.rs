//! Shared helpers for store integration tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::Result;
use installer_schema_core::{
    Entity, EntityShape, FieldDecl, FieldKind, SchemaStore, StoreError, StoreTransaction,
};
use installer_schema_store_sqlite::SqliteStore;

/// Fail the `occurrence`-th executed statement (1-based) containing `needle`.
/// Commits are matched as the statement `COMMIT`.
#[derive(Debug, Clone, Copy)]
pub struct Fault {
    pub needle: &'static str,
    pub occurrence: usize,
}

/// Wraps a SQLite store, logging every executed statement and optionally
/// injecting one statement failure.
#[allow(dead_code)]
pub struct InstrumentedStore {
    pub inner: SqliteStore,
    executed: Rc<RefCell<Vec<String>>>,
    fault: Option<Fault>,
    matched: Rc<Cell<usize>>,
}

#[allow(dead_code)]
impl InstrumentedStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            executed: Rc::new(RefCell::new(Vec::new())),
            fault: None,
            matched: Rc::new(Cell::new(0)),
        }
    }

    pub fn failing(inner: SqliteStore, fault: Fault) -> Self {
        let mut store = Self::new(inner);
        store.fault = Some(fault);
        store
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }

    pub fn executed_matching(&self, needle: &str) -> Vec<String> {
        self.executed.borrow().iter().filter(|sql| sql.contains(needle)).cloned().collect()
    }

    pub fn clear_log(&self) {
        self.executed.borrow_mut().clear();
    }
}

impl SchemaStore for InstrumentedStore {
    fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        self.inner.table_exists(table)
    }

    fn column_names(&self, table: &str) -> Result<Vec<String>, StoreError> {
        self.inner.column_names(table)
    }

    fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        let executed = Rc::clone(&self.executed);
        let matched = Rc::clone(&self.matched);
        let fault = self.fault;
        let inner = self.inner.begin()?;
        Ok(Box::new(InstrumentedTransaction { inner, executed, fault, matched }))
    }
}

struct InstrumentedTransaction<'a> {
    inner: Box<dyn StoreTransaction + 'a>,
    executed: Rc<RefCell<Vec<String>>>,
    fault: Option<Fault>,
    matched: Rc<Cell<usize>>,
}

impl InstrumentedTransaction<'_> {
    fn record(&self, sql: &str) -> Result<(), StoreError> {
        self.executed.borrow_mut().push(sql.to_string());
        if let Some(fault) = self.fault {
            if sql.contains(fault.needle) {
                let seen = self.matched.get() + 1;
                self.matched.set(seen);
                if seen == fault.occurrence {
                    return Err(StoreError::new(format!("injected failure: {sql}")));
                }
            }
        }
        Ok(())
    }
}

impl StoreTransaction for InstrumentedTransaction<'_> {
    fn exec(&mut self, sql: &str) -> Result<usize, StoreError> {
        self.record(sql)?;
        self.inner.exec(sql)
    }

    /// Logged as `COMMIT`. A fault on it drops the inner transaction, which
    /// rolls it back.
    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.record("COMMIT")?;
        self.inner.commit()
    }

    fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback()
    }
}

/// Four-column entity used by atomicity tests.
#[allow(dead_code)]
pub struct Widget;

impl Entity for Widget {
    fn shape() -> EntityShape {
        EntityShape::new(
            "widget",
            vec![
                FieldDecl::text("id").indexed(),
                FieldDecl::text("label"),
                FieldDecl::integer("weight"),
                FieldDecl::boolean("active"),
            ],
        )
    }
}

/// Entity whose declared shape persists a reference and cannot be reflected.
#[allow(dead_code)]
pub struct BrokenEntity;

impl Entity for BrokenEntity {
    fn shape() -> EntityShape {
        EntityShape::new(
            "broken",
            vec![FieldDecl::text("id"), FieldDecl::new("owner", FieldKind::Reference("widget"))],
        )
    }
}

#[allow(dead_code)]
pub fn columns(store: &SqliteStore, table: &str) -> Result<Vec<String>> {
    Ok(store.column_names(table)?)
}

#[allow(dead_code)]
pub fn index_exists(store: &SqliteStore, name: &str) -> Result<bool> {
    let exists = store.connection().query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1)",
        [name],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(exists == 1)
}

/// Events table as shipped before the resource linkage migration.
#[allow(dead_code)]
pub fn create_legacy_events(store: &SqliteStore) -> Result<()> {
    store.connection().execute_batch(
        "CREATE TABLE events (
            id TEXT,
            timestamp TEXT,
            type TEXT,
            cluster_id TEXT,
            prompt_id TEXT,
            description TEXT,
            deleted_at TEXT
        );
        CREATE TABLE credentials (id TEXT, secret TEXT, name TEXT, type TEXT);
        INSERT INTO credentials (id, secret, name, type) VALUES
            ('aws_env', 'from-env', 'AWS (env)', 'aws'),
            ('cred_1', 's3cret', 'default', 'aws');
        INSERT INTO events (id, timestamp, type, cluster_id, prompt_id, description) VALUES
            ('e1', '2015-06-01T00:00:00Z', 'prompt', 'c1', 'p1', 'confirm stack'),
            ('e2', '2015-06-01T00:00:01Z', 'status', 'c1', '', 'stack created');",
    )?;
    Ok(())
}
