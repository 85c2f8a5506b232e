mod common;

use anyhow::{anyhow, Result};
use common::{columns, create_legacy_events, Fault, InstrumentedStore};
use installer_schema_core::{
    EventResourceLinkage, MigrationStep, Orchestrator, Precondition, SchemaError, SchemaStore,
    Stage, StepRecord,
};
use installer_schema_store_sqlite::SqliteStore;

fn event_links(store: &SqliteStore) -> Result<Vec<(String, String, String)>> {
    let mut stmt = store
        .connection()
        .prepare("SELECT id, resource_type, resource_id FROM events ORDER BY id")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn credential_ids(store: &SqliteStore) -> Result<Vec<String>> {
    let mut stmt = store.connection().prepare("SELECT id FROM credentials ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn owned(values: &[(&str, &str, &str)]) -> Vec<(String, String, String)> {
    values
        .iter()
        .map(|(id, kind, resource)| (id.to_string(), kind.to_string(), resource.to_string()))
        .collect()
}

#[test]
fn legacy_prompt_events_are_relinked() -> Result<()> {
    let mut store = SqliteStore::open_in_memory()?;
    create_legacy_events(&store)?;

    let report = store.reconcile()?;
    assert_eq!(
        report.steps_applied,
        vec![StepRecord { version: 1, name: "event_resource_linkage".to_string() }]
    );

    assert_eq!(event_links(&store)?, owned(&[("e1", "prompt", "p1"), ("e2", "", "")]));
    assert_eq!(credential_ids(&store)?, vec!["cred_1"]);

    let event_columns = columns(&store, "events")?;
    assert!(!event_columns.iter().any(|column| column == "prompt_id"));
    assert!(columns(&store, "credentials")?.iter().any(|column| column == "deleted_at"));

    let events = report
        .changed_tables()
        .find(|table| table.table == "events")
        .ok_or_else(|| anyhow!("events should have changed"))?;
    assert_eq!(events.removed, vec!["prompt_id"]);
    Ok(())
}

#[test]
fn step_without_legacy_column_only_adds_links() -> Result<()> {
    let mut store = SqliteStore::open_in_memory()?;
    store.connection().execute_batch(
        "CREATE TABLE events (id TEXT, type TEXT);
         CREATE TABLE credentials (id TEXT);
         INSERT INTO events VALUES ('e1', 'status');
         INSERT INTO credentials VALUES ('aws_env'), ('cred_1');",
    )?;

    let step = EventResourceLinkage;
    let Precondition::Pending(live) = step.precondition(&store)? else {
        return Err(anyhow!("step should be pending on a store without resource links"));
    };
    assert_eq!(live.columns(), ["id", "type"]);

    let mut tx = store.begin()?;
    step.apply(tx.as_mut(), &live)?;
    tx.commit()?;

    assert_eq!(columns(&store, "events")?, vec!["id", "type", "resource_type", "resource_id"]);
    assert_eq!(event_links(&store)?, owned(&[("e1", "", "")]));
    assert_eq!(credential_ids(&store)?, vec!["cred_1"]);
    assert_eq!(step.precondition(&store)?, Precondition::Satisfied);
    Ok(())
}

#[test]
fn either_link_column_satisfies_the_step() -> Result<()> {
    let store = SqliteStore::open_in_memory()?;
    store.connection().execute_batch("CREATE TABLE events (id TEXT, resource_id TEXT);")?;
    assert_eq!(EventResourceLinkage.precondition(&store)?, Precondition::Satisfied);
    Ok(())
}

#[test]
fn rerun_after_migration_is_satisfied() -> Result<()> {
    let mut store = SqliteStore::open_in_memory()?;
    create_legacy_events(&store)?;
    store.reconcile()?;

    store.connection().execute("INSERT INTO credentials (id) VALUES ('aws_env')", [])?;
    let report = store.reconcile()?;

    assert!(report.steps_applied.is_empty());
    assert_eq!(report.steps_satisfied.len(), 1);
    assert!(report.is_noop());
    // A satisfied step performs none of its effects again.
    assert_eq!(credential_ids(&store)?, vec!["aws_env", "cred_1"]);
    assert_eq!(store.applied_migrations()?.len(), 1);
    Ok(())
}

#[test]
fn failed_step_rolls_back_and_stops_column_reconciliation() -> Result<()> {
    let inner = SqliteStore::open_in_memory()?;
    create_legacy_events(&inner)?;
    let mut store = InstrumentedStore::failing(inner, Fault { needle: "DELETE FROM", occurrence: 1 });

    let mut orchestrator = Orchestrator::installer();
    let Err(err) = orchestrator.reconcile(&mut store) else {
        return Err(anyhow!("expected the versioned step to fail"));
    };

    assert_eq!(err.stage, Stage::RunningVersionedMigrations);
    assert!(
        matches!(&err.source, SchemaError::DataMigration { version: 1, name, .. } if name == "event_resource_linkage"),
        "{err}"
    );
    assert!(store.executed_matching("DROP COLUMN").is_empty());

    let event_columns = columns(&store.inner, "events")?;
    assert!(event_columns.iter().any(|column| column == "prompt_id"));
    assert!(!event_columns.iter().any(|column| column == "resource_type"));
    assert_eq!(credential_ids(&store.inner)?, vec!["aws_env", "cred_1"]);
    assert!(store.inner.applied_migrations()?.is_empty());
    // Table creation committed before the step ran.
    assert!(store.table_exists("prompts")?);

    let mut recovered = store.inner;
    let report = recovered.reconcile()?;
    assert_eq!(report.steps_applied.len(), 1);
    assert_eq!(event_links(&recovered)?, owned(&[("e1", "prompt", "p1"), ("e2", "", "")]));
    Ok(())
}

#[test]
fn ledger_records_each_step_once() -> Result<()> {
    let mut store = SqliteStore::open_in_memory()?;
    create_legacy_events(&store)?;
    store.reconcile()?;
    store.reconcile()?;

    let applied = store.applied_migrations()?;
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].version, 1);
    assert_eq!(applied[0].name, "event_resource_linkage");
    assert!(time::OffsetDateTime::parse(
        &applied[0].applied_at,
        &time::format_description::well_known::Rfc3339
    )
    .is_ok());
    Ok(())
}
