//! One-time data migrations.
//!
//! The list returned by [`versioned_steps`] is append-only: a store may have
//! applied any prefix of it, so entries are never removed or reordered.

use crate::ddl::{quote_ident, quote_literal};
use crate::diff::LiveShape;
use crate::error::StoreError;
use crate::store::{SchemaStore, StoreTransaction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The step's effect is already present in the store.
    Satisfied,
    /// The step has to run; carries the shape it inspected.
    Pending(LiveShape),
}

pub trait MigrationStep {
    fn version(&self) -> u32;

    fn name(&self) -> &'static str;

    /// Inspect the store and decide whether the step still has to run.
    ///
    /// # Errors
    /// Returns the store error when inspection fails.
    fn precondition(&self, store: &dyn SchemaStore) -> Result<Precondition, StoreError>;

    /// Perform the step inside `tx`. The caller commits.
    ///
    /// # Errors
    /// Returns the first failing statement's error.
    fn apply(&self, tx: &mut dyn StoreTransaction, live: &LiveShape) -> Result<(), StoreError>;
}

#[must_use]
pub fn versioned_steps() -> Vec<Box<dyn MigrationStep>> {
    vec![Box::new(EventResourceLinkage)]
}

/// Replaces the events table's `prompt_id` link with a generic
/// `resource_type`/`resource_id` pair.
///
/// Also drops the `aws_env` credential, which earlier releases created from
/// environment variables and no longer resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventResourceLinkage;

impl EventResourceLinkage {
    pub const TABLE: &'static str = "events";
    pub const LEGACY_COLUMN: &'static str = "prompt_id";
    pub const OBSOLETE_CREDENTIAL: &'static str = "aws_env";
}

impl MigrationStep for EventResourceLinkage {
    fn version(&self) -> u32 {
        1
    }

    fn name(&self) -> &'static str {
        "event_resource_linkage"
    }

    fn precondition(&self, store: &dyn SchemaStore) -> Result<Precondition, StoreError> {
        let live = store.live_shape(Self::TABLE)?;
        if live.contains_any(&["resource_type", "resource_id"]) {
            return Ok(Precondition::Satisfied);
        }
        Ok(Precondition::Pending(live))
    }

    fn apply(&self, tx: &mut dyn StoreTransaction, live: &LiveShape) -> Result<(), StoreError> {
        let events = quote_ident(Self::TABLE);
        tx.exec(&format!("ALTER TABLE {events} ADD \"resource_type\" TEXT"))?;
        tx.exec(&format!("ALTER TABLE {events} ADD \"resource_id\" TEXT"))?;
        tx.exec(&format!("UPDATE {events} SET \"resource_type\" = '', \"resource_id\" = ''"))?;
        let deleted = tx.exec(&format!(
            "DELETE FROM \"credentials\" WHERE \"id\" = {}",
            quote_literal(Self::OBSOLETE_CREDENTIAL)
        ))?;
        tracing::debug!(deleted, "removed obsolete credential rows");

        if live.contains(Self::LEGACY_COLUMN) {
            let legacy = quote_ident(Self::LEGACY_COLUMN);
            let backfilled = tx.exec(&format!(
                "UPDATE {events} SET \"resource_type\" = 'prompt', \"resource_id\" = {legacy} \
                 WHERE {legacy} != ''"
            ))?;
            tracing::info!(backfilled, "linked legacy prompt events to their resource");
        }
        Ok(())
    }
}
