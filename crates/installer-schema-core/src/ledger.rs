//! Record of which versioned steps a store has seen.
//!
//! The ledger is informational; each step's own precondition decides
//! whether it runs.

use time::OffsetDateTime;

use crate::ddl::{quote_ident, quote_literal};

pub const LEDGER_TABLE: &str = "schema_migrations";

#[must_use]
pub fn create_ledger_table() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (version INTEGER PRIMARY KEY, name TEXT NOT NULL, applied_at TEXT NOT NULL)",
        quote_ident(LEDGER_TABLE)
    )
}

#[must_use]
pub fn record_step(version: u32, name: &str, applied_at: &str) -> String {
    format!(
        "INSERT OR IGNORE INTO {} (version, name, applied_at) VALUES ({version}, {}, {})",
        quote_ident(LEDGER_TABLE),
        quote_literal(name),
        quote_literal(applied_at)
    )
}

/// # Errors
/// Returns an error when the timestamp cannot be formatted.
pub fn now_rfc3339() -> Result<String, time::error::Format> {
    OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339)
}
