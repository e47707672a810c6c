//! Schema migrations for the audit database.
//!
//! The SQL files are compiled in. `schema_migrations` remembers the highest
//! version applied to a file, and every newer migration runs on open.

use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration {version} ({name}) failed: {reason}")]
    Failed {
        version: usize,
        name: &'static str,
        reason: String,
    },
}

/// `(version, name, sql)` in ascending version order.
type Step = (usize, &'static str, &'static str);

const STEPS: &[Step] = &[(1, "audit_log", include_str!("001_audit_log.sql"))];

const LEDGER: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

fn recorded_version(conn: &Connection) -> rusqlite::Result<usize> {
    let max: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(max.map_or(0, |v| v as usize))
}

/// Bring the schema up to date and return how many migrations ran.
///
/// Render slots of one run open the same file at about the same time, so
/// the version check and every pending migration share a single
/// `BEGIN IMMEDIATE` transaction. Any failure rolls all of them back.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply(conn, STEPS)
}

fn apply(conn: &Connection, steps: &[Step]) -> Result<usize, MigrationError> {
    // Dropping `tx` without commit rolls back.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    tx.execute_batch(LEDGER)?;

    let from = recorded_version(&tx)?;
    let pending: Vec<&Step> = steps.iter().filter(|(v, _, _)| *v > from).collect();
    for &&(version, name, sql) in &pending {
        tx.execute_batch(sql)
            .and_then(|()| {
                tx.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    params![version as i64, name],
                )
            })
            .map_err(|e| MigrationError::Failed {
                version,
                name,
                reason: e.to_string(),
            })?;
    }

    tx.commit()?;
    Ok(pending.len())
}

/// Version recorded in the file, without migrating.
pub fn current_version(conn: &Connection) -> Result<usize, MigrationError> {
    conn.execute_batch(LEDGER)?;
    Ok(recorded_version(conn)?)
}

pub fn latest_version() -> usize {
    STEPS.last().map_or(0, |(v, _, _)| *v)
}
