//! Batchflow-Store: SQLite backing for the pipeline audit log
//!
//! This crate provides an append-only audit table using SQLite with rusqlite
//! and r2d2 connection pooling. Several jobs of one run may share the same
//! database file, so every write is a plain insert guarded by the composite
//! `(partition_key, sort_key)` primary key.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use batchflow_store::pool::{init_pool, get_conn};
//! use batchflow_store::queries::audit_records;
//!
//! let pool = init_pool("/mnt/shared/batchflow-audit.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let rows = audit_records::list_partition(&conn, "run-1234").unwrap();
//! println!("{} records", rows.len());
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
