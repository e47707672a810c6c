//! Database query modules.
//!
//! - audit_records: append and read back audit log rows

pub mod audit_records;
