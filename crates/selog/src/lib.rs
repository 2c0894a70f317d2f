//! # selog
//!
//! Structured append-only log for the seboot supervisor.
//!
//! One record per line, wire form `[ts][type][pid][path][name]:message\n`.
//! Writes go through [`LogStore`], which rotates the active file into a
//! single backup generation at a size threshold under an exclusive file
//! lock. Reads go through [`LogQuery`], which scans backup-then-active and
//! applies a [`LogFilter`].

pub mod record;
pub mod store;
pub mod query;

pub use record::{LogRecord, RecordType, MAX_FIELD, MAX_MESSAGE, MAX_RECORD};
pub use store::{LogStore, StoreError};
pub use query::{FormatFlags, LogFilter, LogQuery, QueryError, QueryOutput};
