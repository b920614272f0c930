//! Collaborator traits for the data layer.
//!
//! The connection/transport layer for the three logical databases is not
//! part of this crate. Everything here executes synchronously; a failed
//! statement aborts the current run, nothing is retried.

use drydock_schema::{ColumnObservation, DatabaseId};
use thiserror::Error;

/// A statement execution failure reported by the data layer.
#[derive(Debug, Clone, Error)]
#[error("statement failed: {message}: {statement}")]
pub struct ExecuteError {
    /// The statement that failed.
    pub statement: String,
    /// Driver-reported failure message.
    pub message: String,
}

impl ExecuteError {
    pub fn new(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            message: message.into(),
        }
    }
}

/// A raw result row: one text cell per selected column, in select order.
///
/// Cells are decoded positionally by the caller using each declared
/// field's scalar type.
pub type RawRow = Vec<String>;

/// Synchronous statement execution against one logical database.
pub trait Executor {
    /// Execute a statement that returns no rows.
    fn execute(&mut self, sql: &str) -> Result<(), ExecuteError>;

    /// Execute a query and return its rows as raw text cells.
    fn query(&mut self, sql: &str) -> Result<Vec<RawRow>, ExecuteError>;
}

/// Live catalog introspection.
pub trait Catalog {
    /// Observed columns of `table`, one entry per existing column in
    /// catalog order, or empty if the table does not exist.
    fn columns(
        &mut self,
        database: DatabaseId,
        table: &str,
    ) -> Result<Vec<ColumnObservation>, ExecuteError>;
}

/// Hands out the process-wide connection handle per logical database.
pub trait ConnectionProvider {
    fn connection(&mut self, database: DatabaseId) -> &mut dyn Executor;
}
