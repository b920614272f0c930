use drydock_schema::{ScalarType, SchemaError};
use thiserror::Error;

use crate::executor::ExecuteError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Execute(#[from] ExecuteError),

    #[error("table {table}: column {column}: cannot decode {raw:?} as {expected}")]
    Decode {
        table: String,
        column: String,
        expected: ScalarType,
        raw: String,
    },

    #[error("table {table}: expected {expected} columns per row, got {got}")]
    RowShape {
        table: String,
        expected: usize,
        got: usize,
    },

    #[error("entity {entity}: load requires a non-empty predicate")]
    EmptyPredicate { entity: String },

    #[error("entity {entity} has no field {field}")]
    UnknownField { entity: String, field: String },

    #[error("entity {entity} has no sub-map {map}")]
    UnknownMap { entity: String, map: String },

    #[error("entity {entity}: field {field} expects a {expected} value")]
    ValueType {
        entity: String,
        field: String,
        expected: ScalarType,
    },
}
