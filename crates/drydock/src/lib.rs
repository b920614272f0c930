//! Schema-drift reconciliation and entity persistence mapping.
//!
//! This crate turns a declarative entity schema (tables with typed scalar
//! fields, one or more key fields, and optional key/value sub-maps) into
//! two things built on the same model:
//!
//! - a reconciliation plan that evolves a live relational table to match
//!   the declared schema, escalating to a full rebuild when in-place
//!   migration would be unsafe (see [`reconcile`]), and
//! - a persistence mapping that loads, upserts and removes entity rows
//!   together with their sub-map rows, flushing only the sub-map entries
//!   that changed in memory (see [`EntityMapper`]).
//!
//! The entity model itself lives in `drydock-schema`; statement quoting in
//! `drydock-sql`. The connection layer is a collaborator: implement
//! [`Executor`], [`Catalog`] and [`ConnectionProvider`] over your driver
//! and hand them to [`sync_schema`].
//!
//! # Example
//!
//! ```ignore
//! use drydock::{sync_schema, EntityMapper, LogGate, Predicate};
//! use drydock_schema::{DatabaseId, EntityModel, ScalarType, SchemaRegistry};
//!
//! let player = EntityModel::builder("Player", DatabaseId::Characters)
//!     .primary_key("id", ScalarType::UInt32, "0")
//!     .field("name", ScalarType::String, "\"\"")
//!     .field("gold", ScalarType::UInt32, "0")
//!     .map("inventory", ScalarType::UInt32, ScalarType::UInt32)
//!     .build()?;
//!
//! let mut registry = SchemaRegistry::new();
//! registry.insert(player)?;
//! sync_schema(&registry, &mut catalog, &mut connections, &mut LogGate)?;
//!
//! let mapper = EntityMapper::new(registry.get("Player").unwrap());
//! let records = mapper.load(conn, &Predicate::new().eq("id", 7u32))?;
//! ```
//!
//! Execution is single-threaded and synchronous throughout: one table is
//! reconciled fully before the next is observed, and a failed statement
//! aborts the run without retry or rollback.

mod confirm;
mod error;
mod executor;
mod mapper;
mod reconcile;
mod record;
mod sync;
mod value;

pub use confirm::{ConfirmGate, LogGate, RecordingGate};
pub use error::Error;
pub use executor::{Catalog, ConnectionProvider, ExecuteError, Executor, RawRow};
pub use mapper::{EntityMapper, Predicate};
pub use reconcile::{MigrationAction, MigrationStep, ReconcilePlan, reconcile};
pub use record::{MapState, Record};
pub use sync::{SyncReport, sync_schema};
pub use value::Value;

// Re-export the model types for convenience.
pub use drydock_schema::{
    ColumnObservation, DatabaseId, EntityModel, FieldSpec, MapFieldSpec, ScalarType, SchemaError,
    SchemaRegistry,
};
