//! Sequential schema sync.
//!
//! Drives one full reconciliation pass over a [`SchemaRegistry`]: for each
//! entity in declaration order, then for each of its subordinate map
//! tables, take a fresh catalog snapshot, compute the plan, announce every
//! destructive step through the gate, and execute the rendered statements.
//!
//! Tables are processed strictly one after another; a table's statements
//! are fully executed before the next table is even observed. The first
//! statement failure aborts the whole run.

use crate::confirm::ConfirmGate;
use crate::error::Error;
use crate::executor::{Catalog, ConnectionProvider};
use crate::reconcile::reconcile;
use drydock_schema::{DatabaseId, FieldSpec, SchemaRegistry};

/// Summary of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Tables brought up to date (including already-clean ones).
    pub tables: usize,
    /// Statements executed.
    pub statements: usize,
    /// Tables that went through a full rebuild.
    pub rebuilt: Vec<String>,
}

/// Reconcile every declared table against the live catalog.
pub fn sync_schema(
    registry: &SchemaRegistry,
    catalog: &mut dyn Catalog,
    connections: &mut dyn ConnectionProvider,
    gate: &mut dyn ConfirmGate,
) -> Result<SyncReport, Error> {
    let mut report = SyncReport::default();
    for model in registry.iter() {
        sync_table(
            model.database(),
            &model.table_name(),
            model.fields(),
            catalog,
            connections,
            gate,
            &mut report,
        )?;
        for map in model.maps() {
            sync_table(
                model.database(),
                &map.subordinate_table(model),
                &map.columns(model),
                catalog,
                connections,
                gate,
                &mut report,
            )?;
        }
    }
    Ok(report)
}

fn sync_table(
    database: DatabaseId,
    table: &str,
    fields: &[FieldSpec],
    catalog: &mut dyn Catalog,
    connections: &mut dyn ConnectionProvider,
    gate: &mut dyn ConfirmGate,
    report: &mut SyncReport,
) -> Result<(), Error> {
    let span = tracing::debug_span!("sync_table", %database, %table);
    let _guard = span.enter();

    let observed = catalog.columns(database, table)?;
    let plan = reconcile(fields, &observed);
    if plan.is_empty() {
        tracing::debug!("table up to date");
        report.tables += 1;
        return Ok(());
    }
    if plan.rebuild {
        tracing::debug!("schema drift on a key column, table will be rebuilt");
        report.rebuilt.push(table.to_string());
    }

    let executor = connections.connection(database);
    for step in &plan.steps {
        if step.destructive {
            gate.confirm(&format!("{table}: {}", step.action));
        }
        let sql = step.to_sql(table);
        tracing::debug!(%sql, "executing");
        executor.execute(&sql)?;
        report.statements += 1;
    }
    report.tables += 1;
    Ok(())
}
