//! Schema-drift reconciliation.
//!
//! Compares a table's declared fields against the columns the catalog
//! actually reports and produces an ordered migration plan. The comparison
//! is three-way: declared schema, observed column types, and primary-key
//! membership all participate in the tie-break rules.
//!
//! The planner never attempts a data-preserving migration across a
//! primary-key type change; that path escalates to a full drop-and-recreate
//! rebuild. String columns are never narrowed or widened in place either:
//! native width inference for text storage is unreliable, so a drifted
//! string column is always dropped and re-added.

use drydock_schema::{ColumnObservation, FieldSpec};
use drydock_sql::Ident;
use std::collections::HashSet;
use std::fmt;

/// What a migration step does.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationAction {
    /// Add a column with its write-type rendering.
    AddColumn(FieldSpec),
    /// Drop an existing column.
    DropColumn(String),
    /// Change a column's type in place.
    ModifyColumnType(FieldSpec),
    /// Drop the whole table ahead of a rebuild.
    DropTableIfExists,
    /// Create the table from the declared fields.
    CreateTable(Vec<FieldSpec>),
    /// Backfill NULLs with the field's default literal after a rebuild.
    BackfillDefault(FieldSpec),
}

/// One step of a migration plan.
///
/// Destructiveness is per step instance, not per action kind: the same
/// `AddColumn` is non-destructive when purely additive but destructive when
/// it re-adds a column that was just dropped for a type replacement, and
/// `CreateTable` is only destructive inside a rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStep {
    pub action: MigrationAction,
    pub destructive: bool,
}

impl MigrationStep {
    fn destructive(action: MigrationAction) -> Self {
        Self {
            action,
            destructive: true,
        }
    }

    fn additive(action: MigrationAction) -> Self {
        Self {
            action,
            destructive: false,
        }
    }

    /// Render this step as one executable statement against `table`.
    pub fn to_sql(&self, table: &str) -> String {
        match &self.action {
            MigrationAction::AddColumn(f) => format!(
                "ALTER TABLE {} ADD {} {};",
                Ident(table),
                f.name,
                f.scalar.write_type()
            ),
            MigrationAction::DropColumn(name) => {
                format!("ALTER TABLE {} DROP COLUMN {};", Ident(table), name)
            }
            MigrationAction::ModifyColumnType(f) => format!(
                "ALTER TABLE {} MODIFY COLUMN {} {};",
                Ident(table),
                f.name,
                f.scalar.write_type()
            ),
            MigrationAction::DropTableIfExists => {
                format!("DROP TABLE IF EXISTS {};", Ident(table))
            }
            MigrationAction::CreateTable(fields) => {
                let cols: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{} {}", f.name, f.scalar.write_type()))
                    .collect();
                let pks: Vec<&str> = fields
                    .iter()
                    .filter(|f| f.primary_key)
                    .map(|f| f.name.as_str())
                    .collect();
                format!(
                    "CREATE TABLE {} ( {}, PRIMARY KEY ({}) );",
                    Ident(table),
                    cols.join(", "),
                    pks.join(",")
                )
            }
            MigrationAction::BackfillDefault(f) => format!(
                "UPDATE {} SET {} = {} WHERE {} IS NULL;",
                Ident(table),
                f.name,
                f.default,
                f.name
            ),
        }
    }
}

impl fmt::Display for MigrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationAction::AddColumn(field) => {
                write!(f, "+ {}: {}", field.name, field.scalar.write_type())
            }
            MigrationAction::DropColumn(name) => write!(f, "- {}", name),
            MigrationAction::ModifyColumnType(field) => {
                write!(f, "~ {} -> {}", field.name, field.scalar.write_type())
            }
            MigrationAction::DropTableIfExists => write!(f, "- table"),
            MigrationAction::CreateTable(fields) => {
                write!(f, "+ table ({} columns)", fields.len())
            }
            MigrationAction::BackfillDefault(field) => {
                write!(f, "~ backfill {} = {}", field.name, field.default)
            }
        }
    }
}

/// The outcome of one reconciliation pass over one table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconcilePlan {
    /// Steps in execution order.
    pub steps: Vec<MigrationStep>,
    /// Whether the plan is a full drop-and-recreate rebuild.
    pub rebuild: bool,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Compute the migration plan for one table.
///
/// `observed` is a fresh catalog snapshot: one entry per existing column in
/// catalog order, empty if the table does not exist.
pub fn reconcile(fields: &[FieldSpec], observed: &[ColumnObservation]) -> ReconcilePlan {
    // Table absent: first creation is not destructive.
    if observed.is_empty() {
        return ReconcilePlan {
            steps: vec![MigrationStep::additive(MigrationAction::CreateTable(
                fields.to_vec(),
            ))],
            rebuild: false,
        };
    }

    let mut rebuild = false;
    let mut scan_aborted = false;
    let mut matched: HashSet<&str> = HashSet::new();
    let mut steps = Vec::new();

    for obs in observed {
        let Some(field) = fields.iter().find(|f| f.name == obs.name) else {
            // Declared schema no longer has this column.
            steps.push(MigrationStep::destructive(MigrationAction::DropColumn(
                obs.name.clone(),
            )));
            continue;
        };
        matched.insert(field.name.as_str());

        if obs.column_type == field.scalar.read_type() {
            continue;
        }

        if field.scalar.is_string() || obs.column_type == "TEXT" {
            // Text on either side: migrate by replacement, never in place.
            steps.push(MigrationStep::destructive(MigrationAction::DropColumn(
                field.name.clone(),
            )));
            steps.push(MigrationStep::destructive(MigrationAction::AddColumn(
                field.clone(),
            )));
        } else if obs.primary_key {
            // A primary-key column's type changed; in-place migration of a
            // key column is unsafe, escalate to a rebuild.
            rebuild = true;
            scan_aborted = true;
            break;
        } else {
            steps.push(MigrationStep::destructive(
                MigrationAction::ModifyColumnType(field.clone()),
            ));
        }
    }

    if !scan_aborted {
        for field in fields {
            if matched.contains(field.name.as_str()) {
                continue;
            }
            if field.primary_key {
                // A new primary key cannot be retrofitted onto an existing
                // table.
                rebuild = true;
            } else {
                steps.push(MigrationStep::additive(MigrationAction::AddColumn(
                    field.clone(),
                )));
            }
        }
    }

    if rebuild {
        // The backfills run against a freshly created, empty table; they
        // are retained for parity with the generated flow and kept
        // idempotent (NULL rows only).
        let mut steps = vec![
            MigrationStep::destructive(MigrationAction::DropTableIfExists),
            MigrationStep::destructive(MigrationAction::CreateTable(fields.to_vec())),
        ];
        steps.extend(
            fields
                .iter()
                .filter(|f| !f.primary_key)
                .map(|f| MigrationStep::additive(MigrationAction::BackfillDefault(f.clone()))),
        );
        return ReconcilePlan {
            steps,
            rebuild: true,
        };
    }

    ReconcilePlan {
        steps,
        rebuild: false,
    }
}
