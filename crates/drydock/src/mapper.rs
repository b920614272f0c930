//! Per-entity persistence mapping.
//!
//! The mapper operates on the declared [`EntityModel`] only; it never looks
//! at the catalog. Every operation is a direct, synchronous statement
//! execution: no retries, and no transaction spans the scalar save and the
//! sub-map flush. If a map-delta statement fails after the scalar upsert
//! succeeded, the deltas stay pending and a repeated `save` completes the
//! flush (delta sets are only cleared on full success).

use crate::error::Error;
use crate::executor::Executor;
use crate::record::Record;
use crate::value::Value;
use drydock_schema::{EntityModel, FieldSpec, MAP_KEY_COLUMN, MAP_VALUE_COLUMN, MapFieldSpec};
use drydock_sql::{Ident, SqlWriter};

/// An equality predicate over one or more columns, rendered as
/// `col1 = "v1" AND col2 = "v2"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    terms: Vec<(String, Value)>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push((column.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn render(&self) -> String {
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|(col, v)| format!("{} = {}", col, v.predicate_literal()))
            .collect();
        parts.join(" AND ")
    }
}

/// The four canonical data-access operations for one entity.
pub struct EntityMapper<'a> {
    model: &'a EntityModel,
}

impl<'a> EntityMapper<'a> {
    pub fn new(model: &'a EntityModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &'a EntityModel {
        self.model
    }

    /// A fresh, zeroed record for this entity.
    pub fn new_record(&self) -> Record<'a> {
        Record::new(self.model)
    }

    /// `SELECT * FROM `table` WHERE <predicate>;`
    ///
    /// The predicate must carry at least one term; an empty one would
    /// render a dangling `WHERE`. [`EntityMapper::load`] rejects it.
    pub fn load_query_text(&self, predicate: &Predicate) -> String {
        let mut w = SqlWriter::new();
        w.token("SELECT * FROM")
            .token(Ident(self.model.table_name()))
            .token("WHERE")
            .token(predicate.render());
        w.finish()
    }

    /// Positional upsert over every declared field; every non-key field
    /// participates in the update clause.
    pub fn save_query_text(&self, record: &Record<'_>) -> String {
        let mut w = SqlWriter::new();
        w.token("INSERT INTO")
            .token(Ident(self.model.table_name()))
            .token("VALUES")
            .token("(")
            .tokens_sep(record.values().iter().map(Value::literal), " ,")
            .token(")");

        let updates: Vec<String> = self
            .model
            .fields()
            .iter()
            .zip(record.values())
            .filter(|(f, _)| !f.primary_key)
            .map(|(f, v)| format!("{} = {}", f.name, v.literal()))
            .collect();
        if !updates.is_empty() {
            w.token("ON DUPLICATE KEY UPDATE");
            w.tokens_sep(updates, " ,");
        }
        w.finish()
    }

    /// `DELETE FROM `table` WHERE <primary-key predicate>;`
    pub fn remove_query_text(&self, record: &Record<'_>) -> String {
        let mut w = SqlWriter::new();
        w.token("DELETE FROM")
            .token(Ident(self.model.table_name()))
            .token("WHERE")
            .token(self.pk_predicate(record).render());
        w.finish()
    }

    fn pk_predicate(&self, record: &Record<'_>) -> Predicate {
        record
            .primary_key_values()
            .into_iter()
            .fold(Predicate::new(), |p, (col, v)| p.eq(col, v.clone()))
    }

    fn map_load_sql(&self, map: &MapFieldSpec, record: &Record<'_>) -> String {
        let mut w = SqlWriter::new();
        w.token("SELECT * FROM")
            .token(Ident(map.subordinate_table(self.model)))
            .token("WHERE")
            .token(self.pk_predicate(record).render());
        w.finish()
    }

    fn map_upsert_sql(
        &self,
        map: &MapFieldSpec,
        record: &Record<'_>,
        key: &Value,
        value: &Value,
    ) -> String {
        let mut w = SqlWriter::new();
        w.token("INSERT INTO")
            .token(Ident(map.subordinate_table(self.model)))
            .token("VALUES")
            .token("(");
        let owner_pks = record
            .primary_key_values()
            .into_iter()
            .map(|(_, v)| v.literal());
        w.tokens_sep(
            owner_pks.chain([key.literal(), value.literal()]),
            " ,",
        );
        w.token(")")
            .token("ON DUPLICATE KEY UPDATE")
            .token(Ident(MAP_VALUE_COLUMN))
            .token("=")
            .token(value.literal());
        w.finish()
    }

    fn map_erase_sql(&self, map: &MapFieldSpec, record: &Record<'_>, key: &Value) -> String {
        let mut w = SqlWriter::new();
        w.token("DELETE FROM")
            .token(Ident(map.subordinate_table(self.model)))
            .token("WHERE")
            .token(self.pk_predicate(record).render())
            .token("AND")
            .token(Ident(MAP_KEY_COLUMN))
            .token("=")
            .token(key.literal());
        w.finish()
    }

    /// Execute the load query and decode one record per result row.
    ///
    /// Scalar cells are decoded positionally by each field's scalar type.
    /// Sub-maps are then populated from the subordinate tables through a
    /// silent set, so a freshly loaded record starts with a clean delta
    /// state.
    pub fn load(
        &self,
        executor: &mut dyn Executor,
        predicate: &Predicate,
    ) -> Result<Vec<Record<'a>>, Error> {
        if predicate.is_empty() {
            return Err(Error::EmptyPredicate {
                entity: self.model.name().to_string(),
            });
        }
        let table = self.model.table_name();
        let sql = self.load_query_text(predicate);
        tracing::debug!(target: "drydock::persist", %table, %sql, "load");
        let rows = executor.query(&sql)?;

        let fields = self.model.fields();
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != fields.len() {
                return Err(Error::RowShape {
                    table: table.clone(),
                    expected: fields.len(),
                    got: row.len(),
                });
            }
            let mut record = self.new_record();
            for (idx, (field, cell)) in fields.iter().zip(&row).enumerate() {
                let value = decode_cell(&table, field, cell)?;
                record.set_by_index(idx, value);
            }
            self.load_maps(executor, &mut record)?;
            records.push(record);
        }
        Ok(records)
    }

    fn load_maps(&self, executor: &mut dyn Executor, record: &mut Record<'a>) -> Result<(), Error> {
        let pk_count = self.model.primary_key_fields().count();
        for (idx, map) in self.model.maps().iter().enumerate() {
            let table = map.subordinate_table(self.model);
            let sql = self.map_load_sql(map, record);
            tracing::debug!(target: "drydock::persist", %table, %sql, "load sub-map");
            let rows = executor.query(&sql)?;
            for row in rows {
                // owner pks, then map_key, then map_value
                if row.len() != pk_count + 2 {
                    return Err(Error::RowShape {
                        table: table.clone(),
                        expected: pk_count + 2,
                        got: row.len(),
                    });
                }
                let key = decode_map_cell(&table, MAP_KEY_COLUMN, map.key, &row[pk_count])?;
                let value =
                    decode_map_cell(&table, MAP_VALUE_COLUMN, map.value, &row[pk_count + 1])?;
                record.map_state_mut(idx).set_silent(key, value);
            }
        }
        Ok(())
    }

    /// Upsert the scalar row, then flush each sub-map's deltas.
    ///
    /// Dirty keys are upserted, erased keys deleted, and a map's delta sets
    /// are cleared only once all of its statements succeeded.
    pub fn save(&self, executor: &mut dyn Executor, record: &mut Record<'_>) -> Result<(), Error> {
        let table = self.model.table_name();
        let sql = self.save_query_text(record);
        tracing::debug!(target: "drydock::persist", %table, %sql, "save");
        executor.execute(&sql)?;

        for (idx, map) in self.model.maps().iter().enumerate() {
            let state = &record.map_states()[idx];
            let mut statements = Vec::new();
            for (key, value) in state.dirty_entries() {
                statements.push(self.map_upsert_sql(map, record, key, value));
            }
            for key in state.erased_keys() {
                statements.push(self.map_erase_sql(map, record, key));
            }
            for sql in statements {
                tracing::debug!(target: "drydock::persist", %table, %sql, "flush sub-map");
                executor.execute(&sql)?;
            }
            record.map_state_mut(idx).clear_deltas();
        }
        Ok(())
    }

    /// Delete the scalar row only. Subordinate map rows are deliberately
    /// left in place (no cascade); see the orphan test below.
    pub fn remove(&self, executor: &mut dyn Executor, record: &Record<'_>) -> Result<(), Error> {
        let table = self.model.table_name();
        let sql = self.remove_query_text(record);
        tracing::debug!(target: "drydock::persist", %table, %sql, "remove");
        executor.execute(&sql)?;
        Ok(())
    }
}

fn decode_cell(table: &str, field: &FieldSpec, raw: &str) -> Result<Value, Error> {
    Value::decode(field.scalar, raw).ok_or_else(|| Error::Decode {
        table: table.to_string(),
        column: field.name.clone(),
        expected: field.scalar,
        raw: raw.to_string(),
    })
}

fn decode_map_cell(
    table: &str,
    column: &str,
    scalar: drydock_schema::ScalarType,
    raw: &str,
) -> Result<Value, Error> {
    Value::decode(scalar, raw).ok_or_else(|| Error::Decode {
        table: table.to_string(),
        column: column.to_string(),
        expected: scalar,
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecuteError, RawRow};
    use drydock_schema::{DatabaseId, ScalarType};
    use std::collections::VecDeque;

    /// Records every statement; serves queued result sets; optionally
    /// fails the Nth execute to simulate a partial flush.
    #[derive(Default)]
    struct MockExecutor {
        executed: Vec<String>,
        results: VecDeque<Vec<RawRow>>,
        fail_on_execute: Option<usize>,
    }

    impl Executor for MockExecutor {
        fn execute(&mut self, sql: &str) -> Result<(), ExecuteError> {
            if self.fail_on_execute == Some(self.executed.len()) {
                return Err(ExecuteError::new(sql, "simulated failure"));
            }
            self.executed.push(sql.to_string());
            Ok(())
        }

        fn query(&mut self, sql: &str) -> Result<Vec<RawRow>, ExecuteError> {
            self.executed.push(sql.to_string());
            Ok(self.results.pop_front().unwrap_or_default())
        }
    }

    fn player() -> EntityModel {
        EntityModel::builder("Player", DatabaseId::Characters)
            .primary_key("id", ScalarType::UInt32, "0")
            .field("name", ScalarType::String, "\"\"")
            .field("gold", ScalarType::UInt32, "0")
            .map("inventory", ScalarType::UInt32, ScalarType::UInt32)
            .build()
            .unwrap()
    }

    fn thrall<'a>(model: &'a EntityModel) -> Record<'a> {
        let mapper = EntityMapper::new(model);
        let mut rec = mapper.new_record();
        rec.set("id", 7u32).unwrap();
        rec.set("name", "Thrall").unwrap();
        rec.set("gold", 100u32).unwrap();
        rec
    }

    #[test]
    fn snapshot_load_query_text() {
        let model = player();
        let mapper = EntityMapper::new(&model);
        let predicate = Predicate::new().eq("id", 7u32);
        insta::assert_snapshot!(
            mapper.load_query_text(&predicate),
            @r#"SELECT * FROM `player` WHERE id = "7";"#
        );
    }

    #[test]
    fn snapshot_save_query_text() {
        let model = player();
        let mapper = EntityMapper::new(&model);
        let rec = thrall(&model);
        insta::assert_snapshot!(
            mapper.save_query_text(&rec),
            @r#"INSERT INTO `player` VALUES ( 7 , "Thrall" , 100 ) ON DUPLICATE KEY UPDATE name = "Thrall" , gold = 100;"#
        );
    }

    #[test]
    fn snapshot_remove_query_text() {
        let model = player();
        let mapper = EntityMapper::new(&model);
        let rec = thrall(&model);
        insta::assert_snapshot!(
            mapper.remove_query_text(&rec),
            @r#"DELETE FROM `player` WHERE id = "7";"#
        );
    }

    #[test]
    fn snapshot_map_statements() {
        let model = player();
        let mapper = EntityMapper::new(&model);
        let rec = thrall(&model);
        let map = &model.maps()[0];
        insta::assert_snapshot!(
            mapper.map_upsert_sql(map, &rec, &Value::U32(5), &Value::U32(2)),
            @r#"INSERT INTO `player_inventory` VALUES ( 7 , 5 , 2 ) ON DUPLICATE KEY UPDATE `map_value` = 2;"#
        );
        insta::assert_snapshot!(
            mapper.map_erase_sql(map, &rec, &Value::U32(5)),
            @r#"DELETE FROM `player_inventory` WHERE id = "7" AND `map_key` = 5;"#
        );
    }

    #[test]
    fn snapshot_composite_key_predicates() {
        let model = EntityModel::builder("CharacterSkill", DatabaseId::Characters)
            .primary_key("guid", ScalarType::UInt64, "0")
            .primary_key("skill", ScalarType::UInt16, "0")
            .field("value", ScalarType::UInt16, "0")
            .build()
            .unwrap();
        let mapper = EntityMapper::new(&model);
        let mut rec = mapper.new_record();
        rec.set("guid", 12u64).unwrap();
        rec.set("skill", 171u16).unwrap();
        insta::assert_snapshot!(
            mapper.remove_query_text(&rec),
            @r#"DELETE FROM `characterskill` WHERE guid = "12" AND skill = "171";"#
        );
    }

    #[test]
    fn test_save_flushes_deltas_then_clears() {
        let model = player();
        let mapper = EntityMapper::new(&model);
        let mut rec = thrall(&model);
        rec.map_mut("inventory").unwrap().set(Value::U32(5), Value::U32(2));
        rec.map_mut("inventory").unwrap().erase(&Value::U32(9));

        let mut exec = MockExecutor::default();
        mapper.save(&mut exec, &mut rec).unwrap();

        assert_eq!(exec.executed.len(), 3);
        assert!(exec.executed[0].starts_with("INSERT INTO `player` VALUES"));
        assert!(exec.executed[1].starts_with("INSERT INTO `player_inventory`"));
        assert!(exec.executed[2].starts_with("DELETE FROM `player_inventory`"));
        assert!(rec.map("inventory").unwrap().is_clean());
    }

    #[test]
    fn test_clean_maps_flush_nothing() {
        let model = player();
        let mapper = EntityMapper::new(&model);
        let mut rec = thrall(&model);

        let mut exec = MockExecutor::default();
        mapper.save(&mut exec, &mut rec).unwrap();
        assert_eq!(exec.executed.len(), 1);
    }

    #[test]
    fn test_partial_flush_keeps_deltas_for_retry() {
        let model = player();
        let mapper = EntityMapper::new(&model);
        let mut rec = thrall(&model);
        rec.map_mut("inventory").unwrap().set(Value::U32(5), Value::U32(2));

        // Scalar upsert succeeds, the sub-map upsert fails.
        let mut exec = MockExecutor {
            fail_on_execute: Some(1),
            ..Default::default()
        };
        assert!(mapper.save(&mut exec, &mut rec).is_err());
        assert!(!rec.map("inventory").unwrap().is_clean());

        // The scalar row is already durable; re-running save repeats the
        // upsert and completes the flush.
        let mut exec = MockExecutor::default();
        mapper.save(&mut exec, &mut rec).unwrap();
        assert_eq!(exec.executed.len(), 2);
        assert!(rec.map("inventory").unwrap().is_clean());
    }

    #[test]
    fn test_load_decodes_positionally_and_is_clean() {
        let model = player();
        let mapper = EntityMapper::new(&model);

        let mut exec = MockExecutor::default();
        exec.results.push_back(vec![vec![
            "7".to_string(),
            "Thrall".to_string(),
            "100".to_string(),
        ]]);
        // subordinate rows: owner pk, map_key, map_value
        exec.results.push_back(vec![
            vec!["7".to_string(), "5".to_string(), "2".to_string()],
            vec!["7".to_string(), "9".to_string(), "1".to_string()],
        ]);

        let records = mapper
            .load(&mut exec, &Predicate::new().eq("id", 7u32))
            .unwrap();
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.get("id"), Some(&Value::U32(7)));
        assert_eq!(rec.get("name"), Some(&Value::Str("Thrall".to_string())));
        assert_eq!(rec.get("gold"), Some(&Value::U32(100)));

        let inv = rec.map("inventory").unwrap();
        assert_eq!(inv.len(), 2);
        assert_eq!(inv.get(&Value::U32(5)), Some(&Value::U32(2)));
        assert_eq!(inv.get(&Value::U32(9)), Some(&Value::U32(1)));
        assert!(inv.is_clean());

        assert_eq!(
            exec.executed[1],
            "SELECT * FROM `player_inventory` WHERE id = \"7\";"
        );
    }

    #[test]
    fn test_load_rejects_empty_predicate() {
        let model = player();
        let mapper = EntityMapper::new(&model);
        let mut exec = MockExecutor::default();
        let err = mapper.load(&mut exec, &Predicate::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyPredicate { ref entity } if entity == "Player"));
        assert!(exec.executed.is_empty());
    }

    #[test]
    fn test_load_reports_undecodable_cells() {
        let model = player();
        let mapper = EntityMapper::new(&model);
        let mut exec = MockExecutor::default();
        exec.results.push_back(vec![vec![
            "seven".to_string(),
            "Thrall".to_string(),
            "100".to_string(),
        ]]);
        let err = mapper
            .load(&mut exec, &Predicate::new().eq("id", 7u32))
            .unwrap_err();
        assert!(matches!(err, Error::Decode { ref column, .. } if column == "id"));
    }

    #[test]
    fn test_remove_leaves_subordinate_rows() {
        // No cascade: removing the entity row leaves sub-map rows behind.
        // This mirrors the generated flow as shipped; orphaned rows in
        // subordinate tables are expected after a remove.
        let model = player();
        let mapper = EntityMapper::new(&model);
        let rec = thrall(&model);

        let mut exec = MockExecutor::default();
        mapper.remove(&mut exec, &rec).unwrap();
        assert_eq!(exec.executed.len(), 1);
        assert!(exec.executed[0].starts_with("DELETE FROM `player`"));
        assert!(!exec.executed.iter().any(|s| s.contains("player_inventory")));
    }
}
