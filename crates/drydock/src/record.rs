//! In-memory entity instances and sub-map delta state.

use crate::error::Error;
use crate::value::Value;
use drydock_schema::EntityModel;
use indexmap::{IndexMap, IndexSet};

/// Delta-tracked key/value state for one sub-map instance.
///
/// Keys written since the last flush are *dirty*; keys explicitly removed
/// are *erased*. The two sets are disjoint: the most recent operation on a
/// key wins, so a set clears the erased mark and an erase clears the dirty
/// mark. Both sets empty out after every successful flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapState {
    entries: IndexMap<Value, Value>,
    dirty: IndexSet<Value>,
    erased: IndexSet<Value>,
}

impl MapState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter()
    }

    /// Write a key and mark it dirty.
    pub fn set(&mut self, key: Value, value: Value) {
        self.erased.shift_remove(&key);
        self.entries.insert(key.clone(), value);
        self.dirty.insert(key);
    }

    /// Write a key without touching the delta state. Used when populating
    /// a freshly loaded record, which must start clean.
    pub(crate) fn set_silent(&mut self, key: Value, value: Value) {
        self.entries.insert(key, value);
    }

    /// Remove a key and mark it erased.
    pub fn erase(&mut self, key: &Value) {
        self.entries.shift_remove(key);
        self.dirty.shift_remove(key);
        self.erased.insert(key.clone());
    }

    pub fn dirty_keys(&self) -> impl Iterator<Item = &Value> {
        self.dirty.iter()
    }

    /// Dirty keys paired with their current values. Every dirty key has an
    /// entry: erasing a key removes its dirty mark along with the entry.
    pub fn dirty_entries(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.dirty
            .iter()
            .filter_map(|k| self.entries.get(k).map(|v| (k, v)))
    }

    pub fn erased_keys(&self) -> impl Iterator<Item = &Value> {
        self.erased.iter()
    }

    /// No pending deltas.
    pub fn is_clean(&self) -> bool {
        self.dirty.is_empty() && self.erased.is_empty()
    }

    pub(crate) fn clear_deltas(&mut self) {
        self.dirty.clear();
        self.erased.clear();
    }
}

/// One entity instance: positional scalar values aligned with the model's
/// declared fields, plus one [`MapState`] per declared sub-map.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<'a> {
    model: &'a EntityModel,
    values: Vec<Value>,
    maps: Vec<MapState>,
}

impl<'a> Record<'a> {
    /// A fresh record with zero values and empty, clean maps.
    pub fn new(model: &'a EntityModel) -> Self {
        Self {
            model,
            values: model.fields().iter().map(|f| Value::zero(f.scalar)).collect(),
            maps: model.maps().iter().map(|_| MapState::new()).collect(),
        }
    }

    pub fn model(&self) -> &'a EntityModel {
        self.model
    }

    /// Field values in declaration order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        let idx = self.model.field_index(field)?;
        Some(&self.values[idx])
    }

    /// Set a scalar field. The value must match the field's declared type.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), Error> {
        let idx = self
            .model
            .field_index(field)
            .ok_or_else(|| Error::UnknownField {
                entity: self.model.name().to_string(),
                field: field.to_string(),
            })?;
        let value = value.into();
        let spec = &self.model.fields()[idx];
        if !value.matches(spec.scalar) {
            return Err(Error::ValueType {
                entity: self.model.name().to_string(),
                field: field.to_string(),
                expected: spec.scalar,
            });
        }
        self.values[idx] = value;
        Ok(())
    }

    pub(crate) fn set_by_index(&mut self, idx: usize, value: Value) {
        self.values[idx] = value;
    }

    pub fn map(&self, name: &str) -> Option<&MapState> {
        let idx = self.model.map_index(name)?;
        Some(&self.maps[idx])
    }

    pub fn map_mut(&mut self, name: &str) -> Result<&mut MapState, Error> {
        let idx = self.model.map_index(name).ok_or_else(|| Error::UnknownMap {
            entity: self.model.name().to_string(),
            map: name.to_string(),
        })?;
        Ok(&mut self.maps[idx])
    }

    pub(crate) fn map_states(&self) -> &[MapState] {
        &self.maps
    }

    pub(crate) fn map_state_mut(&mut self, idx: usize) -> &mut MapState {
        &mut self.maps[idx]
    }

    /// Primary-key values in declaration order, paired with column names.
    pub fn primary_key_values(&self) -> Vec<(&str, &Value)> {
        self.model
            .fields()
            .iter()
            .zip(&self.values)
            .filter(|(f, _)| f.primary_key)
            .map(|(f, v)| (f.name.as_str(), v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drydock_schema::{DatabaseId, ScalarType};

    fn player() -> EntityModel {
        EntityModel::builder("Player", DatabaseId::Characters)
            .primary_key("id", ScalarType::UInt32, "0")
            .field("name", ScalarType::String, "\"\"")
            .field("gold", ScalarType::UInt32, "0")
            .map("inventory", ScalarType::UInt32, ScalarType::UInt32)
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_record_is_zeroed_and_clean() {
        let model = player();
        let rec = Record::new(&model);
        assert_eq!(rec.get("id"), Some(&Value::U32(0)));
        assert_eq!(rec.get("name"), Some(&Value::Str(String::new())));
        assert!(rec.map("inventory").unwrap().is_clean());
    }

    #[test]
    fn test_set_rejects_wrong_type() {
        let model = player();
        let mut rec = Record::new(&model);
        let err = rec.set("gold", "lots").unwrap_err();
        assert!(matches!(err, Error::ValueType { .. }));
        let err = rec.set("honor", 1u32).unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));
    }

    #[test]
    fn test_set_marks_dirty_and_unmarks_erased() {
        let model = player();
        let mut rec = Record::new(&model);
        let inv = rec.map_mut("inventory").unwrap();

        inv.erase(&Value::U32(5));
        assert_eq!(inv.erased_keys().count(), 1);

        inv.set(Value::U32(5), Value::U32(1));
        assert_eq!(inv.erased_keys().count(), 0);
        assert_eq!(inv.dirty_keys().collect::<Vec<_>>(), [&Value::U32(5)]);
        assert_eq!(inv.get(&Value::U32(5)), Some(&Value::U32(1)));
    }

    #[test]
    fn test_erase_marks_erased_and_unmarks_dirty() {
        let model = player();
        let mut rec = Record::new(&model);
        let inv = rec.map_mut("inventory").unwrap();

        inv.set(Value::U32(5), Value::U32(1));
        inv.erase(&Value::U32(5));

        assert_eq!(inv.dirty_keys().count(), 0);
        assert_eq!(inv.erased_keys().collect::<Vec<_>>(), [&Value::U32(5)]);
        assert_eq!(inv.get(&Value::U32(5)), None);
    }

    #[test]
    fn test_silent_set_stays_clean() {
        let mut state = MapState::new();
        state.set_silent(Value::U32(1), Value::U32(10));
        assert!(state.is_clean());
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_primary_key_values() {
        let model = player();
        let mut rec = Record::new(&model);
        rec.set("id", 7u32).unwrap();
        let pks = rec.primary_key_values();
        assert_eq!(pks.len(), 1);
        assert_eq!(pks[0], ("id", &Value::U32(7)));
    }
}
