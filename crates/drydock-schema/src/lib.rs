//! Entity schema model for drydock.
//!
//! This crate contains the declarative schema types shared between the
//! reconciliation differ and the persistence mapper: scalar types with
//! their catalog/DDL renderings, field and sub-map specs, the validated
//! [`EntityModel`], and the [`SchemaRegistry`] passed into a sync run.
//!
//! Models are built once through [`EntityModel::builder`] and immutable
//! afterwards. Validation is eager: a schema that declares no primary key,
//! a string-typed primary key, or a field without a default literal never
//! produces a model at all.

use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A schema validation error, fatal at model construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("entity {entity} declares no primary key field")]
    NoPrimaryKey { entity: String },

    #[error("entity {entity}: primary key field {field} cannot be string-typed")]
    StringPrimaryKey { entity: String, field: String },

    #[error("entity {entity}: field {field} has no default literal")]
    MissingDefault { entity: String, field: String },

    #[error("entity {entity}: duplicate field {field}")]
    DuplicateField { entity: String, field: String },

    #[error("entity {entity}: duplicate sub-map {map}")]
    DuplicateMap { entity: String, map: String },

    #[error("duplicate entity {entity} in registry")]
    DuplicateEntity { entity: String },

    #[error("unknown scalar type: {name}")]
    UnknownScalarType { name: String },
}

/// The closed set of scalar column types.
///
/// Each type has two SQL renderings: the *read* type is what the catalog
/// reports for an existing column (width annotations included) and is used
/// to detect drift; the *write* type is what goes into ALTER/CREATE
/// statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
}

impl ScalarType {
    /// Catalog rendering, compared against observed column types.
    pub fn read_type(self) -> &'static str {
        match self {
            ScalarType::String => "TEXT",
            ScalarType::Int8 => "TINYINT(4)",
            ScalarType::Int16 => "SMALLINT(6)",
            ScalarType::Int32 => "INT(11)",
            ScalarType::Int64 => "BIGINT(20)",
            ScalarType::UInt8 => "TINYINT(3) UNSIGNED",
            ScalarType::UInt16 => "SMALLINT(5) UNSIGNED",
            ScalarType::UInt32 => "INT(10) UNSIGNED",
            ScalarType::UInt64 => "BIGINT(20) UNSIGNED",
            ScalarType::Float => "FLOAT",
            ScalarType::Double => "DOUBLE",
        }
    }

    /// DDL rendering, emitted in ALTER/CREATE statements.
    pub fn write_type(self) -> &'static str {
        match self {
            ScalarType::String => "TEXT",
            ScalarType::Int8 => "TINYINT",
            ScalarType::Int16 => "SMALLINT",
            ScalarType::Int32 => "INT",
            ScalarType::Int64 => "BIGINT",
            ScalarType::UInt8 => "TINYINT UNSIGNED",
            ScalarType::UInt16 => "SMALLINT UNSIGNED",
            ScalarType::UInt32 => "INT UNSIGNED",
            ScalarType::UInt64 => "BIGINT UNSIGNED",
            ScalarType::Float => "FLOAT",
            ScalarType::Double => "DOUBLE",
        }
    }

    /// Canonical declaration name.
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Int8 => "int8",
            ScalarType::Int16 => "int16",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::UInt8 => "uint8",
            ScalarType::UInt16 => "uint16",
            ScalarType::UInt32 => "uint32",
            ScalarType::UInt64 => "uint64",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }

    pub fn is_string(self) -> bool {
        matches!(self, ScalarType::String)
    }

    /// SQL literal used as the implicit default for derived sub-map columns.
    pub fn zero_literal(self) -> &'static str {
        match self {
            ScalarType::String => "\"\"",
            _ => "0",
        }
    }
}

impl FromStr for ScalarType {
    type Err = SchemaError;

    /// Parses a declaration type name. `int` is an alias for `int32`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "string" => ScalarType::String,
            "int8" => ScalarType::Int8,
            "int16" => ScalarType::Int16,
            "int" | "int32" => ScalarType::Int32,
            "int64" => ScalarType::Int64,
            "uint8" => ScalarType::UInt8,
            "uint16" => ScalarType::UInt16,
            "uint32" => ScalarType::UInt32,
            "uint64" => ScalarType::UInt64,
            "float" => ScalarType::Float,
            "double" => ScalarType::Double,
            other => {
                return Err(SchemaError::UnknownScalarType {
                    name: other.to_string(),
                });
            }
        })
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the fixed logical target databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseId {
    World,
    Auth,
    Characters,
}

impl DatabaseId {
    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseId::World => "world",
            DatabaseId::Auth => "auth",
            DatabaseId::Characters => "characters",
        }
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared scalar column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Column name, unique within its table.
    pub name: String,
    /// Scalar type.
    pub scalar: ScalarType,
    /// Primary key membership.
    pub primary_key: bool,
    /// Default SQL literal, used only to backfill NULLs after a rebuild.
    pub default: String,
}

impl FieldSpec {
    pub fn new(
        name: impl Into<String>,
        scalar: ScalarType,
        primary_key: bool,
        default: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            scalar,
            primary_key,
            default: default.into(),
        }
    }
}

/// A declared key/value sub-map, backed by a subordinate table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapFieldSpec {
    /// Map name, unique within its owning entity.
    pub name: String,
    /// Key type, part of the subordinate table's primary key.
    pub key: ScalarType,
    /// Value type.
    pub value: ScalarType,
}

/// Name of the fixed key column in subordinate tables.
pub const MAP_KEY_COLUMN: &str = "map_key";
/// Name of the fixed value column in subordinate tables.
pub const MAP_VALUE_COLUMN: &str = "map_value";

impl MapFieldSpec {
    pub fn new(name: impl Into<String>, key: ScalarType, value: ScalarType) -> Self {
        Self {
            name: name.into(),
            key,
            value,
        }
    }

    /// Subordinate table name: `lowercase(owner) + "_" + lowercase(map)`.
    pub fn subordinate_table(&self, owner: &EntityModel) -> String {
        format!(
            "{}_{}",
            owner.name.to_lowercase(),
            self.name.to_lowercase()
        )
    }

    /// Effective column schema of the subordinate table: the owner's
    /// primary-key fields in declaration order, then `map_key` (primary
    /// key), then `map_value`.
    pub fn columns(&self, owner: &EntityModel) -> Vec<FieldSpec> {
        let mut cols: Vec<FieldSpec> = owner.primary_key_fields().cloned().collect();
        cols.push(FieldSpec::new(
            MAP_KEY_COLUMN,
            self.key,
            true,
            self.key.zero_literal(),
        ));
        cols.push(FieldSpec::new(
            MAP_VALUE_COLUMN,
            self.value,
            false,
            self.value.zero_literal(),
        ));
        cols
    }
}

/// An immutable declared entity: one table plus any subordinate map tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityModel {
    name: String,
    database: DatabaseId,
    fields: Vec<FieldSpec>,
    maps: Vec<MapFieldSpec>,
}

impl EntityModel {
    /// Start building a model. Validation happens in
    /// [`EntityModelBuilder::build`].
    pub fn builder(name: impl Into<String>, database: DatabaseId) -> EntityModelBuilder {
        EntityModelBuilder {
            name: name.into(),
            database,
            fields: Vec::new(),
            maps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database(&self) -> DatabaseId {
        self.database
    }

    /// Table name: lowercase of the entity name.
    pub fn table_name(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn maps(&self) -> &[MapFieldSpec] {
        &self.maps
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn map_index(&self, name: &str) -> Option<usize> {
        self.maps.iter().position(|m| m.name == name)
    }

    /// Primary-key fields in declaration order.
    pub fn primary_key_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.primary_key)
    }
}

/// Builder for [`EntityModel`]; the only way to construct one.
pub struct EntityModelBuilder {
    name: String,
    database: DatabaseId,
    fields: Vec<FieldSpec>,
    maps: Vec<MapFieldSpec>,
}

impl EntityModelBuilder {
    /// Declare a primary-key field.
    pub fn primary_key(
        self,
        name: impl Into<String>,
        scalar: ScalarType,
        default: impl Into<String>,
    ) -> Self {
        self.push(FieldSpec::new(name, scalar, true, default))
    }

    /// Declare a plain scalar field.
    pub fn field(
        self,
        name: impl Into<String>,
        scalar: ScalarType,
        default: impl Into<String>,
    ) -> Self {
        self.push(FieldSpec::new(name, scalar, false, default))
    }

    fn push(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare a key/value sub-map.
    pub fn map(mut self, name: impl Into<String>, key: ScalarType, value: ScalarType) -> Self {
        self.maps.push(MapFieldSpec::new(name, key, value));
        self
    }

    /// Validate and freeze the model.
    pub fn build(self) -> Result<EntityModel, SchemaError> {
        let entity = &self.name;

        let mut seen = IndexMap::new();
        for field in &self.fields {
            if seen.insert(field.name.clone(), ()).is_some() {
                return Err(SchemaError::DuplicateField {
                    entity: entity.clone(),
                    field: field.name.clone(),
                });
            }
            if field.primary_key && field.scalar.is_string() {
                return Err(SchemaError::StringPrimaryKey {
                    entity: entity.clone(),
                    field: field.name.clone(),
                });
            }
            if field.default.is_empty() {
                return Err(SchemaError::MissingDefault {
                    entity: entity.clone(),
                    field: field.name.clone(),
                });
            }
        }

        if !self.fields.iter().any(|f| f.primary_key) {
            return Err(SchemaError::NoPrimaryKey {
                entity: entity.clone(),
            });
        }

        let mut seen_maps = IndexMap::new();
        for map in &self.maps {
            if seen_maps.insert(map.name.clone(), ()).is_some() {
                return Err(SchemaError::DuplicateMap {
                    entity: entity.clone(),
                    map: map.name.clone(),
                });
            }
        }

        Ok(EntityModel {
            name: self.name,
            database: self.database,
            fields: self.fields,
            maps: self.maps,
        })
    }
}

/// The ordered set of declared entities for one generation/sync pass.
///
/// Passed explicitly into the sync entry point; there is no process-wide
/// registry. Iteration order is declaration order, which is also the order
/// tables are reconciled in.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: IndexMap<String, EntityModel>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: EntityModel) -> Result<(), SchemaError> {
        if self.entities.contains_key(model.name()) {
            return Err(SchemaError::DuplicateEntity {
                entity: model.name().to_string(),
            });
        }
        self.entities.insert(model.name().to_string(), model);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&EntityModel> {
        self.entities.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityModel> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// One existing column as reported by the catalog.
///
/// Produced fresh for every reconciliation run and discarded once the plan
/// is computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnObservation {
    /// Column name.
    pub name: String,
    /// Raw catalog type string, normalized to uppercase.
    pub column_type: String,
    /// Primary-key membership.
    pub primary_key: bool,
}

impl ColumnObservation {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>, primary_key: bool) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into().to_uppercase(),
            primary_key,
        }
    }
}
