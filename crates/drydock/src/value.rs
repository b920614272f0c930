//! Runtime scalar values.

use drydock_schema::ScalarType;
use drydock_sql::Lit;
use std::hash::{Hash, Hasher};

/// A runtime scalar value, one variant per [`ScalarType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

// Float variants compare and hash by bit pattern so values can key the
// sub-map delta state.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Str(v) => v.hash(state),
            Value::I8(v) => v.hash(state),
            Value::I16(v) => v.hash(state),
            Value::I32(v) => v.hash(state),
            Value::I64(v) => v.hash(state),
            Value::U8(v) => v.hash(state),
            Value::U16(v) => v.hash(state),
            Value::U32(v) => v.hash(state),
            Value::U64(v) => v.hash(state),
            Value::F32(v) => v.to_bits().hash(state),
            Value::F64(v) => v.to_bits().hash(state),
        }
    }
}

impl Value {
    /// The scalar type this value belongs to.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Value::Str(_) => ScalarType::String,
            Value::I8(_) => ScalarType::Int8,
            Value::I16(_) => ScalarType::Int16,
            Value::I32(_) => ScalarType::Int32,
            Value::I64(_) => ScalarType::Int64,
            Value::U8(_) => ScalarType::UInt8,
            Value::U16(_) => ScalarType::UInt16,
            Value::U32(_) => ScalarType::UInt32,
            Value::U64(_) => ScalarType::UInt64,
            Value::F32(_) => ScalarType::Float,
            Value::F64(_) => ScalarType::Double,
        }
    }

    /// Whether this value matches `scalar`.
    pub fn matches(&self, scalar: ScalarType) -> bool {
        self.scalar_type() == scalar
    }

    /// The zero value for a scalar type, used to initialize fresh records.
    pub fn zero(scalar: ScalarType) -> Value {
        match scalar {
            ScalarType::String => Value::Str(String::new()),
            ScalarType::Int8 => Value::I8(0),
            ScalarType::Int16 => Value::I16(0),
            ScalarType::Int32 => Value::I32(0),
            ScalarType::Int64 => Value::I64(0),
            ScalarType::UInt8 => Value::U8(0),
            ScalarType::UInt16 => Value::U16(0),
            ScalarType::UInt32 => Value::U32(0),
            ScalarType::UInt64 => Value::U64(0),
            ScalarType::Float => Value::F32(0.0),
            ScalarType::Double => Value::F64(0.0),
        }
    }

    /// Decode a raw text cell by its declared scalar type.
    ///
    /// Returns `None` when the cell does not parse as the expected type;
    /// the caller attaches table/column context to the error.
    pub fn decode(scalar: ScalarType, raw: &str) -> Option<Value> {
        Some(match scalar {
            ScalarType::String => Value::Str(raw.to_string()),
            ScalarType::Int8 => Value::I8(raw.parse().ok()?),
            ScalarType::Int16 => Value::I16(raw.parse().ok()?),
            ScalarType::Int32 => Value::I32(raw.parse().ok()?),
            ScalarType::Int64 => Value::I64(raw.parse().ok()?),
            ScalarType::UInt8 => Value::U8(raw.parse().ok()?),
            ScalarType::UInt16 => Value::U16(raw.parse().ok()?),
            ScalarType::UInt32 => Value::U32(raw.parse().ok()?),
            ScalarType::UInt64 => Value::U64(raw.parse().ok()?),
            ScalarType::Float => Value::F32(raw.parse().ok()?),
            ScalarType::Double => Value::F64(raw.parse().ok()?),
        })
    }

    /// Render as a SQL value: strings double-quoted with escaping, numerics
    /// bare. Used in INSERT value lists and upsert assignments.
    pub fn literal(&self) -> String {
        self.to_string()
    }

    /// Render as a predicate operand: always double-quoted, matching the
    /// generated WHERE clause text.
    pub fn predicate_literal(&self) -> String {
        match self {
            Value::Str(_) => self.to_string(),
            numeric => format!("\"{}\"", numeric),
        }
    }
}

/// Strings render quoted and escaped, numerics as their plain decimal text.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Str(v) => write!(f, "{}", Lit(v)),
            Value::I8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

macro_rules! impl_from_numeric {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

impl_from_numeric! {
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
    f32 => F32, f64 => F64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_by_scalar_type() {
        assert_eq!(
            Value::decode(ScalarType::UInt32, "42"),
            Some(Value::U32(42))
        );
        assert_eq!(Value::decode(ScalarType::Int8, "-5"), Some(Value::I8(-5)));
        assert_eq!(
            Value::decode(ScalarType::String, "Thrall"),
            Some(Value::Str("Thrall".to_string()))
        );
        assert_eq!(
            Value::decode(ScalarType::Double, "1.5"),
            Some(Value::F64(1.5))
        );
        assert_eq!(Value::decode(ScalarType::UInt8, "-1"), None);
        assert_eq!(Value::decode(ScalarType::Int32, "abc"), None);
    }

    #[test]
    fn test_literal_rendering() {
        assert_eq!(Value::U32(7).literal(), "7");
        assert_eq!(Value::F32(1.5).literal(), "1.5");
        assert_eq!(Value::Str("Jaina".to_string()).literal(), "\"Jaina\"");
        assert_eq!(Value::Str("a\"b".to_string()).literal(), "\"a\\\"b\"");
        // Display is the single rendering both literal forms build on.
        assert_eq!(Value::I64(-3).to_string(), "-3");
        assert_eq!(Value::Str("x".to_string()).to_string(), "\"x\"");
    }

    #[test]
    fn test_predicate_literal_always_quoted() {
        assert_eq!(Value::U32(7).predicate_literal(), "\"7\"");
        assert_eq!(
            Value::Str("x".to_string()).predicate_literal(),
            "\"x\""
        );
    }

    #[test]
    fn test_float_values_key_maps_by_bits() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Value::F32(1.5));
        assert!(set.contains(&Value::F32(1.5)));
        assert!(!set.contains(&Value::F32(2.5)));
    }
}
