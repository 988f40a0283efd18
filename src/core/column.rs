use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::ring::Ring;
use crate::error::GraphError;

/// Scalar kinds a store column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
}

impl ColumnType {
    pub const ALL: [Self; 6] = [
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Float,
        Self::Double,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnType {
    type Err = GraphError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .or(match normalized.as_str() {
                "i32" | "int" => Some(Self::Int32),
                "u32" | "uint" => Some(Self::UInt32),
                "i64" => Some(Self::Int64),
                "u64" => Some(Self::UInt64),
                "f32" => Some(Self::Float),
                "f64" => Some(Self::Double),
                _ => None,
            })
            .ok_or_else(|| GraphError::UnsupportedColumnType(input.to_owned()))
    }
}

/// One scalar read from or written to a store column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
}

impl Value {
    #[must_use]
    pub const fn column_type(self) -> ColumnType {
        match self {
            Self::Int32(_) => ColumnType::Int32,
            Self::UInt32(_) => ColumnType::UInt32,
            Self::Int64(_) => ColumnType::Int64,
            Self::UInt64(_) => ColumnType::UInt64,
            Self::Float(_) => ColumnType::Float,
            Self::Double(_) => ColumnType::Double,
        }
    }

    /// Widens to `f64`. Large 64-bit integers lose precision.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int32(v) => f64::from(v),
            Self::UInt32(v) => f64::from(v),
            Self::Int64(v) => v as f64,
            Self::UInt64(v) => v as f64,
            Self::Float(v) => f64::from(v),
            Self::Double(v) => v,
        }
    }

    /// Converts to `kind` with `as` semantics: integer narrowing wraps,
    /// float to integer saturates and drops the fraction.
    #[must_use]
    pub fn coerce(self, kind: ColumnType) -> Self {
        if self.column_type() == kind {
            return self;
        }
        match self.as_i128() {
            // Widened losslessly, so the cast wraps like a direct one.
            Some(v) => match kind {
                ColumnType::Int32 => Self::Int32(v as i32),
                ColumnType::UInt32 => Self::UInt32(v as u32),
                ColumnType::Int64 => Self::Int64(v as i64),
                ColumnType::UInt64 => Self::UInt64(v as u64),
                ColumnType::Float => Self::Float(v as f32),
                ColumnType::Double => Self::Double(v as f64),
            },
            None => {
                let wide = self.as_f64();
                match kind {
                    ColumnType::Int32 => Self::Int32(wide as i32),
                    ColumnType::UInt32 => Self::UInt32(wide as u32),
                    ColumnType::Int64 => Self::Int64(wide as i64),
                    ColumnType::UInt64 => Self::UInt64(wide as u64),
                    ColumnType::Float => Self::Float(wide as f32),
                    ColumnType::Double => Self::Double(wide),
                }
            }
        }
    }

    fn as_i128(self) -> Option<i128> {
        match self {
            Self::Int32(v) => Some(i128::from(v)),
            Self::UInt32(v) => Some(i128::from(v)),
            Self::Int64(v) => Some(i128::from(v)),
            Self::UInt64(v) => Some(i128::from(v)),
            Self::Float(_) | Self::Double(_) => None,
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_value_from!(
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
);

/// Typed ring storage for one column.
#[derive(Debug, Clone)]
pub(crate) enum ColumnData {
    Int32(Ring<i32>),
    UInt32(Ring<u32>),
    Int64(Ring<i64>),
    UInt64(Ring<u64>),
    Float(Ring<f32>),
    Double(Ring<f64>),
}

impl ColumnData {
    pub(crate) fn new(kind: ColumnType, capacity: usize) -> Self {
        match kind {
            ColumnType::Int32 => Self::Int32(Ring::new(capacity)),
            ColumnType::UInt32 => Self::UInt32(Ring::new(capacity)),
            ColumnType::Int64 => Self::Int64(Ring::new(capacity)),
            ColumnType::UInt64 => Self::UInt64(Ring::new(capacity)),
            ColumnType::Float => Self::Float(Ring::new(capacity)),
            ColumnType::Double => Self::Double(Ring::new(capacity)),
        }
    }

    pub(crate) fn kind(&self) -> ColumnType {
        match self {
            Self::Int32(_) => ColumnType::Int32,
            Self::UInt32(_) => ColumnType::UInt32,
            Self::Int64(_) => ColumnType::Int64,
            Self::UInt64(_) => ColumnType::UInt64,
            Self::Float(_) => ColumnType::Float,
            Self::Double(_) => ColumnType::Double,
        }
    }

    /// Pushes a zeroed slot so the column stays in lock-step with the
    /// timestamp ring.
    pub(crate) fn advance(&mut self) {
        match self {
            Self::Int32(ring) => ring.push(0),
            Self::UInt32(ring) => ring.push(0),
            Self::Int64(ring) => ring.push(0),
            Self::UInt64(ring) => ring.push(0),
            Self::Float(ring) => ring.push(0.0),
            Self::Double(ring) => ring.push(0.0),
        }
    }

    pub(crate) fn get(&self, offset: usize) -> Option<Value> {
        match self {
            Self::Int32(ring) => ring.get(offset).map(Value::Int32),
            Self::UInt32(ring) => ring.get(offset).map(Value::UInt32),
            Self::Int64(ring) => ring.get(offset).map(Value::Int64),
            Self::UInt64(ring) => ring.get(offset).map(Value::UInt64),
            Self::Float(ring) => ring.get(offset).map(Value::Float),
            Self::Double(ring) => ring.get(offset).map(Value::Double),
        }
    }

    pub(crate) fn set(&mut self, offset: usize, value: Value) -> bool {
        let value = value.coerce(self.kind());
        match (self, value) {
            (Self::Int32(ring), Value::Int32(v)) => ring.set(offset, v),
            (Self::UInt32(ring), Value::UInt32(v)) => ring.set(offset, v),
            (Self::Int64(ring), Value::Int64(v)) => ring.set(offset, v),
            (Self::UInt64(ring), Value::UInt64(v)) => ring.set(offset, v),
            (Self::Float(ring), Value::Float(v)) => ring.set(offset, v),
            (Self::Double(ring), Value::Double(v)) => ring.set(offset, v),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnType, Value};

    #[test]
    fn parses_canonical_and_short_names() {
        assert_eq!("double".parse::<ColumnType>(), Ok(ColumnType::Double));
        assert_eq!("U64".parse::<ColumnType>(), Ok(ColumnType::UInt64));
        assert!("int16".parse::<ColumnType>().is_err());
    }

    #[test]
    fn narrowing_coercion_truncates_silently() {
        assert_eq!(Value::Double(3.9).coerce(ColumnType::Int32), Value::Int32(3));
        assert_eq!(
            Value::Int64(i64::from(u32::MAX) + 2).coerce(ColumnType::UInt32),
            Value::UInt32(1)
        );
        assert_eq!(Value::Double(-1.0).coerce(ColumnType::UInt32), Value::UInt32(0));
    }

    #[test]
    fn negative_integers_wrap_into_unsigned_columns() {
        for source in [Value::Int32(-1), Value::Int64(-1)] {
            assert_eq!(source.coerce(ColumnType::UInt32), Value::UInt32(u32::MAX), "{source:?}");
            assert_eq!(source.coerce(ColumnType::UInt64), Value::UInt64(u64::MAX), "{source:?}");
        }
        assert_eq!(Value::UInt32(u32::MAX).coerce(ColumnType::Int32), Value::Int32(-1));
        assert_eq!(Value::UInt64(u64::MAX).coerce(ColumnType::Int64), Value::Int64(-1));
        assert_eq!(Value::Int32(-7).coerce(ColumnType::Int64), Value::Int64(-7));
    }

    #[test]
    fn same_kind_coercion_is_identity() {
        let value = Value::UInt64(u64::MAX);
        assert_eq!(value.coerce(ColumnType::UInt64), value);
    }
}
