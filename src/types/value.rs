//! Value and `PrimitiveKind` definitions for quon.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Supported primitive type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Boolean.
    Boolean,
    /// 8-bit unsigned integer.
    Byte,
    /// 8-bit signed integer.
    SByte,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Single,
    /// 64-bit floating point.
    Double,
    /// Fixed-precision decimal.
    Decimal,
    /// UTF-8 string.
    String,
    /// Globally unique identifier.
    Guid,
    /// Calendar date without time or offset.
    Date,
    /// Point in time with a UTC offset.
    DateTimeOffset,
    /// Time of day without date or offset.
    TimeOfDay,
    /// Signed duration.
    Duration,
}

impl PrimitiveKind {
    /// Returns the qualified name of the primitive type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Edm.Boolean",
            PrimitiveKind::Byte => "Edm.Byte",
            PrimitiveKind::SByte => "Edm.SByte",
            PrimitiveKind::Int16 => "Edm.Int16",
            PrimitiveKind::Int32 => "Edm.Int32",
            PrimitiveKind::Int64 => "Edm.Int64",
            PrimitiveKind::Single => "Edm.Single",
            PrimitiveKind::Double => "Edm.Double",
            PrimitiveKind::Decimal => "Edm.Decimal",
            PrimitiveKind::String => "Edm.String",
            PrimitiveKind::Guid => "Edm.Guid",
            PrimitiveKind::Date => "Edm.Date",
            PrimitiveKind::DateTimeOffset => "Edm.DateTimeOffset",
            PrimitiveKind::TimeOfDay => "Edm.TimeOfDay",
            PrimitiveKind::Duration => "Edm.Duration",
        }
    }

    /// Returns whether this kind is numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::SByte
                | PrimitiveKind::Int16
                | PrimitiveKind::Int32
                | PrimitiveKind::Int64
                | PrimitiveKind::Single
                | PrimitiveKind::Double
                | PrimitiveKind::Decimal
        )
    }

    /// Returns whether this kind is an integral numeric kind.
    #[must_use]
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::SByte
                | PrimitiveKind::Int16
                | PrimitiveKind::Int32
                | PrimitiveKind::Int64
        )
    }

    /// Returns whether values of this kind have a total order usable in
    /// comparisons and `$orderby`.
    #[must_use]
    pub fn is_orderable(&self) -> bool {
        !matches!(self, PrimitiveKind::Boolean | PrimitiveKind::Guid)
    }
}

/// A runtime value carried by a constant node or produced by literal
/// conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The null value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// 8-bit unsigned integer.
    Byte(u8),
    /// 8-bit signed integer.
    SByte(i8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 32-bit floating point.
    Single(f32),
    /// 64-bit floating point.
    Double(f64),
    /// Fixed-precision decimal.
    Decimal(Decimal),
    /// UTF-8 string.
    String(String),
    /// Globally unique identifier.
    Guid(Uuid),
    /// Calendar date.
    Date(NaiveDate),
    /// Point in time with a UTC offset.
    DateTimeOffset(DateTime<FixedOffset>),
    /// Time of day.
    TimeOfDay(NaiveTime),
    /// Signed duration.
    Duration(Duration),
    /// Enum member, carried symbolically with its declaring type name.
    Enum {
        /// Qualified or bare name of the enum type as written.
        type_name: String,
        /// Member name or its integer value as written.
        member: String,
    },
    /// Complex (structured) value in payload form.
    Complex(serde_json::Map<String, serde_json::Value>),
    /// Collection value in payload form.
    Collection(Vec<serde_json::Value>),
}

impl Value {
    /// Returns the primitive kind of this value, or `None` for null, enum,
    /// complex and collection values.
    #[must_use]
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Value::Boolean(_) => Some(PrimitiveKind::Boolean),
            Value::Byte(_) => Some(PrimitiveKind::Byte),
            Value::SByte(_) => Some(PrimitiveKind::SByte),
            Value::Int16(_) => Some(PrimitiveKind::Int16),
            Value::Int32(_) => Some(PrimitiveKind::Int32),
            Value::Int64(_) => Some(PrimitiveKind::Int64),
            Value::Single(_) => Some(PrimitiveKind::Single),
            Value::Double(_) => Some(PrimitiveKind::Double),
            Value::Decimal(_) => Some(PrimitiveKind::Decimal),
            Value::String(_) => Some(PrimitiveKind::String),
            Value::Guid(_) => Some(PrimitiveKind::Guid),
            Value::Date(_) => Some(PrimitiveKind::Date),
            Value::DateTimeOffset(_) => Some(PrimitiveKind::DateTimeOffset),
            Value::TimeOfDay(_) => Some(PrimitiveKind::TimeOfDay),
            Value::Duration(_) => Some(PrimitiveKind::Duration),
            Value::Null | Value::Enum { .. } | Value::Complex(_) | Value::Collection(_) => None,
        }
    }

    /// Returns whether this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns a short name for the value's type, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Enum { type_name, .. } => type_name.as_str(),
            Value::Complex(_) => "complex value",
            Value::Collection(_) => "collection value",
            other => other.primitive_kind().map_or("value", |k| k.name()),
        }
    }
}
