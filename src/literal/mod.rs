//! Literal conversion service.
//!
//! Bidirectional conversion between runtime values and the canonical,
//! unencoded textual form used inside query option text, plus the
//! widening-only numeric coercion the binder applies to constants.

use std::str::FromStr;

use chrono::Duration;
use rust_decimal::Decimal;

use crate::error::{QuonError, Result};
use crate::metadata::{Model, TypeDefinition, TypeRef};
use crate::types::{PrimitiveKind, Value};

/// Protocol version a literal is rendered for or read against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    /// Version 3: no enum literals.
    V3,
    /// Version 4 (the default).
    #[default]
    V4,
}

/// Widening-only numeric promotion matrix. A source kind may convert to
/// exactly the listed target kinds; everything else is a mismatch.
const NUMERIC_WIDENINGS: &[(PrimitiveKind, &[PrimitiveKind])] = &[
    (
        PrimitiveKind::SByte,
        &[
            PrimitiveKind::Int16,
            PrimitiveKind::Int32,
            PrimitiveKind::Int64,
            PrimitiveKind::Single,
            PrimitiveKind::Double,
            PrimitiveKind::Decimal,
        ],
    ),
    (
        PrimitiveKind::Byte,
        &[
            PrimitiveKind::Int16,
            PrimitiveKind::Int32,
            PrimitiveKind::Int64,
            PrimitiveKind::Single,
            PrimitiveKind::Double,
            PrimitiveKind::Decimal,
        ],
    ),
    (
        PrimitiveKind::Int16,
        &[
            PrimitiveKind::Int32,
            PrimitiveKind::Int64,
            PrimitiveKind::Single,
            PrimitiveKind::Double,
            PrimitiveKind::Decimal,
        ],
    ),
    (
        PrimitiveKind::Int32,
        &[
            PrimitiveKind::Int64,
            PrimitiveKind::Single,
            PrimitiveKind::Double,
            PrimitiveKind::Decimal,
        ],
    ),
    (
        PrimitiveKind::Int64,
        &[
            PrimitiveKind::Single,
            PrimitiveKind::Double,
            PrimitiveKind::Decimal,
        ],
    ),
    (
        PrimitiveKind::Single,
        &[PrimitiveKind::Double, PrimitiveKind::Decimal],
    ),
    (PrimitiveKind::Double, &[PrimitiveKind::Decimal]),
];

/// Returns whether a value of kind `from` may be used where kind `to` is
/// expected: either identically, or through the widening matrix.
#[must_use]
pub fn can_widen(from: PrimitiveKind, to: PrimitiveKind) -> bool {
    if from == to {
        return true;
    }
    NUMERIC_WIDENINGS
        .iter()
        .any(|(source, targets)| *source == from && targets.contains(&to))
}

/// Coerces a numeric value to a wider numeric kind.
///
/// Float-to-wider conversions go through the value's shortest
/// round-trippable decimal text rather than a direct cast, so no spurious
/// precision appears (a direct cast of `123.001f32` to `f64` yields
/// `123.00099945068359`).
///
/// # Errors
///
/// Returns [`QuonError::LiteralTypeMismatch`] for any pair outside the
/// widening matrix, including every narrowing.
#[allow(clippy::too_many_lines, clippy::cast_lossless, clippy::cast_precision_loss)]
pub fn coerce_numeric(value: &Value, target: PrimitiveKind) -> Result<Value> {
    if value.primitive_kind() == Some(target) {
        return Ok(value.clone());
    }

    let mismatch = || QuonError::LiteralTypeMismatch {
        expected: target.name().to_string(),
        actual: value.type_name().to_string(),
    };

    let coerced = match value {
        Value::SByte(v) => match target {
            PrimitiveKind::Int16 => Value::Int16(i16::from(*v)),
            PrimitiveKind::Int32 => Value::Int32(i32::from(*v)),
            PrimitiveKind::Int64 => Value::Int64(i64::from(*v)),
            PrimitiveKind::Single => Value::Single(f32::from(*v)),
            PrimitiveKind::Double => Value::Double(f64::from(*v)),
            PrimitiveKind::Decimal => Value::Decimal(Decimal::from(*v)),
            _ => return Err(mismatch()),
        },
        Value::Byte(v) => match target {
            PrimitiveKind::Int16 => Value::Int16(i16::from(*v)),
            PrimitiveKind::Int32 => Value::Int32(i32::from(*v)),
            PrimitiveKind::Int64 => Value::Int64(i64::from(*v)),
            PrimitiveKind::Single => Value::Single(f32::from(*v)),
            PrimitiveKind::Double => Value::Double(f64::from(*v)),
            PrimitiveKind::Decimal => Value::Decimal(Decimal::from(*v)),
            _ => return Err(mismatch()),
        },
        Value::Int16(v) => match target {
            PrimitiveKind::Int32 => Value::Int32(i32::from(*v)),
            PrimitiveKind::Int64 => Value::Int64(i64::from(*v)),
            PrimitiveKind::Single => Value::Single(f32::from(*v)),
            PrimitiveKind::Double => Value::Double(f64::from(*v)),
            PrimitiveKind::Decimal => Value::Decimal(Decimal::from(*v)),
            _ => return Err(mismatch()),
        },
        Value::Int32(v) => match target {
            PrimitiveKind::Int64 => Value::Int64(i64::from(*v)),
            PrimitiveKind::Single => Value::Single(*v as f32),
            PrimitiveKind::Double => Value::Double(f64::from(*v)),
            PrimitiveKind::Decimal => Value::Decimal(Decimal::from(*v)),
            _ => return Err(mismatch()),
        },
        Value::Int64(v) => match target {
            PrimitiveKind::Single => Value::Single(*v as f32),
            PrimitiveKind::Double => Value::Double(*v as f64),
            PrimitiveKind::Decimal => Value::Decimal(Decimal::from(*v)),
            _ => return Err(mismatch()),
        },
        Value::Single(v) => match target {
            PrimitiveKind::Double => Value::Double(widen_float_text(&v.to_string())?),
            PrimitiveKind::Decimal => Value::Decimal(widen_decimal_text(&v.to_string(), target)?),
            _ => return Err(mismatch()),
        },
        Value::Double(v) => match target {
            PrimitiveKind::Decimal => Value::Decimal(widen_decimal_text(&v.to_string(), target)?),
            _ => return Err(mismatch()),
        },
        _ => return Err(mismatch()),
    };
    Ok(coerced)
}

/// Reparses the shortest round-trip text of a narrower float as `f64`.
fn widen_float_text(text: &str) -> Result<f64> {
    text.parse::<f64>().map_err(|_| {
        QuonError::Internal(format!("round-trip float text '{text}' failed to reparse"))
    })
}

/// Reparses the shortest round-trip text of a float as a decimal.
fn widen_decimal_text(text: &str, target: PrimitiveKind) -> Result<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| QuonError::LiteralTypeMismatch {
            expected: target.name().to_string(),
            actual: format!("the out-of-range value {text}"),
        })
}

/// Converts a value to its canonical, unencoded query-option text.
///
/// # Errors
///
/// Returns an error for enum values under [`ProtocolVersion::V3`], or if
/// a complex/collection value cannot be serialized.
pub fn to_uri_literal(value: &Value, version: ProtocolVersion) -> Result<String> {
    let text = match value {
        Value::Null => "null".to_string(),
        Value::Boolean(v) => v.to_string(),
        Value::Byte(v) => v.to_string(),
        Value::SByte(v) => v.to_string(),
        Value::Int16(v) => v.to_string(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::Single(v) => format_float(f64::from(*v), v.to_string()),
        Value::Double(v) => format_float(*v, v.to_string()),
        Value::Decimal(v) => v.to_string(),
        Value::String(v) => format!("'{}'", v.replace('\'', "''")),
        Value::Guid(v) => v.to_string(),
        Value::Date(v) => v.to_string(),
        Value::DateTimeOffset(v) => v.to_rfc3339(),
        Value::TimeOfDay(v) => v.to_string(),
        Value::Duration(v) => format!("duration'{}'", format_duration(v)),
        Value::Enum { type_name, member } => {
            if version == ProtocolVersion::V3 {
                return Err(QuonError::TypeError {
                    expected: "a V4 target for enum literals".to_string(),
                    actual: format!("{type_name} under V3"),
                });
            }
            format!("{type_name}'{member}'")
        }
        Value::Complex(map) => encode_complex_value(map)?,
        Value::Collection(items) => encode_collection_value(items)?,
    };
    Ok(text)
}

fn format_float(value: f64, shortest: String) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "INF".to_string()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        shortest
    }
}

/// Converts query-option text to a value of the expected type.
///
/// Complex and collection text re-enters the payload codec in value-only
/// mode and must consume the supplied text exactly. An unsuffixed numeric
/// literal takes its type from the expected type when the text fits it;
/// otherwise the natural parse plus the widening matrix applies.
///
/// # Errors
///
/// * [`QuonError::NullNotAllowed`] for a null literal against a
///   non-nullable type.
/// * [`QuonError::LiteralTypeMismatch`] for any conversion outside the
///   widening matrix.
/// * [`QuonError::Syntax`] when the text is not a literal at all.
pub fn from_uri_literal(
    text: &str,
    expected: &TypeRef,
    model: &Model,
    version: ProtocolVersion,
) -> Result<Value> {
    let trimmed = text.trim();

    // Structured and collection literals use the payload grammar.
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return from_payload_literal(trimmed, expected);
    }
    if expected.is_collection() || is_structured(expected) {
        return Err(QuonError::LiteralTypeMismatch {
            expected: expected.full_name(),
            actual: format!("the primitive literal {trimmed}"),
        });
    }

    let value = match expected.as_primitive() {
        Some(kind) if kind.is_numeric() => match parse_as_kind(trimmed, kind) {
            Some(value) => value,
            None => crate::parser::parse_literal(trimmed)?,
        },
        _ => crate::parser::parse_literal(trimmed)?,
    };

    if value.is_null() {
        if expected.nullable {
            return Ok(Value::Null);
        }
        return Err(QuonError::NullNotAllowed {
            type_name: expected.full_name(),
        });
    }

    if let Value::Enum { type_name, member } = &value {
        return from_enum_literal(type_name, member, expected, model, version);
    }

    let Some(actual_kind) = value.primitive_kind() else {
        return Err(QuonError::LiteralTypeMismatch {
            expected: expected.full_name(),
            actual: value.type_name().to_string(),
        });
    };
    let Some(expected_kind) = expected.as_primitive() else {
        return Err(QuonError::LiteralTypeMismatch {
            expected: expected.full_name(),
            actual: actual_kind.name().to_string(),
        });
    };
    if actual_kind == expected_kind {
        return Ok(value);
    }
    coerce_numeric(&value, expected_kind)
}

/// Parses an unsuffixed numeric literal directly as the expected kind.
/// Returns `None` when the text does not fit (suffixed literals and
/// overflows fall back to the natural parse).
fn parse_as_kind(text: &str, kind: PrimitiveKind) -> Option<Value> {
    match kind {
        PrimitiveKind::SByte => text.parse().ok().map(Value::SByte),
        PrimitiveKind::Byte => text.parse().ok().map(Value::Byte),
        PrimitiveKind::Int16 => text.parse().ok().map(Value::Int16),
        PrimitiveKind::Int32 => text.parse().ok().map(Value::Int32),
        PrimitiveKind::Int64 => text.parse().ok().map(Value::Int64),
        PrimitiveKind::Single => text.parse().ok().map(Value::Single),
        PrimitiveKind::Double => text.parse().ok().map(Value::Double),
        PrimitiveKind::Decimal => Decimal::from_str(text).ok().map(Value::Decimal),
        _ => None,
    }
}

fn from_enum_literal(
    type_name: &str,
    member: &str,
    expected: &TypeRef,
    model: &Model,
    version: ProtocolVersion,
) -> Result<Value> {
    if version == ProtocolVersion::V3 {
        return Err(QuonError::TypeError {
            expected: "a V4 target for enum literals".to_string(),
            actual: format!("{type_name} under V3"),
        });
    }
    let Some(expected_enum) = expected.as_enum() else {
        return Err(QuonError::LiteralTypeMismatch {
            expected: expected.full_name(),
            actual: format!("{type_name} enum value"),
        });
    };
    // The literal's own type name must resolve to the expected enum type.
    let names_match = match model.resolve_type(type_name) {
        Some(TypeDefinition::Enum(declared)) => declared.full_name() == expected_enum.full_name(),
        Some(_) | None => expected_enum.matches_name(type_name),
    };
    if !names_match {
        return Err(QuonError::LiteralTypeMismatch {
            expected: expected.full_name(),
            actual: format!("{type_name} enum value"),
        });
    }
    let Some(resolved) = expected_enum.find_member(member) else {
        return Err(QuonError::LiteralTypeMismatch {
            expected: expected.full_name(),
            actual: format!("the unknown member '{member}'"),
        });
    };
    Ok(Value::Enum {
        type_name: expected_enum.full_name(),
        member: resolved.name.clone(),
    })
}

fn is_structured(type_ref: &TypeRef) -> bool {
    matches!(
        type_ref.definition,
        TypeDefinition::Complex(_) | TypeDefinition::Entity(_)
    )
}

fn from_payload_literal(text: &str, expected: &TypeRef) -> Result<Value> {
    if text.starts_with('{') {
        if !is_structured(expected) {
            return Err(QuonError::LiteralTypeMismatch {
                expected: expected.full_name(),
                actual: "a complex value".to_string(),
            });
        }
        return decode_complex_value(text).map(Value::Complex);
    }
    if !expected.is_collection() {
        return Err(QuonError::LiteralTypeMismatch {
            expected: expected.full_name(),
            actual: "a collection value".to_string(),
        });
    }
    decode_collection_value(text).map(Value::Collection)
}

/// Encodes a complex value in the compact, unencoded payload form.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_complex_value(value: &serde_json::Map<String, serde_json::Value>) -> Result<String> {
    serde_json::to_string(&serde_json::Value::Object(value.clone()))
        .map_err(|e| QuonError::Internal(format!("complex value serialization failed: {e}")))
}

/// Encodes a collection value in the compact, unencoded payload form.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_collection_value(items: &[serde_json::Value]) -> Result<String> {
    serde_json::to_string(items)
        .map_err(|e| QuonError::Internal(format!("collection value serialization failed: {e}")))
}

/// Decodes a complex value from payload text. The whole input must be
/// consumed; trailing content is an error.
///
/// # Errors
///
/// Returns [`QuonError::LiteralTypeMismatch`] if the text is not exactly
/// one object.
pub fn decode_complex_value(text: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(QuonError::LiteralTypeMismatch {
            expected: "a complex value".to_string(),
            actual: json_kind_name(&other).to_string(),
        }),
        Err(e) => Err(QuonError::LiteralTypeMismatch {
            expected: "a complex value".to_string(),
            actual: format!("malformed payload text ({e})"),
        }),
    }
}

/// Decodes a collection value from payload text. The whole input must be
/// consumed; trailing content is an error.
///
/// # Errors
///
/// Returns [`QuonError::LiteralTypeMismatch`] if the text is not exactly
/// one array.
pub fn decode_collection_value(text: &str) -> Result<Vec<serde_json::Value>> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Array(items)) => Ok(items),
        Ok(other) => Err(QuonError::LiteralTypeMismatch {
            expected: "a collection value".to_string(),
            actual: json_kind_name(&other).to_string(),
        }),
        Err(e) => Err(QuonError::LiteralTypeMismatch {
            expected: "a collection value".to_string(),
            actual: format!("malformed payload text ({e})"),
        }),
    }
}

fn json_kind_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "a null value",
        serde_json::Value::Bool(_) => "a boolean value",
        serde_json::Value::Number(_) => "a numeric value",
        serde_json::Value::String(_) => "a string value",
        serde_json::Value::Array(_) => "a collection value",
        serde_json::Value::Object(_) => "a complex value",
    }
}

/// Parses an ISO-8601 duration of the form `[-]PnDTnHnMn.nS`.
#[must_use]
pub fn parse_duration(text: &str) -> Option<Duration> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let rest = rest.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once(['T', 't']) {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut total = Duration::zero();
    if !date_part.is_empty() {
        let days: i64 = date_part.strip_suffix(['D', 'd'])?.parse().ok()?;
        total = total + Duration::days(days);
    }
    if let Some(time_part) = time_part {
        if time_part.is_empty() {
            return None;
        }
        let mut number = String::new();
        for ch in time_part.chars() {
            if ch.is_ascii_digit() || ch == '.' {
                number.push(ch);
            } else {
                match ch.to_ascii_uppercase() {
                    'H' => total = total + Duration::hours(number.parse().ok()?),
                    'M' => total = total + Duration::minutes(number.parse().ok()?),
                    'S' => {
                        let seconds: f64 = number.parse().ok()?;
                        #[allow(clippy::cast_possible_truncation)]
                        let nanos = (seconds * 1_000_000_000.0).round() as i64;
                        total = total + Duration::nanoseconds(nanos);
                    }
                    _ => return None,
                }
                number.clear();
            }
        }
        if !number.is_empty() {
            return None;
        }
    }
    Some(if negative { -total } else { total })
}

/// Formats a duration in the ISO-8601 form produced by [`parse_duration`].
#[must_use]
pub fn format_duration(duration: &Duration) -> String {
    let mut remaining = *duration;
    let mut out = String::new();
    if remaining < Duration::zero() {
        out.push('-');
        remaining = -remaining;
    }
    out.push('P');

    let total_seconds = remaining.num_seconds();
    let nanos = (remaining - Duration::seconds(total_seconds))
        .num_nanoseconds()
        .unwrap_or(0);
    let days = total_seconds / 86_400;
    let hours = (total_seconds / 3_600) % 24;
    let minutes = (total_seconds / 60) % 60;
    let seconds = total_seconds % 60;

    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours > 0 || minutes > 0 || seconds > 0 || nanos > 0 || days == 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if nanos > 0 {
            let fraction = format!("{nanos:09}");
            out.push_str(&format!("{seconds}.{}S", fraction.trim_end_matches('0')));
        } else if seconds > 0 || (hours == 0 && minutes == 0) {
            out.push_str(&format!("{seconds}S"));
        }
    }
    out
}
