//! Unit tests for quon.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use quon::literal::{from_uri_literal, to_uri_literal, ProtocolVersion};
use quon::metadata::{Model, TypeRef};
use quon::types::{PrimitiveKind, Value};
use quon::{ParserSettings, QuonError};

// =============================================================================
// Error Tests
// =============================================================================

mod error_tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = QuonError::Syntax {
            position: 4,
            message: "unexpected token".into(),
        };
        assert!(err.to_string().contains("position 4"));
        assert!(err.to_string().contains("unexpected token"));
    }

    #[test]
    fn test_recursion_limit_display() {
        let err = QuonError::RecursionLimitExceeded { limit: 50 };
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_literal_mismatch_display() {
        let err = QuonError::LiteralTypeMismatch {
            expected: "Edm.Int32".into(),
            actual: "Edm.Int64".into(),
        };
        assert!(err.to_string().contains("Edm.Int32"));
        assert!(err.to_string().contains("Edm.Int64"));
    }

    #[test]
    fn test_null_not_allowed_display() {
        let err = QuonError::NullNotAllowed {
            type_name: "Edm.Int32".into(),
        };
        assert!(err.to_string().contains("Edm.Int32"));
        assert!(err.to_string().contains("null"));
    }
}

// =============================================================================
// Settings Tests
// =============================================================================

mod settings_tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let settings = ParserSettings::default();
        assert_eq!(settings.max_path_depth, 100);
        assert_eq!(settings.max_filter_depth, 50);
        assert_eq!(settings.max_orderby_depth, 50);
        assert_eq!(settings.max_search_depth, 100);
        assert_eq!(settings.max_select_expand_terms, 100);
        assert!(!settings.case_insensitive_builtin_identifiers);
    }
}

// =============================================================================
// Literal Round-Trip Tests
// =============================================================================

mod literal_round_trip {
    use super::*;

    fn round_trip(value: &Value, kind: PrimitiveKind, nullable: bool) -> Value {
        let model = Model::new();
        let text = to_uri_literal(value, ProtocolVersion::V4).expect("format literal");
        from_uri_literal(
            &text,
            &TypeRef::primitive(kind, nullable),
            &model,
            ProtocolVersion::V4,
        )
        .unwrap_or_else(|e| panic!("reparse of '{text}' failed: {e}"))
    }

    #[test]
    fn test_round_trip_representative_values() {
        let cases: Vec<(Value, PrimitiveKind)> = vec![
            (Value::Boolean(true), PrimitiveKind::Boolean),
            (Value::Boolean(false), PrimitiveKind::Boolean),
            (Value::Byte(255), PrimitiveKind::Byte),
            (Value::SByte(-128), PrimitiveKind::SByte),
            (Value::Int16(-32768), PrimitiveKind::Int16),
            (Value::Int32(2_147_483_647), PrimitiveKind::Int32),
            (Value::Int64(9_007_199_254_740_993), PrimitiveKind::Int64),
            (Value::Single(123.001), PrimitiveKind::Single),
            (Value::Double(0.1), PrimitiveKind::Double),
            (
                Value::Decimal(Decimal::from_str("79228.162514264337593543").unwrap()),
                PrimitiveKind::Decimal,
            ),
            (Value::String("O'Brien & co".into()), PrimitiveKind::String),
            (Value::String(String::new()), PrimitiveKind::String),
            (
                Value::Guid(Uuid::from_str("38cf68c2-4010-4ccc-8922-868217f03ddc").unwrap()),
                PrimitiveKind::Guid,
            ),
            (
                Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
                PrimitiveKind::Date,
            ),
            (
                Value::DateTimeOffset(
                    DateTime::parse_from_rfc3339("2024-06-01T08:30:00+02:00").unwrap(),
                ),
                PrimitiveKind::DateTimeOffset,
            ),
            (
                Value::TimeOfDay(NaiveTime::from_hms_milli_opt(23, 59, 59, 500).unwrap()),
                PrimitiveKind::TimeOfDay,
            ),
            (
                Value::Duration(Duration::hours(26) + Duration::milliseconds(250)),
                PrimitiveKind::Duration,
            ),
            (Value::Duration(-Duration::seconds(90)), PrimitiveKind::Duration),
        ];
        for (value, kind) in cases {
            assert_eq!(round_trip(&value, kind, false), value, "{}", kind.name());
        }
    }

    #[test]
    fn test_null_round_trip_needs_nullable_target() {
        assert_eq!(
            round_trip(&Value::Null, PrimitiveKind::Int32, true),
            Value::Null
        );
    }

    proptest! {
        #[test]
        fn prop_int32_round_trip(v in any::<i32>()) {
            prop_assert_eq!(round_trip(&Value::Int32(v), PrimitiveKind::Int32, false), Value::Int32(v));
        }

        #[test]
        fn prop_int64_round_trip(v in any::<i64>()) {
            prop_assert_eq!(round_trip(&Value::Int64(v), PrimitiveKind::Int64, false), Value::Int64(v));
        }

        #[test]
        fn prop_double_round_trip(v in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
            prop_assert_eq!(round_trip(&Value::Double(v), PrimitiveKind::Double, false), Value::Double(v));
        }

        #[test]
        fn prop_single_round_trip(v in proptest::num::f32::NORMAL | proptest::num::f32::ZERO) {
            prop_assert_eq!(round_trip(&Value::Single(v), PrimitiveKind::Single, false), Value::Single(v));
        }

        #[test]
        fn prop_string_round_trip(s in ".*") {
            prop_assert_eq!(
                round_trip(&Value::String(s.clone()), PrimitiveKind::String, false),
                Value::String(s)
            );
        }
    }
}

// =============================================================================
// Payload Literal Tests
// =============================================================================

mod payload_literal_tests {
    use super::*;
    use quon::literal::{
        decode_collection_value, decode_complex_value, encode_collection_value,
        encode_complex_value,
    };

    #[test]
    fn test_complex_value_round_trip() {
        let mut map = serde_json::Map::new();
        map.insert("City".into(), serde_json::Value::String("Reno".into()));
        map.insert("Zip".into(), serde_json::Value::from(89501));
        let text = encode_complex_value(&map).unwrap();
        // Compact, unencoded structural grammar.
        assert!(!text.contains('%'));
        assert!(!text.contains('\n'));
        assert_eq!(decode_complex_value(&text).unwrap(), map);
    }

    #[test]
    fn test_collection_value_round_trip() {
        let items = vec![serde_json::Value::from(1), serde_json::Value::from(2)];
        let text = encode_collection_value(&items).unwrap();
        assert_eq!(decode_collection_value(&text).unwrap(), items);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(decode_complex_value("[1,2]").is_err());
        assert!(decode_collection_value("{\"a\":1}").is_err());
    }
}
