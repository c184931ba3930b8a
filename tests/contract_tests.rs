//! Contract tests for the public parsing and binding API.

use std::sync::Arc;

use quon::binder::{Bindable, CustomQueryOption, TypedNode};
use quon::error::DiagnosticKind;
use quon::metadata::{
    ComplexType, EntityType, EnumMember, EnumType, Model, NavigationProperty, Operation,
    OperationParameter, StructuralProperty, TypeDefinition, TypeRef,
};
use quon::types::PrimitiveKind;
use quon::{ParserSettings, QueryOptionParser, QuonError};

/// Creates a test model with Customer and Order entity types, an Address
/// complex type and a Color enum.
fn create_test_model() -> Model {
    let mut model = Model::new();

    model
        .add_enum_type(EnumType {
            namespace: "Demo".into(),
            name: "Color".into(),
            members: vec![
                EnumMember {
                    name: "Red".into(),
                    value: 0,
                },
                EnumMember {
                    name: "Blue".into(),
                    value: 1,
                },
            ],
        })
        .unwrap();

    model
        .add_complex_type(ComplexType {
            namespace: "Demo".into(),
            name: "Address".into(),
            properties: vec![
                StructuralProperty::new("City", TypeRef::primitive(PrimitiveKind::String, true)),
                StructuralProperty::new("Zip", TypeRef::primitive(PrimitiveKind::String, true)),
            ],
        })
        .unwrap();

    model
        .add_entity_type(EntityType {
            namespace: "Demo".into(),
            name: "Order".into(),
            key: vec!["Id".into()],
            properties: vec![
                StructuralProperty::new("Id", TypeRef::primitive(PrimitiveKind::Int32, false)),
                StructuralProperty::new(
                    "Total",
                    TypeRef::primitive(PrimitiveKind::Double, false),
                ),
                StructuralProperty::new(
                    "Placed",
                    TypeRef::primitive(PrimitiveKind::DateTimeOffset, false),
                ),
            ],
            navigations: vec![],
        })
        .unwrap();

    let address = model.resolve_type("Address").unwrap();
    let color = model.resolve_type("Color").unwrap();
    model
        .add_entity_type(EntityType {
            namespace: "Demo".into(),
            name: "Customer".into(),
            key: vec!["Id".into()],
            properties: vec![
                StructuralProperty::new("Id", TypeRef::primitive(PrimitiveKind::Int32, false)),
                StructuralProperty::new("Age", TypeRef::primitive(PrimitiveKind::Int32, false)),
                StructuralProperty::new("Name", TypeRef::primitive(PrimitiveKind::String, true)),
                StructuralProperty::new(
                    "Salary",
                    TypeRef::primitive(PrimitiveKind::Decimal, true),
                ),
                StructuralProperty::new(
                    "Favorite",
                    TypeRef {
                        definition: color,
                        nullable: true,
                    },
                ),
                StructuralProperty::new(
                    "Address",
                    TypeRef {
                        definition: address,
                        nullable: true,
                    },
                ),
            ],
            navigations: vec![
                NavigationProperty::many("Orders", "Order"),
                NavigationProperty::single("BestFriend", "Customer"),
            ],
        })
        .unwrap();

    model.add_operation(Operation {
        namespace: "Demo".into(),
        name: "IsVip".into(),
        parameters: vec![OperationParameter {
            name: "threshold".into(),
            type_ref: TypeRef::primitive(PrimitiveKind::Int32, false),
        }],
        return_type: Some(TypeRef::primitive(PrimitiveKind::Boolean, false)),
        bound: false,
    });

    model
}

fn customer_collection(model: &Model) -> TypeRef {
    let customer = model.resolve_type("Customer").unwrap();
    TypeRef::collection(TypeRef {
        definition: customer,
        nullable: false,
    })
}

fn create_parser() -> QueryOptionParser {
    let model = Arc::new(create_test_model());
    let target = customer_collection(&model);
    QueryOptionParser::new(model, target)
}

// =============================================================================
// Parser Contracts
// =============================================================================

mod parser_contracts {
    use super::*;

    #[test]
    fn test_syntax_error_yields_no_partial_tree() {
        // Contract: grammar mismatch is fatal to the parse call.
        let parser = create_parser();
        let result = parser.parse_filter("Age gt");
        assert!(matches!(result, Err(QuonError::Syntax { .. })));
    }

    #[test]
    fn test_filter_depth_boundary_is_exact() {
        // Contract: nesting exactly at the limit succeeds, one deeper fails.
        let model = Arc::new(create_test_model());
        let target = customer_collection(&model);
        let parser = QueryOptionParser::new(model, target).with_settings(ParserSettings {
            max_filter_depth: 50,
            ..ParserSettings::default()
        });

        let at_limit = format!("{}Age gt 10{}", "(".repeat(50), ")".repeat(50));
        assert!(parser.parse_filter(&at_limit).is_ok());

        let over_limit = format!("{}Age gt 10{}", "(".repeat(51), ")".repeat(51));
        assert!(matches!(
            parser.parse_filter(&over_limit),
            Err(QuonError::RecursionLimitExceeded { limit: 50 })
        ));
    }

    #[test]
    fn test_path_depth_limit() {
        let model = Arc::new(create_test_model());
        let target = customer_collection(&model);
        let parser = QueryOptionParser::new(model, target).with_settings(ParserSettings {
            max_path_depth: 2,
            ..ParserSettings::default()
        });
        assert!(parser.parse_filter("Address/City eq 'Reno'").is_ok());
        assert!(matches!(
            parser.parse_filter("A/B/C eq 1"),
            Err(QuonError::RecursionLimitExceeded { limit: 2 })
        ));
    }

    #[test]
    fn test_select_expand_term_limit() {
        let model = Arc::new(create_test_model());
        let target = customer_collection(&model);
        let parser = QueryOptionParser::new(model, target).with_settings(ParserSettings {
            max_select_expand_terms: 3,
            ..ParserSettings::default()
        });
        assert!(parser
            .parse_select_expand(Some("Id,Name,Age"), None)
            .is_ok());
        assert!(matches!(
            parser.parse_select_expand(Some("Id,Name,Age,Salary"), None),
            Err(QuonError::RecursionLimitExceeded { limit: 3 })
        ));
    }

    #[test]
    fn test_case_insensitive_flag_covers_builtins_only() {
        let model = Arc::new(create_test_model());
        let target = customer_collection(&model);
        let parser = QueryOptionParser::new(Arc::clone(&model), target.clone());

        // Canonical spellings always work.
        assert!(parser.parse_filter("Age gt 10").is_ok());
        // Non-canonical keyword spellings fail by default.
        assert!(parser.parse_filter("Age gt 10 AND Age lt 90").is_err());

        let relaxed = QueryOptionParser::new(model, target).with_settings(ParserSettings {
            case_insensitive_builtin_identifiers: true,
            ..ParserSettings::default()
        });
        assert!(relaxed.parse_filter("Age gt 10 AND Age lt 90").is_ok());
        // User identifiers are still matched as written.
        let clause = relaxed.parse_filter("AGE gt 10").unwrap();
        assert_eq!(clause.diagnostics().len(), 1);
        assert_eq!(
            clause.diagnostics()[0].kind,
            DiagnosticKind::PropertyNotFound
        );
    }

    #[test]
    fn test_search_parses_into_tree() {
        use quon::parser::ast::SearchExpr;
        let parser = create_parser();
        let clause = parser.parse_search("bike AND (red OR blue)").unwrap();
        let SearchExpr::And(left, right) = clause.expression else {
            panic!("expected AND at the root");
        };
        assert_eq!(*left, SearchExpr::Word("bike".into()));
        assert_eq!(
            *right,
            SearchExpr::Or(
                Box::new(SearchExpr::Word("red".into())),
                Box::new(SearchExpr::Word("blue".into()))
            )
        );
    }
}

// =============================================================================
// Binder Contracts
// =============================================================================

mod binder_contracts {
    use super::*;

    #[test]
    fn test_unknown_property_defers_diagnostic() {
        // Contract: an unknown property produces an unresolved node and a
        // diagnostic; the call does not fail outright.
        let parser = create_parser();
        let clause = parser.parse_filter("Foo eq 1").unwrap();
        let diagnostics = clause.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::PropertyNotFound);
        assert!(diagnostics[0].message.contains("Foo"));
        assert!(diagnostics[0].location.is_some());
    }

    #[test]
    fn test_multiple_independent_errors_collected() {
        // Contract: binding continues past unresolved nodes, so one call
        // surfaces multiple independent problems.
        let parser = create_parser();
        let clause = parser
            .parse_filter("Foo eq 1 and Bar eq 2 and unknownfn(Age) eq 3")
            .unwrap();
        let kinds: Vec<DiagnosticKind> =
            clause.diagnostics().iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::PropertyNotFound,
                DiagnosticKind::PropertyNotFound,
                DiagnosticKind::FunctionNotFound,
            ]
        );
    }

    #[test]
    fn test_collection_property_requires_lambda_scope() {
        // Contract: a collection segment may only be followed inside a
        // lambda scope over its element type.
        let parser = create_parser();
        let clause = parser.parse_filter("Orders/Total gt 10").unwrap();
        assert_eq!(
            clause.diagnostics()[0].kind,
            DiagnosticKind::InvalidPathSegment
        );

        let ok = parser
            .parse_filter("Orders/any(o: o/Total gt 10)")
            .unwrap();
        assert!(ok.diagnostics().is_empty());
    }

    #[test]
    fn test_lambda_variable_goes_out_of_scope() {
        let parser = create_parser();
        let clause = parser
            .parse_filter("Orders/any(o: o/Total gt 10) and o/Total lt 5")
            .unwrap();
        // The trailing reference binds outside the lambda, where 'o' no
        // longer resolves.
        assert_eq!(clause.diagnostics().len(), 1);
        assert_eq!(
            clause.diagnostics()[0].kind,
            DiagnosticKind::PropertyNotFound
        );
    }

    #[test]
    fn test_range_variable_reference_not_found() {
        let parser = create_parser();
        let clause = parser.parse_filter("$this/Age gt 10").unwrap();
        assert_eq!(
            clause.diagnostics()[0].kind,
            DiagnosticKind::RangeVariableNotFound
        );
    }

    #[test]
    fn test_implicit_range_variable_resolves() {
        let parser = create_parser();
        let clause = parser.parse_filter("$it/Age gt 10").unwrap();
        assert!(clause.diagnostics().is_empty());
        assert_eq!(clause.range_variable.name, "$it");
    }

    #[test]
    fn test_filter_root_must_be_boolean() {
        let parser = create_parser();
        let result = parser.parse_filter("Age add 1");
        assert!(matches!(result, Err(QuonError::TypeError { .. })));
    }

    #[test]
    fn test_incompatible_operands_fail_fast() {
        let parser = create_parser();
        let result = parser.parse_filter("Name eq 3");
        assert!(matches!(result, Err(QuonError::TypeError { .. })));
    }

    #[test]
    fn test_model_operation_resolves() {
        let parser = create_parser();
        let clause = parser.parse_filter("IsVip(10)").unwrap();
        assert!(clause.diagnostics().is_empty());
        let Bindable::Resolved(TypedNode::FunctionCall { name, type_ref, .. }) =
            &clause.expression
        else {
            panic!("expected a function call");
        };
        assert_eq!(name, "IsVip");
        assert_eq!(
            type_ref.as_ref().and_then(TypeRef::as_primitive),
            Some(PrimitiveKind::Boolean)
        );
    }

    #[test]
    fn test_builtin_function_arity_mismatch_defers() {
        let parser = create_parser();
        let clause = parser.parse_filter("startswith(Name) eq true").unwrap();
        assert_eq!(
            clause.diagnostics()[0].kind,
            DiagnosticKind::FunctionNotFound
        );
    }

    #[test]
    fn test_parameter_alias_consumes_custom_option() {
        let model = Arc::new(create_test_model());
        let target = customer_collection(&model);
        let parser = QueryOptionParser::new(model, target)
            .with_custom_options(vec![CustomQueryOption::new("@low", "18")]);
        let clause = parser.parse_filter("Age gt @low").unwrap();
        assert!(clause.diagnostics().is_empty());

        // An undefined alias defers instead of failing.
        let clause = parser.parse_filter("Age gt @high").unwrap();
        assert_eq!(
            clause.diagnostics()[0].kind,
            DiagnosticKind::UnresolvedElement
        );
    }

    #[test]
    fn test_binding_depth_limit_guards_operator_chains() {
        let model = Arc::new(create_test_model());
        let target = customer_collection(&model);
        let parser = QueryOptionParser::new(model, target).with_settings(ParserSettings {
            max_filter_depth: 10,
            ..ParserSettings::default()
        });
        let chain = format!("Age eq {}1", "1 add ".repeat(30));
        assert!(matches!(
            parser.parse_filter(&chain),
            Err(QuonError::RecursionLimitExceeded { limit: 10 })
        ));
    }
}

// =============================================================================
// Operator Type Resolver Contracts
// =============================================================================

mod resolver_contracts {
    use super::*;
    use quon::binder::binary_result_type;
    use quon::parser::ast::BinaryOperator;

    const COMPARISON_OPS: &[BinaryOperator] = &[
        BinaryOperator::Or,
        BinaryOperator::And,
        BinaryOperator::Equal,
        BinaryOperator::NotEqual,
        BinaryOperator::GreaterThan,
        BinaryOperator::GreaterThanOrEqual,
        BinaryOperator::LessThan,
        BinaryOperator::LessThanOrEqual,
        BinaryOperator::Has,
    ];

    const ARITHMETIC_OPS: &[BinaryOperator] = &[
        BinaryOperator::Add,
        BinaryOperator::Subtract,
        BinaryOperator::Multiply,
        BinaryOperator::Divide,
        BinaryOperator::Modulo,
    ];

    const NUMERIC_KINDS: &[PrimitiveKind] = &[
        PrimitiveKind::SByte,
        PrimitiveKind::Byte,
        PrimitiveKind::Int16,
        PrimitiveKind::Int32,
        PrimitiveKind::Int64,
        PrimitiveKind::Single,
        PrimitiveKind::Double,
        PrimitiveKind::Decimal,
    ];

    #[test]
    fn test_comparison_result_is_boolean_with_left_nullability() {
        for &op in COMPARISON_OPS {
            for &kind in NUMERIC_KINDS {
                for nullable in [false, true] {
                    let left = TypeRef::primitive(kind, nullable);
                    let right = TypeRef::primitive(kind, false);
                    let result = binary_result_type(op, &left, &right).unwrap();
                    assert_eq!(result.as_primitive(), Some(PrimitiveKind::Boolean));
                    assert_eq!(result.nullable, nullable, "{op:?} {kind:?}");
                }
            }
        }
    }

    #[test]
    fn test_arithmetic_result_is_left_type() {
        for &op in ARITHMETIC_OPS {
            for &kind in NUMERIC_KINDS {
                for nullable in [false, true] {
                    let left = TypeRef::primitive(kind, nullable);
                    let right = TypeRef::primitive(kind, false);
                    let result = binary_result_type(op, &left, &right).unwrap();
                    assert_eq!(result.as_primitive(), Some(kind), "{op:?}");
                    assert_eq!(result.nullable, nullable);
                }
            }
        }
    }

    #[test]
    fn test_datetimeoffset_subtraction_yields_duration() {
        let left = TypeRef::primitive(PrimitiveKind::DateTimeOffset, false);
        let right = TypeRef::primitive(PrimitiveKind::DateTimeOffset, false);
        let result = binary_result_type(BinaryOperator::Subtract, &left, &right).unwrap();
        assert_eq!(result.as_primitive(), Some(PrimitiveKind::Duration));
    }
}

// =============================================================================
// Literal Conversion Contracts
// =============================================================================

mod literal_contracts {
    use super::*;
    use quon::literal::{from_uri_literal, ProtocolVersion};
    use quon::types::Value;

    #[test]
    fn test_int64_against_int32_never_truncates() {
        let model = create_test_model();
        let expected = TypeRef::primitive(PrimitiveKind::Int32, false);
        let result = from_uri_literal("5000000000", &expected, &model, ProtocolVersion::V4);
        assert!(matches!(
            result,
            Err(QuonError::LiteralTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_single_widens_without_spurious_precision() {
        let model = create_test_model();
        let expected = TypeRef::primitive(PrimitiveKind::Double, false);
        let value = from_uri_literal("123.001f", &expected, &model, ProtocolVersion::V4).unwrap();
        assert_eq!(value, Value::Double(123.001));
    }

    #[test]
    fn test_enum_literal_against_model_enum() {
        let model = create_test_model();
        let color = model.resolve_type("Color").unwrap();
        let expected = TypeRef {
            definition: color,
            nullable: false,
        };
        let value =
            from_uri_literal("Color'Red'", &expected, &model, ProtocolVersion::V4).unwrap();
        assert_eq!(
            value,
            Value::Enum {
                type_name: "Demo.Color".into(),
                member: "Red".into()
            }
        );

        // By integer value, qualified name.
        let value =
            from_uri_literal("Demo.Color'1'", &expected, &model, ProtocolVersion::V4).unwrap();
        assert_eq!(
            value,
            Value::Enum {
                type_name: "Demo.Color".into(),
                member: "Blue".into()
            }
        );
    }

    #[test]
    fn test_enum_literal_against_non_enum_fails() {
        let model = create_test_model();
        let expected = TypeRef::primitive(PrimitiveKind::Int32, false);
        let result = from_uri_literal("Color'Red'", &expected, &model, ProtocolVersion::V4);
        assert!(matches!(
            result,
            Err(QuonError::LiteralTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_complex_literal_binds_against_complex_type() {
        let model = create_test_model();
        let address = model.resolve_type("Address").unwrap();
        let expected = TypeRef {
            definition: address,
            nullable: true,
        };
        let value = from_uri_literal(
            "{\"City\":\"Reno\",\"Zip\":\"89501\"}",
            &expected,
            &model,
            ProtocolVersion::V4,
        )
        .unwrap();
        assert!(matches!(value, Value::Complex(_)));

        // Trailing content is an error.
        let result = from_uri_literal(
            "{\"City\":\"Reno\"} extra",
            &expected,
            &model,
            ProtocolVersion::V4,
        );
        assert!(matches!(
            result,
            Err(QuonError::LiteralTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_collection_literal_requires_collection_type() {
        let model = create_test_model();
        let collection =
            TypeRef::collection(TypeRef::primitive(PrimitiveKind::Int32, false));
        let value =
            from_uri_literal("[1,2,3]", &collection, &model, ProtocolVersion::V4).unwrap();
        assert!(matches!(value, Value::Collection(ref items) if items.len() == 3));

        let scalar = TypeRef::primitive(PrimitiveKind::Int32, false);
        assert!(from_uri_literal("[1,2,3]", &scalar, &model, ProtocolVersion::V4).is_err());
    }
}

// =============================================================================
// Metadata Model Contracts
// =============================================================================

mod metadata_contracts {
    use super::*;

    #[test]
    fn test_model_capabilities() {
        let model = create_test_model();
        assert!(model.resolve_type("Customer").is_some());
        assert!(model.resolve_type("Demo.Customer").is_some());
        assert_eq!(model.find_operations_by_name("IsVip").len(), 1);
        assert!(model.find_operations_by_name("Missing").is_empty());

        let customer = model.resolve_type("Customer").unwrap();
        assert!(model.structural_property(&customer, "Age").is_some());
        assert!(model.structural_property(&customer, "Orders").is_none());
        assert!(model.navigation_property(&customer, "Orders").is_some());

        let TypeDefinition::Entity(entity) = &customer else {
            panic!("expected entity");
        };
        assert_eq!(entity.key, vec!["Id".to_string()]);
    }
}
