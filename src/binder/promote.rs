//! Operator result-type computation.

use crate::literal::can_widen;
use crate::metadata::TypeRef;
use crate::parser::ast::BinaryOperator;
use crate::types::PrimitiveKind;

/// Exact-match exceptions to the category rules: temporal arithmetic whose
/// result kind differs from the left operand's kind.
const BINARY_RESULT_EXCEPTIONS: &[((BinaryOperator, PrimitiveKind, PrimitiveKind), PrimitiveKind)] = &[
    (
        (
            BinaryOperator::Add,
            PrimitiveKind::DateTimeOffset,
            PrimitiveKind::Duration,
        ),
        PrimitiveKind::DateTimeOffset,
    ),
    (
        (
            BinaryOperator::Add,
            PrimitiveKind::Duration,
            PrimitiveKind::DateTimeOffset,
        ),
        PrimitiveKind::DateTimeOffset,
    ),
    (
        (
            BinaryOperator::Subtract,
            PrimitiveKind::DateTimeOffset,
            PrimitiveKind::Duration,
        ),
        PrimitiveKind::DateTimeOffset,
    ),
    (
        (
            BinaryOperator::Subtract,
            PrimitiveKind::DateTimeOffset,
            PrimitiveKind::DateTimeOffset,
        ),
        PrimitiveKind::Duration,
    ),
];

/// Returns whether the exception table has an entry for the given
/// operator/operand-kind combination.
#[must_use]
pub fn has_exception_entry(
    op: BinaryOperator,
    left: PrimitiveKind,
    right: PrimitiveKind,
) -> bool {
    BINARY_RESULT_EXCEPTIONS
        .iter()
        .any(|((o, l, r), _)| *o == op && *l == left && *r == right)
}

/// Computes the result type of a binary operator from its operand types.
///
/// The exception table is consulted first; otherwise logical and
/// comparison operators yield Boolean (nullable iff the left operand is
/// nullable) and arithmetic operators yield the left operand's type
/// unchanged. The match over the operator set is exhaustive, so no
/// operator kind can fall through.
///
/// Returns `None` when either operand is not single-valued primitive;
/// the binder reports those as type errors before result types are
/// ever computed.
#[must_use]
pub fn binary_result_type(
    op: BinaryOperator,
    left: &TypeRef,
    right: &TypeRef,
) -> Option<TypeRef> {
    let left_kind = left.as_primitive()?;
    let right_kind = right.as_primitive()?;

    if let Some((_, result)) = BINARY_RESULT_EXCEPTIONS
        .iter()
        .find(|((o, l, r), _)| *o == op && *l == left_kind && *r == right_kind)
    {
        return Some(TypeRef::primitive(*result, left.nullable));
    }

    Some(match op {
        BinaryOperator::Or
        | BinaryOperator::And
        | BinaryOperator::Equal
        | BinaryOperator::NotEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual
        | BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::Has => TypeRef::primitive(PrimitiveKind::Boolean, left.nullable),
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => left.clone(),
    })
}

/// Finds the common kind two numeric operands promote to through the
/// widening matrix, preferring the wider side.
#[must_use]
pub fn common_numeric_kind(left: PrimitiveKind, right: PrimitiveKind) -> Option<PrimitiveKind> {
    if !left.is_numeric() || !right.is_numeric() {
        return None;
    }
    if can_widen(left, right) {
        Some(right)
    } else if can_widen(right, left) {
        Some(left)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(kind: PrimitiveKind, nullable: bool) -> TypeRef {
        TypeRef::primitive(kind, nullable)
    }

    #[test]
    fn test_comparison_yields_boolean_with_left_nullability() {
        let result = binary_result_type(
            BinaryOperator::GreaterThan,
            &t(PrimitiveKind::Int32, false),
            &t(PrimitiveKind::Int32, false),
        )
        .unwrap();
        assert_eq!(result.as_primitive(), Some(PrimitiveKind::Boolean));
        assert!(!result.nullable);

        let nullable = binary_result_type(
            BinaryOperator::Equal,
            &t(PrimitiveKind::String, true),
            &t(PrimitiveKind::String, false),
        )
        .unwrap();
        assert!(nullable.nullable);
    }

    #[test]
    fn test_arithmetic_yields_left_type() {
        let result = binary_result_type(
            BinaryOperator::Add,
            &t(PrimitiveKind::Decimal, true),
            &t(PrimitiveKind::Decimal, false),
        )
        .unwrap();
        assert_eq!(result.as_primitive(), Some(PrimitiveKind::Decimal));
        assert!(result.nullable);
    }

    #[test]
    fn test_temporal_exception_entries() {
        let cases = [
            (
                BinaryOperator::Add,
                PrimitiveKind::DateTimeOffset,
                PrimitiveKind::Duration,
                PrimitiveKind::DateTimeOffset,
            ),
            (
                BinaryOperator::Add,
                PrimitiveKind::Duration,
                PrimitiveKind::DateTimeOffset,
                PrimitiveKind::DateTimeOffset,
            ),
            (
                BinaryOperator::Subtract,
                PrimitiveKind::DateTimeOffset,
                PrimitiveKind::Duration,
                PrimitiveKind::DateTimeOffset,
            ),
            (
                BinaryOperator::Subtract,
                PrimitiveKind::DateTimeOffset,
                PrimitiveKind::DateTimeOffset,
                PrimitiveKind::Duration,
            ),
        ];
        for (op, left, right, expected) in cases {
            let result = binary_result_type(op, &t(left, false), &t(right, false)).unwrap();
            assert_eq!(result.as_primitive(), Some(expected), "{op:?}");
        }
    }

    #[test]
    fn test_non_primitive_operand_has_no_result_type() {
        let collection = TypeRef::collection(t(PrimitiveKind::Int32, false));
        assert!(binary_result_type(
            BinaryOperator::Equal,
            &collection,
            &t(PrimitiveKind::Int32, false)
        )
        .is_none());
    }

    #[test]
    fn test_common_numeric_kind() {
        assert_eq!(
            common_numeric_kind(PrimitiveKind::Int32, PrimitiveKind::Double),
            Some(PrimitiveKind::Double)
        );
        assert_eq!(
            common_numeric_kind(PrimitiveKind::Decimal, PrimitiveKind::Int16),
            Some(PrimitiveKind::Decimal)
        );
        assert_eq!(
            common_numeric_kind(PrimitiveKind::Int32, PrimitiveKind::Int32),
            Some(PrimitiveKind::Int32)
        );
        assert_eq!(
            common_numeric_kind(PrimitiveKind::String, PrimitiveKind::Int32),
            None
        );
        assert_eq!(
            common_numeric_kind(PrimitiveKind::Decimal, PrimitiveKind::Single),
            Some(PrimitiveKind::Decimal)
        );
    }
}
