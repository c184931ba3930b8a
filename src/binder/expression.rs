//! Typed expression tree produced by metadata binding.

use std::cell::OnceCell;

use crate::binder::promote;
use crate::binder::state::RangeVariable;
use crate::error::Diagnostic;
use crate::metadata::{NavigationProperty, StructuralProperty, TypeRef};
use crate::parser::ast::{
    BinaryOperator, LambdaKind, OrderByDirection, SearchExpr, UnaryOperator,
};
use crate::types::{PrimitiveKind, Value};

/// An explicit compute-on-first-access cell for a node's derived
/// attributes. The value is computed once and kept for the node's
/// lifetime; it is never recomputed or invalidated.
#[derive(Debug, Clone, Default)]
pub struct Memo<T> {
    cell: OnceCell<T>,
}

impl<T> Memo<T> {
    /// Creates an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Memo {
            cell: OnceCell::new(),
        }
    }

    /// Returns the memoized value, computing it on first access.
    pub fn get_or_compute(&self, compute: impl FnOnce() -> T) -> &T {
        self.cell.get_or_init(compute)
    }
}

/// A bindable position in the typed tree: either a resolved node or a
/// placeholder carrying the diagnostics that explain why resolution
/// failed. Binding continues around unresolved positions so one call can
/// surface multiple independent problems.
#[derive(Debug, Clone)]
pub enum Bindable {
    /// A successfully resolved node.
    Resolved(TypedNode),
    /// A deferred failure.
    Unresolved(UnresolvedNode),
}

impl Bindable {
    /// Creates an unresolved placeholder from one diagnostic.
    #[must_use]
    pub fn unresolved(name: impl Into<String>, diagnostic: Diagnostic) -> Self {
        Bindable::Unresolved(UnresolvedNode {
            name: Some(name.into()),
            diagnostics: vec![diagnostic],
        })
    }

    /// Returns whether this position resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Bindable::Resolved(_))
    }

    /// Returns the resolved node, if any.
    #[must_use]
    pub fn as_resolved(&self) -> Option<&TypedNode> {
        match self {
            Bindable::Resolved(node) => Some(node),
            Bindable::Unresolved(_) => None,
        }
    }

    /// Returns the resolved type of this position, if known.
    #[must_use]
    pub fn type_ref(&self) -> Option<&TypeRef> {
        match self {
            Bindable::Resolved(node) => node.type_ref(),
            Bindable::Unresolved(_) => None,
        }
    }

    /// Collects the diagnostics of every unresolved node in this subtree,
    /// in depth-first order.
    pub fn collect_diagnostics(&self, out: &mut Vec<Diagnostic>) {
        match self {
            Bindable::Resolved(node) => node.collect_diagnostics(out),
            Bindable::Unresolved(unresolved) => {
                out.extend(unresolved.diagnostics.iter().cloned());
            }
        }
    }
}

/// The placeholder for an element that failed to resolve.
#[derive(Debug, Clone)]
pub struct UnresolvedNode {
    /// The name that failed to resolve, when there is one.
    pub name: Option<String>,
    /// Why resolution failed; never empty.
    pub diagnostics: Vec<Diagnostic>,
}

/// A node in the typed expression tree. Every resolved variant carries or
/// derives a metadata type.
#[derive(Debug, Clone)]
pub enum TypedNode {
    /// A constant value. Null constants carry no type until context
    /// supplies one through a conversion.
    Constant {
        /// The constant's value.
        value: Value,
        /// The constant's type, absent for untyped null.
        type_ref: Option<TypeRef>,
    },
    /// A type conversion applied to a source node.
    Convert {
        /// The converted node.
        source: Box<Bindable>,
        /// The conversion target type.
        type_ref: TypeRef,
    },
    /// Access to a structural property.
    PropertyAccess {
        /// The node the property is read from.
        source: Box<Bindable>,
        /// The resolved property.
        property: StructuralProperty,
        /// The property's declared type.
        type_ref: TypeRef,
    },
    /// Access to a single-valued navigation property.
    NavigationAccess {
        /// The node the navigation starts from.
        source: Box<Bindable>,
        /// The resolved navigation property.
        navigation: NavigationProperty,
        /// The target entity type.
        type_ref: TypeRef,
    },
    /// A collection-valued navigation source, traversable only by
    /// `$count` or an `any`/`all` lambda.
    Collection {
        /// The node the navigation starts from.
        source: Box<Bindable>,
        /// The resolved navigation property.
        navigation: NavigationProperty,
        /// The collection type.
        type_ref: TypeRef,
    },
    /// The `$count` of a collection.
    Count {
        /// The counted collection.
        source: Box<Bindable>,
        /// Always non-nullable Int32.
        type_ref: TypeRef,
    },
    /// A reference to a range variable in scope.
    RangeVariableRef {
        /// The referenced variable's name.
        name: String,
        /// The variable's bound type.
        type_ref: TypeRef,
    },
    /// A binary operator application. The result type is derived from the
    /// operand types on first access.
    Binary {
        /// The operator.
        op: BinaryOperator,
        /// Left operand.
        left: Box<Bindable>,
        /// Right operand.
        right: Box<Bindable>,
        /// Memoized result type.
        result_type: Memo<Option<TypeRef>>,
    },
    /// A unary operator application.
    Unary {
        /// The operator.
        op: UnaryOperator,
        /// The operand.
        operand: Box<Bindable>,
        /// Memoized result type.
        result_type: Memo<Option<TypeRef>>,
    },
    /// A resolved function call.
    FunctionCall {
        /// Canonical function name.
        name: String,
        /// Bound arguments in written order.
        args: Vec<Bindable>,
        /// The declared return type, if any.
        type_ref: Option<TypeRef>,
    },
    /// An `any`/`all` lambda over a collection.
    Lambda {
        /// Whether this is `any` or `all`.
        kind: LambdaKind,
        /// The collection source.
        source: Box<Bindable>,
        /// The declared range variable, absent for bare `any()`.
        variable: Option<String>,
        /// The predicate body.
        body: Box<Bindable>,
        /// Always non-nullable Boolean.
        type_ref: TypeRef,
    },
}

impl TypedNode {
    /// Creates a binary node whose result type is computed lazily.
    #[must_use]
    pub fn binary(op: BinaryOperator, left: Bindable, right: Bindable) -> Self {
        TypedNode::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            result_type: Memo::new(),
        }
    }

    /// Creates a unary node whose result type is computed lazily.
    #[must_use]
    pub fn unary(op: UnaryOperator, operand: Bindable) -> Self {
        TypedNode::Unary {
            op,
            operand: Box::new(operand),
            result_type: Memo::new(),
        }
    }

    /// Returns this node's resolved type, if known. Operator result types
    /// are computed once on first access and memoized.
    #[must_use]
    pub fn type_ref(&self) -> Option<&TypeRef> {
        match self {
            TypedNode::Constant { type_ref, .. } | TypedNode::FunctionCall { type_ref, .. } => {
                type_ref.as_ref()
            }
            TypedNode::Convert { type_ref, .. }
            | TypedNode::PropertyAccess { type_ref, .. }
            | TypedNode::NavigationAccess { type_ref, .. }
            | TypedNode::Collection { type_ref, .. }
            | TypedNode::Count { type_ref, .. }
            | TypedNode::RangeVariableRef { type_ref, .. }
            | TypedNode::Lambda { type_ref, .. } => Some(type_ref),
            TypedNode::Binary {
                op,
                left,
                right,
                result_type,
            } => result_type
                .get_or_compute(|| compute_binary_type(*op, left, right))
                .as_ref(),
            TypedNode::Unary {
                op,
                operand,
                result_type,
            } => result_type
                .get_or_compute(|| compute_unary_type(*op, operand))
                .as_ref(),
        }
    }

    fn collect_diagnostics(&self, out: &mut Vec<Diagnostic>) {
        match self {
            TypedNode::Constant { .. } | TypedNode::RangeVariableRef { .. } => {}
            TypedNode::Convert { source, .. }
            | TypedNode::PropertyAccess { source, .. }
            | TypedNode::NavigationAccess { source, .. }
            | TypedNode::Collection { source, .. }
            | TypedNode::Count { source, .. } => source.collect_diagnostics(out),
            TypedNode::Binary { left, right, .. } => {
                left.collect_diagnostics(out);
                right.collect_diagnostics(out);
            }
            TypedNode::Unary { operand, .. } => operand.collect_diagnostics(out),
            TypedNode::FunctionCall { args, .. } => {
                for arg in args {
                    arg.collect_diagnostics(out);
                }
            }
            TypedNode::Lambda { source, body, .. } => {
                source.collect_diagnostics(out);
                body.collect_diagnostics(out);
            }
        }
    }
}

fn compute_binary_type(op: BinaryOperator, left: &Bindable, right: &Bindable) -> Option<TypeRef> {
    let left_type = left.type_ref()?;
    let right_type = right.type_ref()?;
    if op.is_logical_or_comparison() {
        if let (Some(left_enum), Some(right_enum)) = (left_type.as_enum(), right_type.as_enum()) {
            if left_enum.full_name() == right_enum.full_name() {
                return Some(TypeRef::primitive(
                    PrimitiveKind::Boolean,
                    left_type.nullable,
                ));
            }
        }
    }
    promote::binary_result_type(op, left_type, right_type)
}

fn compute_unary_type(op: UnaryOperator, operand: &Bindable) -> Option<TypeRef> {
    let operand_type = operand.type_ref()?;
    match op {
        UnaryOperator::Not => Some(TypeRef::primitive(
            PrimitiveKind::Boolean,
            operand_type.nullable,
        )),
        UnaryOperator::Negate => Some(operand_type.clone()),
    }
}

/// A bound `$filter` clause.
#[derive(Debug, Clone)]
pub struct FilterClause {
    /// The bound predicate.
    pub expression: Bindable,
    /// The implicit iteration variable the predicate ranges over.
    pub range_variable: RangeVariable,
    diagnostics: Memo<Vec<Diagnostic>>,
}

impl FilterClause {
    /// Creates a bound filter clause.
    #[must_use]
    pub fn new(expression: Bindable, range_variable: RangeVariable) -> Self {
        FilterClause {
            expression,
            range_variable,
            diagnostics: Memo::new(),
        }
    }

    /// The deferred diagnostics of this clause, collected once on first
    /// access.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.get_or_compute(|| {
            let mut out = Vec::new();
            self.expression.collect_diagnostics(&mut out);
            out
        })
    }
}

/// A bound `$orderby` clause: ordered sort terms.
#[derive(Debug, Clone)]
pub struct OrderByClause {
    /// Sort terms in written order.
    pub items: Vec<OrderByItem>,
    diagnostics: Memo<Vec<Diagnostic>>,
}

impl OrderByClause {
    /// Creates a bound orderby clause.
    #[must_use]
    pub fn new(items: Vec<OrderByItem>) -> Self {
        OrderByClause {
            items,
            diagnostics: Memo::new(),
        }
    }

    /// The deferred diagnostics of this clause.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.get_or_compute(|| {
            let mut out = Vec::new();
            for item in &self.items {
                item.expression.collect_diagnostics(&mut out);
            }
            out
        })
    }
}

/// One bound `$orderby` term.
#[derive(Debug, Clone)]
pub struct OrderByItem {
    /// The ordering expression.
    pub expression: Bindable,
    /// Sort direction.
    pub direction: OrderByDirection,
}

/// A bound `$select`/`$expand` pair: ordered terms, where each expand term
/// may carry nested clauses.
#[derive(Debug, Clone, Default)]
pub struct SelectExpandClause {
    /// Bound select terms in written order.
    pub select: Vec<SelectItem>,
    /// Bound expand terms in written order. Repeated terms for one
    /// navigation property stay independent entries.
    pub expands: Vec<ExpandItem>,
}

impl SelectExpandClause {
    /// Collects the deferred diagnostics of the whole clause tree.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        self.collect_diagnostics(&mut out);
        out
    }

    fn collect_diagnostics(&self, out: &mut Vec<Diagnostic>) {
        for item in &self.select {
            if let SelectItem::Property { path } = item {
                path.collect_diagnostics(out);
            }
        }
        for expand in &self.expands {
            expand.navigation.collect_diagnostics(out);
            if let Some(filter) = &expand.filter {
                out.extend(filter.diagnostics().iter().cloned());
            }
            if let Some(orderby) = &expand.orderby {
                out.extend(orderby.diagnostics().iter().cloned());
            }
            if let Some(nested) = &expand.nested {
                nested.collect_diagnostics(out);
            }
        }
    }
}

/// One bound `$select` term.
#[derive(Debug, Clone)]
pub enum SelectItem {
    /// The `*` wildcard: every structural property of the target.
    Wildcard,
    /// A bound property path.
    Property {
        /// The bound path, ending at a structural or navigation property.
        path: Bindable,
    },
}

/// One bound `$expand` term.
#[derive(Debug, Clone)]
pub struct ExpandItem {
    /// The bound navigation path this term expands.
    pub navigation: Bindable,
    /// Nested `$filter`, bound against the navigation target.
    pub filter: Option<FilterClause>,
    /// Nested `$orderby`.
    pub orderby: Option<OrderByClause>,
    /// Nested `$search`.
    pub search: Option<SearchClause>,
    /// Nested `$select`/`$expand`.
    pub nested: Option<Box<SelectExpandClause>>,
}

/// A bound `$search` clause. Search terms carry no metadata types; the
/// clause preserves the expression tree as parsed.
#[derive(Debug, Clone)]
pub struct SearchClause {
    /// The search expression.
    pub expression: SearchExpr,
}

impl SearchClause {
    /// Creates a search clause.
    #[must_use]
    pub fn new(expression: SearchExpr) -> Self {
        SearchClause { expression }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memo_computes_once() {
        let memo: Memo<i32> = Memo::new();
        assert_eq!(*memo.get_or_compute(|| 1), 1);
        // Subsequent accesses keep the first value.
        assert_eq!(*memo.get_or_compute(|| 2), 1);
    }

    #[test]
    fn test_binary_type_memoized_boolean() {
        let left = Bindable::Resolved(TypedNode::Constant {
            value: Value::Int32(1),
            type_ref: Some(TypeRef::primitive(PrimitiveKind::Int32, false)),
        });
        let right = Bindable::Resolved(TypedNode::Constant {
            value: Value::Int32(2),
            type_ref: Some(TypeRef::primitive(PrimitiveKind::Int32, false)),
        });
        let node = TypedNode::binary(BinaryOperator::LessThan, left, right);
        let type_ref = node.type_ref().unwrap();
        assert_eq!(type_ref.as_primitive(), Some(PrimitiveKind::Boolean));
        assert!(!type_ref.nullable);
    }

    #[test]
    fn test_unresolved_operand_makes_type_unknown() {
        use crate::error::{Diagnostic, DiagnosticKind};
        let left = Bindable::unresolved(
            "Foo",
            Diagnostic::new(DiagnosticKind::PropertyNotFound, "no such property"),
        );
        let right = Bindable::Resolved(TypedNode::Constant {
            value: Value::Int32(2),
            type_ref: Some(TypeRef::primitive(PrimitiveKind::Int32, false)),
        });
        let node = TypedNode::binary(BinaryOperator::Equal, left, right);
        assert!(node.type_ref().is_none());

        let mut diagnostics = Vec::new();
        node.collect_diagnostics(&mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::PropertyNotFound);
    }
}
