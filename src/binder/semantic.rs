//! Metadata binding: walks the untyped syntax tree and resolves every
//! identifier, operator and literal against the model.

use std::sync::Arc;

use crate::binder::expression::{
    Bindable, ExpandItem, FilterClause, OrderByClause, OrderByItem, SearchClause,
    SelectExpandClause, SelectItem, TypedNode,
};
use crate::binder::promote;
use crate::binder::state::{BindingState, RangeVariable};
use crate::error::{Diagnostic, DiagnosticKind, QuonError, Result};
use crate::literal::coerce_numeric;
use crate::metadata::{TypeDefinition, TypeRef};
use crate::parser::ast::{
    BinaryOperator, Expr, ExpandTermToken, LambdaKind, OrderByToken, PathSegment,
    SelectTermToken, UnaryOperator,
};
use crate::types::{PrimitiveKind, Value};

/// Signatures of the built-in query functions: canonical name, accepted
/// argument counts, result kind.
const BUILTIN_FUNCTIONS: &[(&str, &[usize], PrimitiveKind)] = &[
    ("contains", &[2], PrimitiveKind::Boolean),
    ("startswith", &[2], PrimitiveKind::Boolean),
    ("endswith", &[2], PrimitiveKind::Boolean),
    ("length", &[1], PrimitiveKind::Int32),
    ("indexof", &[2], PrimitiveKind::Int32),
    ("substring", &[2, 3], PrimitiveKind::String),
    ("tolower", &[1], PrimitiveKind::String),
    ("toupper", &[1], PrimitiveKind::String),
    ("trim", &[1], PrimitiveKind::String),
    ("concat", &[2], PrimitiveKind::String),
    ("year", &[1], PrimitiveKind::Int32),
    ("month", &[1], PrimitiveKind::Int32),
    ("day", &[1], PrimitiveKind::Int32),
    ("hour", &[1], PrimitiveKind::Int32),
    ("minute", &[1], PrimitiveKind::Int32),
    ("second", &[1], PrimitiveKind::Int32),
    ("date", &[1], PrimitiveKind::Date),
    ("time", &[1], PrimitiveKind::TimeOfDay),
    ("round", &[1], PrimitiveKind::Double),
    ("floor", &[1], PrimitiveKind::Double),
    ("ceiling", &[1], PrimitiveKind::Double),
    ("now", &[0], PrimitiveKind::DateTimeOffset),
];

/// Binds untyped syntax trees against a metadata model.
///
/// One binder binds one top-level query option; the facade creates a
/// fresh binder (and binding state) per call.
pub struct Binder<'a> {
    state: BindingState<'a>,
}

impl<'a> Binder<'a> {
    /// Creates a binder over the given state.
    #[must_use]
    pub fn new(state: BindingState<'a>) -> Self {
        Binder { state }
    }

    /// Returns a reference to the binding state.
    #[must_use]
    pub fn state(&self) -> &BindingState<'a> {
        &self.state
    }

    /// Runs `f` one bind-recursion level deeper. Entry and exit are paired
    /// on every path, including early error returns.
    fn recurse<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.state.enter_recursion()?;
        let result = f(self);
        self.state.leave_recursion();
        result
    }

    /// Binds a `$filter` expression against the target type.
    ///
    /// # Errors
    ///
    /// Fails on recursion-limit, literal-conversion and fatal type errors.
    /// Unresolved identifiers do not fail the call; they surface through
    /// [`FilterClause::diagnostics`].
    pub fn bind_filter(&mut self, target: &TypeRef, expr: &Expr) -> Result<FilterClause> {
        let implicit = RangeVariable::new("$it", target.element_type().clone());
        self.state.set_implicit_range_variable(implicit.clone());
        let bound = self.bind_expr(expr)?;
        if let Some(root_type) = bound.type_ref() {
            if root_type.as_primitive() != Some(PrimitiveKind::Boolean) {
                return Err(QuonError::TypeError {
                    expected: PrimitiveKind::Boolean.name().to_string(),
                    actual: root_type.full_name(),
                });
            }
        }
        Ok(FilterClause::new(bound, implicit))
    }

    /// Binds an `$orderby` clause against the target type.
    ///
    /// # Errors
    ///
    /// As [`Binder::bind_filter`].
    pub fn bind_orderby(
        &mut self,
        target: &TypeRef,
        items: &[OrderByToken],
    ) -> Result<OrderByClause> {
        let implicit = RangeVariable::new("$it", target.element_type().clone());
        self.state.set_implicit_range_variable(implicit);
        let mut bound_items = Vec::with_capacity(items.len());
        for item in items {
            let expression = self.bind_expr(&item.expr)?;
            if let Some(item_type) = expression.type_ref() {
                if item_type.is_collection() {
                    return Err(QuonError::TypeError {
                        expected: "a single value".to_string(),
                        actual: item_type.full_name(),
                    });
                }
            }
            bound_items.push(OrderByItem {
                expression,
                direction: item.direction,
            });
        }
        Ok(OrderByClause::new(bound_items))
    }

    /// Binds `$select` and `$expand` terms against the target type,
    /// preserving written order. Nested expand options bind against the
    /// navigation target with a fresh binding state.
    ///
    /// # Errors
    ///
    /// As [`Binder::bind_filter`].
    pub fn bind_select_expand(
        &mut self,
        target: &TypeRef,
        select: &[SelectTermToken],
        expand: &[ExpandTermToken],
    ) -> Result<SelectExpandClause> {
        self.state
            .set_implicit_range_variable(RangeVariable::new("$it", target.element_type().clone()));

        let mut bound_select = Vec::with_capacity(select.len());
        for term in select {
            match term {
                SelectTermToken::Wildcard => bound_select.push(SelectItem::Wildcard),
                SelectTermToken::Path { segments, pos } => {
                    let path: Vec<PathSegment> = segments
                        .iter()
                        .map(|s| PathSegment::Property(s.clone()))
                        .collect();
                    let bound = self.bind_path(&path, *pos)?;
                    bound_select.push(SelectItem::Property { path: bound });
                }
            }
        }

        let mut bound_expands = Vec::with_capacity(expand.len());
        for term in expand {
            bound_expands.push(self.bind_expand_term(term)?);
        }

        Ok(SelectExpandClause {
            select: bound_select,
            expands: bound_expands,
        })
    }

    fn bind_expand_term(&mut self, term: &ExpandTermToken) -> Result<ExpandItem> {
        let path: Vec<PathSegment> = term
            .segments
            .iter()
            .map(|s| PathSegment::Property(s.clone()))
            .collect();
        let bound_path = self.bind_path(&path, term.pos)?;
        let is_navigation = matches!(
            &bound_path,
            Bindable::Resolved(TypedNode::NavigationAccess { .. } | TypedNode::Collection { .. })
                | Bindable::Unresolved(_)
        );
        let navigation = if is_navigation {
            bound_path
        } else {
            Bindable::unresolved(
                term.segments.join("/"),
                Diagnostic::at(
                    term.pos,
                    DiagnosticKind::PropertyNotFound,
                    format!("'{}' is not a navigation property", term.segments.join("/")),
                ),
            )
        };

        let mut item = ExpandItem {
            navigation,
            filter: None,
            orderby: None,
            search: None,
            nested: None,
        };
        if let Some(search) = &term.search {
            item.search = Some(SearchClause::new(search.clone()));
        }

        // Nested options bind against the navigation target's element
        // type; an unresolved navigation has no target to bind against.
        let Some(element) = item.navigation.type_ref().map(|t| t.element_type().clone()) else {
            return Ok(item);
        };
        if let Some(filter) = &term.filter {
            let mut binder = Binder::new(self.nested_state());
            item.filter = Some(binder.bind_filter(&element, filter)?);
        }
        if let Some(orderby) = &term.orderby {
            let mut binder = Binder::new(self.nested_state());
            item.orderby = Some(binder.bind_orderby(&element, orderby)?);
        }
        if term.select.is_some() || term.expand.is_some() {
            let mut binder = Binder::new(self.nested_state());
            let nested = binder.bind_select_expand(
                &element,
                term.select.as_deref().unwrap_or(&[]),
                term.expand.as_deref().unwrap_or(&[]),
            )?;
            item.nested = Some(Box::new(nested));
        }
        Ok(item)
    }

    fn nested_state(&self) -> BindingState<'a> {
        BindingState::new(self.state.model(), self.state.recursion_limit())
            .with_case_insensitive(self.state.case_insensitive_builtin_identifiers())
    }

    fn bind_expr(&mut self, expr: &Expr) -> Result<Bindable> {
        match expr {
            Expr::Literal { value, pos } => self.bind_literal_value(value.clone(), *pos),
            Expr::Path { segments, pos } => self.bind_path(segments, *pos),
            Expr::Unary { op, operand } => self.bind_unary(*op, operand),
            Expr::Binary { op, left, right } => self.bind_binary(*op, left, right),
            Expr::FunctionCall { name, args, pos } => self.bind_function_call(name, args, *pos),
            Expr::Lambda {
                source,
                kind,
                variable,
                body,
                pos,
            } => self.bind_lambda(source, *kind, variable.as_deref(), body.as_deref(), *pos),
            Expr::ParameterAlias { name, pos } => self.bind_alias(name, *pos),
        }
    }

    fn bind_literal_value(&mut self, value: Value, pos: usize) -> Result<Bindable> {
        if let Value::Enum { type_name, member } = &value {
            return match self.state.model().resolve_type(type_name) {
                Some(TypeDefinition::Enum(enumeration)) => {
                    let Some(resolved) = enumeration.find_member(member) else {
                        return Err(QuonError::LiteralTypeMismatch {
                            expected: enumeration.full_name(),
                            actual: format!("the unknown member '{member}'"),
                        });
                    };
                    let constant = Value::Enum {
                        type_name: enumeration.full_name(),
                        member: resolved.name.clone(),
                    };
                    let type_ref = TypeRef {
                        definition: TypeDefinition::Enum(Arc::clone(&enumeration)),
                        nullable: false,
                    };
                    Ok(Bindable::Resolved(TypedNode::Constant {
                        value: constant,
                        type_ref: Some(type_ref),
                    }))
                }
                _ => Ok(Bindable::unresolved(
                    type_name.clone(),
                    Diagnostic::at(
                        pos,
                        DiagnosticKind::UnresolvedElement,
                        format!("the enum type '{type_name}' is not defined in the model"),
                    ),
                )),
            };
        }

        let type_ref = value
            .primitive_kind()
            .map(|kind| TypeRef::primitive(kind, false));
        Ok(Bindable::Resolved(TypedNode::Constant { value, type_ref }))
    }

    fn bind_path(&mut self, segments: &[PathSegment], pos: usize) -> Result<Bindable> {
        let mut iter = segments.iter();
        let first = iter
            .next()
            .ok_or_else(|| QuonError::Internal("empty path".to_string()))?;

        let (mut current, mut current_type) = match first {
            PathSegment::RangeVariable(name) => {
                match self.state.lookup_range_variable(name) {
                    Some(variable) => {
                        let type_ref = variable.type_ref.clone();
                        (
                            Bindable::Resolved(TypedNode::RangeVariableRef {
                                name: variable.name.clone(),
                                type_ref: type_ref.clone(),
                            }),
                            type_ref,
                        )
                    }
                    None => {
                        return Ok(Bindable::unresolved(
                            name.clone(),
                            Diagnostic::at(
                                pos,
                                DiagnosticKind::RangeVariableNotFound,
                                format!("the range variable '{name}' is not in scope"),
                            ),
                        ))
                    }
                }
            }
            PathSegment::Property(name) => {
                if let Some(variable) = self.state.lookup_range_variable(name) {
                    let type_ref = variable.type_ref.clone();
                    (
                        Bindable::Resolved(TypedNode::RangeVariableRef {
                            name: variable.name.clone(),
                            type_ref: type_ref.clone(),
                        }),
                        type_ref,
                    )
                } else {
                    let implicit = self.state.implicit_range_variable().ok_or_else(|| {
                        QuonError::Internal(
                            "the implicit range variable is not set before binding".to_string(),
                        )
                    })?;
                    let implicit_type = implicit.type_ref.clone();
                    let source = Bindable::Resolved(TypedNode::RangeVariableRef {
                        name: implicit.name.clone(),
                        type_ref: implicit_type.clone(),
                    });
                    match self.resolve_segment(source, &implicit_type, name, pos) {
                        Ok((node, Some(node_type))) => (node, node_type),
                        Ok((node, None)) => return Ok(node),
                        Err(e) => return Err(e),
                    }
                }
            }
            PathSegment::Count => {
                return Ok(Bindable::unresolved(
                    "$count",
                    Diagnostic::at(
                        pos,
                        DiagnosticKind::InvalidPathSegment,
                        "$count must follow a collection-valued path",
                    ),
                ))
            }
        };

        for segment in iter {
            match segment {
                PathSegment::Count => {
                    if !current_type.is_collection() {
                        return Ok(Bindable::unresolved(
                            "$count",
                            Diagnostic::at(
                                pos,
                                DiagnosticKind::InvalidPathSegment,
                                "$count must follow a collection-valued path",
                            ),
                        ));
                    }
                    let count_type = TypeRef::primitive(PrimitiveKind::Int32, false);
                    current = Bindable::Resolved(TypedNode::Count {
                        source: Box::new(current),
                        type_ref: count_type.clone(),
                    });
                    current_type = count_type;
                }
                PathSegment::RangeVariable(name) => {
                    return Ok(Bindable::unresolved(
                        name.clone(),
                        Diagnostic::at(
                            pos,
                            DiagnosticKind::InvalidPathSegment,
                            format!("the range variable '{name}' can only start a path"),
                        ),
                    ))
                }
                PathSegment::Property(name) => {
                    if current_type.is_collection() {
                        // Properties of a collection's elements are only
                        // reachable through an any/all lambda scope.
                        return Ok(Bindable::unresolved(
                            name.clone(),
                            Diagnostic::at(
                                pos,
                                DiagnosticKind::InvalidPathSegment,
                                format!(
                                    "the property '{name}' on a collection can only be \
                                     accessed inside an any/all lambda"
                                ),
                            ),
                        ));
                    }
                    match self.resolve_segment(current, &current_type, name, pos) {
                        Ok((node, Some(node_type))) => {
                            current = node;
                            current_type = node_type;
                        }
                        Ok((node, None)) => return Ok(node),
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(current)
    }

    /// Resolves one path segment against a single-valued source type,
    /// returning the new node and its type, or an unresolved placeholder.
    fn resolve_segment(
        &self,
        source: Bindable,
        source_type: &TypeRef,
        name: &str,
        pos: usize,
    ) -> Result<(Bindable, Option<TypeRef>)> {
        let definition = &source_type.definition;
        if let Some(property) = self.state.model().structural_property(definition, name) {
            let property = property.clone();
            let type_ref = property.type_ref.clone();
            return Ok((
                Bindable::Resolved(TypedNode::PropertyAccess {
                    source: Box::new(source),
                    property,
                    type_ref: type_ref.clone(),
                }),
                Some(type_ref),
            ));
        }
        if let Some(navigation) = self.state.model().navigation_property(definition, name) {
            let navigation = navigation.clone();
            let type_ref = self.state.model().navigation_target_type(&navigation)?;
            let node = if navigation.collection {
                TypedNode::Collection {
                    source: Box::new(source),
                    navigation,
                    type_ref: type_ref.clone(),
                }
            } else {
                TypedNode::NavigationAccess {
                    source: Box::new(source),
                    navigation,
                    type_ref: type_ref.clone(),
                }
            };
            return Ok((Bindable::Resolved(node), Some(type_ref)));
        }

        let unresolved = if definition.structural_properties().is_some() {
            Bindable::unresolved(
                name,
                Diagnostic::at(
                    pos,
                    DiagnosticKind::PropertyNotFound,
                    format!(
                        "the property '{name}' does not exist on type '{}'",
                        source_type.full_name()
                    ),
                ),
            )
        } else {
            Bindable::unresolved(
                name,
                Diagnostic::at(
                    pos,
                    DiagnosticKind::InvalidPathSegment,
                    format!(
                        "the segment '{name}' cannot follow a value of type '{}'",
                        source_type.full_name()
                    ),
                ),
            )
        };
        Ok((unresolved, None))
    }

    fn bind_unary(&mut self, op: UnaryOperator, operand: &Expr) -> Result<Bindable> {
        let bound = self.recurse(|binder| binder.bind_expr(operand))?;
        if let Some(operand_type) = bound.type_ref() {
            match op {
                UnaryOperator::Not => {
                    if operand_type.as_primitive() != Some(PrimitiveKind::Boolean) {
                        return Err(QuonError::TypeError {
                            expected: PrimitiveKind::Boolean.name().to_string(),
                            actual: operand_type.full_name(),
                        });
                    }
                }
                UnaryOperator::Negate => {
                    let numeric = operand_type
                        .as_primitive()
                        .is_some_and(|kind| kind.is_numeric());
                    let duration =
                        operand_type.as_primitive() == Some(PrimitiveKind::Duration);
                    if !numeric && !duration {
                        return Err(QuonError::TypeError {
                            expected: "a numeric or duration value".to_string(),
                            actual: operand_type.full_name(),
                        });
                    }
                }
            }
        }
        Ok(Bindable::Resolved(TypedNode::unary(op, bound)))
    }

    fn bind_binary(&mut self, op: BinaryOperator, left: &Expr, right: &Expr) -> Result<Bindable> {
        let bound_left = self.recurse(|binder| binder.bind_expr(left))?;
        let bound_right = self.recurse(|binder| binder.bind_expr(right))?;
        let (bound_left, bound_right) = self.align_operands(op, bound_left, bound_right)?;
        Ok(Bindable::Resolved(TypedNode::binary(
            op,
            bound_left,
            bound_right,
        )))
    }

    /// Verifies operand compatibility for a binary operator, promoting
    /// numeric operands to their common kind. Untyped null constants take
    /// the other operand's type. Operand binding failures pass through as
    /// unresolved sub-nodes.
    fn align_operands(
        &self,
        op: BinaryOperator,
        left: Bindable,
        right: Bindable,
    ) -> Result<(Bindable, Bindable)> {
        if !left.is_resolved() || !right.is_resolved() {
            return Ok((left, right));
        }

        let left_type = left.type_ref().cloned();
        let right_type = right.type_ref().cloned();
        let (Some(left_type), Some(right_type)) = (left_type, right_type) else {
            return self.align_null_operands(left, right);
        };

        if matches!(op, BinaryOperator::And | BinaryOperator::Or) {
            for operand_type in [&left_type, &right_type] {
                if operand_type.as_primitive() != Some(PrimitiveKind::Boolean) {
                    return Err(QuonError::TypeError {
                        expected: PrimitiveKind::Boolean.name().to_string(),
                        actual: operand_type.full_name(),
                    });
                }
            }
            return Ok((left, right));
        }

        let same_enum = match (left_type.as_enum(), right_type.as_enum()) {
            (Some(l), Some(r)) => l.full_name() == r.full_name(),
            _ => false,
        };
        if op == BinaryOperator::Has {
            if same_enum {
                return Ok((left, right));
            }
            return Err(QuonError::TypeError {
                expected: "two operands of one enum type".to_string(),
                actual: format!("{} has {}", left_type.full_name(), right_type.full_name()),
            });
        }
        if same_enum {
            return Ok((left, right));
        }

        let (Some(left_kind), Some(right_kind)) =
            (left_type.as_primitive(), right_type.as_primitive())
        else {
            return Err(QuonError::TypeError {
                expected: "primitive operands".to_string(),
                actual: format!(
                    "{} {} {}",
                    left_type.full_name(),
                    op.as_str(),
                    right_type.full_name()
                ),
            });
        };

        if left_kind == right_kind || promote::has_exception_entry(op, left_kind, right_kind) {
            return Ok((left, right));
        }
        if let Some(common) = promote::common_numeric_kind(left_kind, right_kind) {
            let left = Self::promote_operand(left, &left_type, common)?;
            let right = Self::promote_operand(right, &right_type, common)?;
            return Ok((left, right));
        }
        Err(QuonError::TypeError {
            expected: left_type.full_name(),
            actual: right_type.full_name(),
        })
    }

    /// Gives an untyped null constant the other operand's type.
    #[allow(clippy::unused_self)]
    fn align_null_operands(&self, left: Bindable, right: Bindable) -> Result<(Bindable, Bindable)> {
        let convert_null = |null_side: Bindable, other_type: Option<TypeRef>| -> Bindable {
            match other_type {
                Some(target) => Bindable::Resolved(TypedNode::Convert {
                    source: Box::new(null_side),
                    type_ref: target.with_nullable(true),
                }),
                None => null_side,
            }
        };
        if is_untyped_null(&left) {
            let target = right.type_ref().cloned();
            return Ok((convert_null(left, target), right));
        }
        if is_untyped_null(&right) {
            let target = left.type_ref().cloned();
            return Ok((left, convert_null(right, target)));
        }
        // A resolved operand without a type carries deferred diagnostics
        // somewhere in its subtree; nothing to align.
        Ok((left, right))
    }

    /// Promotes one operand to the common numeric kind: constants are
    /// folded to the coerced value, everything else is wrapped in a
    /// conversion node.
    fn promote_operand(
        operand: Bindable,
        operand_type: &TypeRef,
        target: PrimitiveKind,
    ) -> Result<Bindable> {
        if operand_type.as_primitive() == Some(target) {
            return Ok(operand);
        }
        if let Bindable::Resolved(TypedNode::Constant {
            value,
            type_ref: Some(_),
        }) = &operand
        {
            let coerced = coerce_numeric(value, target)?;
            return Ok(Bindable::Resolved(TypedNode::Constant {
                value: coerced,
                type_ref: Some(TypeRef::primitive(target, operand_type.nullable)),
            }));
        }
        Ok(Bindable::Resolved(TypedNode::Convert {
            source: Box::new(operand),
            type_ref: TypeRef::primitive(target, operand_type.nullable),
        }))
    }

    fn bind_function_call(&mut self, name: &str, args: &[Expr], pos: usize) -> Result<Bindable> {
        let mut bound_args = Vec::with_capacity(args.len());
        for arg in args {
            bound_args.push(self.recurse(|binder| binder.bind_expr(arg))?);
        }

        let lookup = if self.state.case_insensitive_builtin_identifiers() {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        };
        if let Some((canonical, arities, result)) =
            BUILTIN_FUNCTIONS.iter().find(|(n, ..)| *n == lookup)
        {
            if !arities.contains(&bound_args.len()) {
                return Ok(Bindable::unresolved(
                    name,
                    Diagnostic::at(
                        pos,
                        DiagnosticKind::FunctionNotFound,
                        format!(
                            "no overload of '{canonical}' takes {} arguments",
                            bound_args.len()
                        ),
                    ),
                ));
            }
            let nullable = bound_args
                .first()
                .and_then(Bindable::type_ref)
                .is_some_and(|t| t.nullable);
            return Ok(Bindable::Resolved(TypedNode::FunctionCall {
                name: (*canonical).to_string(),
                args: bound_args,
                type_ref: Some(TypeRef::primitive(*result, nullable)),
            }));
        }

        let operations = self.state.model().find_operations_by_name(name);
        if let Some(operation) = operations.iter().find(|op| {
            op.parameters.len() == bound_args.len()
                || (op.bound && op.parameters.len() == bound_args.len() + 1)
        }) {
            return Ok(Bindable::Resolved(TypedNode::FunctionCall {
                name: name.to_string(),
                args: bound_args,
                type_ref: operation.return_type.clone(),
            }));
        }

        Ok(Bindable::unresolved(
            name,
            Diagnostic::at(
                pos,
                DiagnosticKind::FunctionNotFound,
                format!("an unknown function named '{name}' was called"),
            ),
        ))
    }

    fn bind_lambda(
        &mut self,
        source: &[PathSegment],
        kind: LambdaKind,
        variable: Option<&str>,
        body: Option<&Expr>,
        pos: usize,
    ) -> Result<Bindable> {
        let bound_source = self.bind_path(source, pos)?;
        if !bound_source.is_resolved() {
            return Ok(bound_source);
        }
        let Some(source_type) = bound_source.type_ref().cloned() else {
            return Ok(bound_source);
        };
        if !source_type.is_collection() {
            return Err(QuonError::TypeError {
                expected: "a collection value".to_string(),
                actual: source_type.full_name(),
            });
        }
        let element = source_type.element_type().clone();

        let bound_body = match (variable, body) {
            (Some(variable), Some(body)) => {
                self.state
                    .push_range_variable(RangeVariable::new(variable, element));
                let result = self.recurse(|binder| binder.bind_expr(body));
                self.state.pop_range_variable();
                result?
            }
            // Bare any(): true over every element.
            _ => Bindable::Resolved(TypedNode::Constant {
                value: Value::Boolean(true),
                type_ref: Some(TypeRef::primitive(PrimitiveKind::Boolean, false)),
            }),
        };
        if let Some(body_type) = bound_body.type_ref() {
            if body_type.as_primitive() != Some(PrimitiveKind::Boolean) {
                return Err(QuonError::TypeError {
                    expected: PrimitiveKind::Boolean.name().to_string(),
                    actual: body_type.full_name(),
                });
            }
        }
        Ok(Bindable::Resolved(TypedNode::Lambda {
            kind,
            source: Box::new(bound_source),
            variable: variable.map(ToString::to_string),
            body: Box::new(bound_body),
            type_ref: TypeRef::primitive(PrimitiveKind::Boolean, false),
        }))
    }

    fn bind_alias(&mut self, name: &str, pos: usize) -> Result<Bindable> {
        match self.state.consume_custom_option(name) {
            Some(option) => match crate::parser::parse_literal(option.value.trim()) {
                Ok(value) => self.bind_literal_value(value, pos),
                Err(_) => Ok(Bindable::unresolved(
                    name,
                    Diagnostic::at(
                        pos,
                        DiagnosticKind::UnresolvedElement,
                        format!("the value of the parameter alias '{name}' is not a literal"),
                    ),
                )),
            },
            None => Ok(Bindable::unresolved(
                name,
                Diagnostic::at(
                    pos,
                    DiagnosticKind::UnresolvedElement,
                    format!("the parameter alias '{name}' is not defined"),
                ),
            )),
        }
    }
}

fn is_untyped_null(bindable: &Bindable) -> bool {
    matches!(
        bindable.as_resolved(),
        Some(TypedNode::Constant {
            value: Value::Null,
            type_ref: None,
        })
    )
}
