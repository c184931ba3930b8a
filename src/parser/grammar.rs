//! Pest parser integration for the query option grammar.
//!
//! Parsing happens in two stages: the PEG grammar in `grammar.pest`
//! recognizes the text, then the lowering functions here build the untyped
//! AST. The lowering recursion mirrors the grammar's recursive productions
//! one-to-one, so the configured depth limits are enforced exactly where
//! recursion actually happens. A string-aware nesting pre-scan rejects
//! adversarially deep input before the PEG machinery ever runs.

use std::str::FromStr;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use chrono::{DateTime, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{QuonError, Result};
use crate::parser::ast::{
    BinaryOperator, Expr, ExpandTermToken, LambdaKind, OrderByDirection, OrderByToken,
    PathSegment, SearchExpr, SelectTermToken, UnaryOperator,
};
use crate::types::Value;
use crate::ParserSettings;

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
struct OptionGrammar;

/// Per-parse lowering state: the settings, the active depth limit, and the
/// running select/expand term count.
struct ParseContext<'a> {
    settings: &'a ParserSettings,
    limit: u32,
    depth: u32,
    terms: u32,
}

impl<'a> ParseContext<'a> {
    fn new(settings: &'a ParserSettings, limit: u32) -> Self {
        ParseContext {
            settings,
            limit,
            depth: 0,
            terms: 0,
        }
    }

    /// Runs `f` one recursion level deeper, failing when the active limit
    /// is exceeded. The depth is restored on every exit path.
    fn recurse<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.depth += 1;
        if self.depth > self.limit {
            self.depth -= 1;
            return Err(QuonError::RecursionLimitExceeded { limit: self.limit });
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Counts one select/expand term against the configured maximum.
    fn count_term(&mut self) -> Result<()> {
        self.terms += 1;
        if self.terms > self.settings.max_select_expand_terms {
            return Err(QuonError::RecursionLimitExceeded {
                limit: self.settings.max_select_expand_terms,
            });
        }
        Ok(())
    }

    /// Enforces the case policy for a built-in keyword: the canonical
    /// spelling is always accepted, other spellings only when configured.
    fn check_keyword(&self, pair: &Pair<'_, Rule>, canonical: &str) -> Result<()> {
        if self.settings.case_insensitive_builtin_identifiers || pair.as_str() == canonical {
            Ok(())
        } else {
            Err(QuonError::Syntax {
                position: pair.as_span().start(),
                message: format!(
                    "'{}' is not a known identifier; built-in identifiers are case sensitive \
                     (expected '{canonical}')",
                    pair.as_str()
                ),
            })
        }
    }
}

fn syntax_error(error: &pest::error::Error<Rule>) -> QuonError {
    let position = match error.location {
        pest::error::InputLocation::Pos(pos) => pos,
        pest::error::InputLocation::Span((start, _)) => start,
    };
    QuonError::Syntax {
        position,
        message: error.variant.message().to_string(),
    }
}

fn parse_rule<'i>(rule: Rule, text: &'i str) -> Result<Pair<'i, Rule>> {
    let mut pairs = OptionGrammar::parse(rule, text).map_err(|e| syntax_error(&e))?;
    pairs.next().ok_or_else(|| QuonError::Internal(
        "grammar produced no pairs for a successful parse".to_string(),
    ))
}

/// Rejects input whose nesting (parentheses plus runs of unary operators)
/// exceeds the given limit, before any recursive parsing takes place.
/// Quoted strings are skipped. Lowering re-checks the exact limits; this
/// scan only bounds the recursion the PEG machinery may perform.
fn check_nesting(text: &str, limit: u32) -> Result<()> {
    let mut depth: u32 = 0;
    let mut unary_run: u32 = 0;
    let mut in_string = false;
    let mut word = String::new();

    for ch in text.chars() {
        if in_string {
            if ch == '\'' {
                in_string = false;
            }
            continue;
        }
        if ch.is_ascii_alphanumeric() || ch == '_' {
            word.push(ch);
            continue;
        }
        if word.eq_ignore_ascii_case("not") {
            unary_run += 1;
        } else if !word.is_empty() {
            unary_run = 0;
        }
        word.clear();
        match ch {
            '\'' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                unary_run = 0;
            }
            '-' => unary_run += 1,
            _ => {}
        }
        if depth + unary_run > limit {
            return Err(QuonError::RecursionLimitExceeded { limit });
        }
    }
    Ok(())
}

/// Parses a `$filter` expression.
///
/// # Errors
///
/// Returns a syntax error on grammar mismatch (no partial tree), or
/// [`QuonError::RecursionLimitExceeded`] when nesting exceeds the limits.
pub fn parse_filter(text: &str, settings: &ParserSettings) -> Result<Expr> {
    check_nesting(text, settings.max_filter_depth)?;
    let pair = parse_rule(Rule::filter, text)?;
    let mut ctx = ParseContext::new(settings, settings.max_filter_depth);
    let expr = expect_inner(pair, Rule::expr)?;
    lower_expr(expr, &mut ctx)
}

/// Parses an `$orderby` clause into its ordered terms.
///
/// # Errors
///
/// As [`parse_filter`].
pub fn parse_orderby(text: &str, settings: &ParserSettings) -> Result<Vec<OrderByToken>> {
    check_nesting(text, settings.max_orderby_depth)?;
    let pair = parse_rule(Rule::orderby, text)?;
    let mut ctx = ParseContext::new(settings, settings.max_orderby_depth);
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::orderby_item)
        .map(|item| lower_orderby_item(item, &mut ctx))
        .collect()
}

/// Parses a `$select` clause into its ordered terms.
///
/// # Errors
///
/// As [`parse_filter`].
pub fn parse_select(text: &str, settings: &ParserSettings) -> Result<Vec<SelectTermToken>> {
    let pair = parse_rule(Rule::select, text)?;
    let mut ctx = ParseContext::new(settings, settings.max_select_expand_terms);
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::select_item)
        .map(|item| lower_select_item(item, &mut ctx))
        .collect()
}

/// Parses an `$expand` clause into its ordered terms, including nested
/// query options.
///
/// # Errors
///
/// As [`parse_filter`].
pub fn parse_expand(text: &str, settings: &ParserSettings) -> Result<Vec<ExpandTermToken>> {
    check_nesting(
        text,
        settings
            .max_select_expand_terms
            .saturating_add(settings.max_filter_depth),
    )?;
    let pair = parse_rule(Rule::expand, text)?;
    let mut ctx = ParseContext::new(settings, settings.max_select_expand_terms);
    let items = expect_inner(pair, Rule::expand_items)?;
    lower_expand_items(items, &mut ctx)
}

/// Parses a `$search` expression.
///
/// # Errors
///
/// As [`parse_filter`].
pub fn parse_search(text: &str, settings: &ParserSettings) -> Result<SearchExpr> {
    check_nesting(text, settings.max_search_depth)?;
    let pair = parse_rule(Rule::search, text)?;
    let mut ctx = ParseContext::new(settings, settings.max_search_depth);
    let or = expect_inner(pair, Rule::search_or)?;
    lower_search_or(or, &mut ctx)
}

/// Parses one standalone literal, as used by the literal conversion
/// service. Built-in keywords are matched case-sensitively here.
///
/// # Errors
///
/// Returns a syntax error when the text is not exactly one literal.
pub fn parse_literal(text: &str) -> Result<Value> {
    let pair = parse_rule(Rule::literal_entry, text)?;
    let literal = expect_inner(pair, Rule::literal)?;
    lower_literal(&literal, false)
}

fn expect_inner<'i>(pair: Pair<'i, Rule>, rule: Rule) -> Result<Pair<'i, Rule>> {
    pair.into_inner()
        .find(|p| p.as_rule() == rule)
        .ok_or_else(|| QuonError::Internal(format!("expected inner rule {rule:?}")))
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

fn binary_operator(text: &str) -> BinaryOperator {
    match text {
        "or" => BinaryOperator::Or,
        "and" => BinaryOperator::And,
        "eq" => BinaryOperator::Equal,
        "ne" => BinaryOperator::NotEqual,
        "gt" => BinaryOperator::GreaterThan,
        "ge" => BinaryOperator::GreaterThanOrEqual,
        "lt" => BinaryOperator::LessThan,
        "le" => BinaryOperator::LessThanOrEqual,
        "has" => BinaryOperator::Has,
        "add" => BinaryOperator::Add,
        "sub" => BinaryOperator::Subtract,
        "mul" => BinaryOperator::Multiply,
        "div" => BinaryOperator::Divide,
        _ => BinaryOperator::Modulo,
    }
}

/// Lowers a left-associative `operand (op operand)*` production.
fn lower_binary_chain<'i>(
    pair: Pair<'i, Rule>,
    ctx: &mut ParseContext<'_>,
    operand_rule: Rule,
    lower_operand: fn(Pair<'i, Rule>, &mut ParseContext<'_>) -> Result<Expr>,
) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| {
        QuonError::Internal(format!("empty {operand_rule:?} chain"))
    })?;
    let mut node = lower_operand(first, ctx)?;
    while let Some(op_pair) = inner.next() {
        let canonical = op_pair.as_str().to_ascii_lowercase();
        ctx.check_keyword(&op_pair, &canonical)?;
        let right_pair = inner.next().ok_or_else(|| {
            QuonError::Internal("binary operator without right operand".to_string())
        })?;
        let right = lower_operand(right_pair, ctx)?;
        node = Expr::Binary {
            op: binary_operator(&canonical),
            left: Box::new(node),
            right: Box::new(right),
        };
    }
    Ok(node)
}

fn lower_expr(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<Expr> {
    lower_binary_chain(pair, ctx, Rule::and_expr, lower_and_expr)
}

fn lower_and_expr(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<Expr> {
    lower_binary_chain(pair, ctx, Rule::cmp_expr, lower_cmp_expr)
}

fn lower_cmp_expr(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<Expr> {
    lower_binary_chain(pair, ctx, Rule::add_expr, lower_add_expr)
}

fn lower_add_expr(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<Expr> {
    lower_binary_chain(pair, ctx, Rule::mul_expr, lower_mul_expr)
}

fn lower_mul_expr(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<Expr> {
    lower_binary_chain(pair, ctx, Rule::unary, lower_unary)
}

fn lower_unary(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| {
        QuonError::Internal("empty unary production".to_string())
    })?;
    match first.as_rule() {
        Rule::not_kw => {
            ctx.check_keyword(&first, "not")?;
            let operand_pair = inner.next().ok_or_else(|| {
                QuonError::Internal("'not' without operand".to_string())
            })?;
            let operand = ctx.recurse(|ctx| lower_unary(operand_pair, ctx))?;
            Ok(Expr::Unary {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            })
        }
        Rule::neg_op => {
            let operand_pair = inner.next().ok_or_else(|| {
                QuonError::Internal("'-' without operand".to_string())
            })?;
            let operand = ctx.recurse(|ctx| lower_unary(operand_pair, ctx))?;
            Ok(Expr::Unary {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            })
        }
        Rule::primary => lower_primary(first, ctx),
        other => Err(QuonError::Internal(format!(
            "unexpected rule {other:?} in unary production"
        ))),
    }
}

fn lower_primary(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<Expr> {
    let inner = pair.into_inner().next().ok_or_else(|| {
        QuonError::Internal("empty primary production".to_string())
    })?;
    match inner.as_rule() {
        Rule::paren_expr => {
            let expr = expect_inner(inner, Rule::expr)?;
            ctx.recurse(|ctx| lower_expr(expr, ctx))
        }
        Rule::literal => {
            let pos = inner.as_span().start();
            let value = lower_literal(&inner, ctx.settings.case_insensitive_builtin_identifiers)?;
            Ok(Expr::Literal { value, pos })
        }
        Rule::function_call => lower_function_call(inner, ctx),
        Rule::path_expr => lower_path(inner, ctx),
        Rule::param_alias => Ok(Expr::ParameterAlias {
            name: inner.as_str().to_string(),
            pos: inner.as_span().start(),
        }),
        other => Err(QuonError::Internal(format!(
            "unexpected rule {other:?} in primary production"
        ))),
    }
}

fn lower_function_call(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<Expr> {
    let pos = pair.as_span().start();
    let mut inner = pair.into_inner();
    let name = inner
        .next()
        .ok_or_else(|| QuonError::Internal("function call without a name".to_string()))?
        .as_str()
        .to_string();
    let args = inner
        .filter(|p| p.as_rule() == Rule::expr)
        .map(|arg| lower_expr(arg, ctx))
        .collect::<Result<Vec<_>>>()?;
    Ok(Expr::FunctionCall { name, args, pos })
}

fn lower_path(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<Expr> {
    let pos = pair.as_span().start();
    let seg_pairs: Vec<Pair<'_, Rule>> = pair.into_inner().collect();
    let last_index = seg_pairs.len() - 1;

    let mut segments = Vec::new();
    for (index, seg) in seg_pairs.into_iter().enumerate() {
        let seg_pos = seg.as_span().start();
        let inner = seg.into_inner().next().ok_or_else(|| {
            QuonError::Internal("empty path segment".to_string())
        })?;
        match inner.as_rule() {
            Rule::lambda_seg => {
                if index != last_index {
                    return Err(QuonError::Syntax {
                        position: seg_pos,
                        message: "an any/all segment must be the last path segment".to_string(),
                    });
                }
                if segments.is_empty() {
                    return Err(QuonError::Syntax {
                        position: seg_pos,
                        message: "an any/all segment must follow a collection path".to_string(),
                    });
                }
                return lower_lambda_segment(inner, segments, pos, ctx);
            }
            Rule::count_kw => {
                ctx.check_keyword(&inner, "$count")?;
                segments.push(PathSegment::Count);
            }
            Rule::range_var => {
                segments.push(PathSegment::RangeVariable(inner.as_str().to_string()));
            }
            Rule::ident => segments.push(PathSegment::Property(inner.as_str().to_string())),
            other => {
                return Err(QuonError::Internal(format!(
                    "unexpected rule {other:?} in path segment"
                )))
            }
        }
    }

    check_path_depth(segments.len(), ctx)?;
    Ok(Expr::Path { segments, pos })
}

fn check_path_depth(len: usize, ctx: &ParseContext<'_>) -> Result<()> {
    if len as u64 > u64::from(ctx.settings.max_path_depth) {
        return Err(QuonError::RecursionLimitExceeded {
            limit: ctx.settings.max_path_depth,
        });
    }
    Ok(())
}

fn lower_lambda_segment(
    pair: Pair<'_, Rule>,
    source: Vec<PathSegment>,
    pos: usize,
    ctx: &mut ParseContext<'_>,
) -> Result<Expr> {
    check_path_depth(source.len() + 1, ctx)?;
    let mut inner = pair.into_inner();
    let kw = inner.next().ok_or_else(|| {
        QuonError::Internal("lambda segment without a keyword".to_string())
    })?;
    let kind = match kw.as_rule() {
        Rule::any_kw => {
            ctx.check_keyword(&kw, "any")?;
            LambdaKind::Any
        }
        _ => {
            ctx.check_keyword(&kw, "all")?;
            LambdaKind::All
        }
    };
    let (variable, body) = match inner.next() {
        Some(var_pair) => {
            let variable = var_pair.as_str().to_string();
            let body_pair = inner.next().ok_or_else(|| {
                QuonError::Internal("lambda variable without a body".to_string())
            })?;
            let body = ctx.recurse(|ctx| lower_expr(body_pair, ctx))?;
            (Some(variable), Some(Box::new(body)))
        }
        None => (None, None),
    };
    if body.is_none() && kind == LambdaKind::All {
        return Err(QuonError::Syntax {
            position: pos,
            message: "'all' requires a range variable and a predicate body".to_string(),
        });
    }
    Ok(Expr::Lambda {
        source,
        kind,
        variable,
        body,
        pos,
    })
}

// ---------------------------------------------------------------------------
// Literals
// ---------------------------------------------------------------------------

fn lower_literal(pair: &Pair<'_, Rule>, case_insensitive: bool) -> Result<Value> {
    let inner = pair
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| QuonError::Internal("empty literal production".to_string()))?;
    let text = inner.as_str();
    let position = inner.as_span().start();
    let keyword_ok = |canonical: &str| -> Result<()> {
        if case_insensitive || text == canonical {
            Ok(())
        } else {
            Err(QuonError::Syntax {
                position,
                message: format!(
                    "'{text}' is not a known identifier; built-in identifiers are case \
                     sensitive (expected '{canonical}')"
                ),
            })
        }
    };
    let invalid = |what: &str| QuonError::Syntax {
        position,
        message: format!("'{text}' is not a valid {what} literal"),
    };

    match inner.as_rule() {
        Rule::null_lit => {
            keyword_ok("null")?;
            Ok(Value::Null)
        }
        Rule::bool_lit => {
            let canonical = text.to_ascii_lowercase();
            keyword_ok(&canonical)?;
            Ok(Value::Boolean(canonical == "true"))
        }
        Rule::number_lit => lower_number(text, position),
        Rule::string_lit => Ok(Value::String(unquote(text))),
        Rule::guid_lit => Uuid::parse_str(text)
            .map(Value::Guid)
            .map_err(|_| invalid("guid")),
        Rule::datetimeoffset_lit => DateTime::parse_from_rfc3339(text)
            .map(Value::DateTimeOffset)
            .map_err(|_| invalid("date-time-offset")),
        Rule::date_lit => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| invalid("date")),
        Rule::timeofday_lit => NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
            .map(Value::TimeOfDay)
            .map_err(|_| invalid("time-of-day")),
        Rule::duration_lit => {
            let open = text.find('\'').ok_or_else(|| invalid("duration"))?;
            if !case_insensitive && &text[..open] != "duration" {
                return Err(QuonError::Syntax {
                    position,
                    message: format!(
                        "'{}' is not a known identifier; built-in identifiers are case \
                         sensitive (expected 'duration')",
                        &text[..open]
                    ),
                });
            }
            let body = &text[open + 1..text.len() - 1];
            crate::literal::parse_duration(body)
                .map(Value::Duration)
                .ok_or_else(|| invalid("duration"))
        }
        Rule::enum_lit => {
            let open = text.find('\'').ok_or_else(|| invalid("enum"))?;
            Ok(Value::Enum {
                type_name: text[..open].to_string(),
                member: unquote(&text[open..]),
            })
        }
        other => Err(QuonError::Internal(format!(
            "unexpected rule {other:?} in literal production"
        ))),
    }
}

fn unquote(text: &str) -> String {
    text[1..text.len() - 1].replace("''", "'")
}

fn lower_number(text: &str, position: usize) -> Result<Value> {
    let out_of_range = || QuonError::Syntax {
        position,
        message: format!("the numeric literal '{text}' is out of range"),
    };

    let (body, suffix) = match text.chars().last() {
        Some(c @ ('f' | 'F' | 'd' | 'D' | 'm' | 'M' | 'l' | 'L')) => {
            (&text[..text.len() - 1], Some(c.to_ascii_lowercase()))
        }
        _ => (text, None),
    };

    match suffix {
        Some('f') => body.parse::<f32>().map(Value::Single).map_err(|_| out_of_range()),
        Some('d') => body.parse::<f64>().map(Value::Double).map_err(|_| out_of_range()),
        Some('m') => Decimal::from_str(body)
            .or_else(|_| Decimal::from_scientific(body))
            .map(Value::Decimal)
            .map_err(|_| out_of_range()),
        Some(_) => body.parse::<i64>().map(Value::Int64).map_err(|_| out_of_range()),
        None => {
            if body.contains(['.', 'e', 'E']) {
                body.parse::<f64>().map(Value::Double).map_err(|_| out_of_range())
            } else {
                let wide: i64 = body.parse().map_err(|_| out_of_range())?;
                Ok(match i32::try_from(wide) {
                    Ok(narrow) => Value::Int32(narrow),
                    Err(_) => Value::Int64(wide),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// $orderby, $select, $expand
// ---------------------------------------------------------------------------

fn lower_orderby_item(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<OrderByToken> {
    let mut inner = pair.into_inner();
    let expr_pair = inner.next().ok_or_else(|| {
        QuonError::Internal("orderby item without an expression".to_string())
    })?;
    let expr = lower_expr(expr_pair, ctx)?;
    let direction = match inner.next() {
        Some(dir) if dir.as_rule() == Rule::desc_kw => {
            ctx.check_keyword(&dir, "desc")?;
            OrderByDirection::Descending
        }
        Some(dir) => {
            ctx.check_keyword(&dir, "asc")?;
            OrderByDirection::Ascending
        }
        None => OrderByDirection::Ascending,
    };
    Ok(OrderByToken { expr, direction })
}

fn lower_select_item(
    pair: Pair<'_, Rule>,
    ctx: &mut ParseContext<'_>,
) -> Result<SelectTermToken> {
    ctx.count_term()?;
    let inner = pair.into_inner().next().ok_or_else(|| {
        QuonError::Internal("empty select item".to_string())
    })?;
    match inner.as_rule() {
        Rule::star => Ok(SelectTermToken::Wildcard),
        Rule::select_path => {
            let pos = inner.as_span().start();
            let segments = lower_select_path(inner, ctx)?;
            Ok(SelectTermToken::Path { segments, pos })
        }
        other => Err(QuonError::Internal(format!(
            "unexpected rule {other:?} in select item"
        ))),
    }
}

fn lower_select_path(pair: Pair<'_, Rule>, ctx: &ParseContext<'_>) -> Result<Vec<String>> {
    let segments: Vec<String> = pair
        .into_inner()
        .map(|seg| seg.as_str().to_string())
        .collect();
    check_path_depth(segments.len(), ctx)?;
    Ok(segments)
}

fn lower_expand_items(
    pair: Pair<'_, Rule>,
    ctx: &mut ParseContext<'_>,
) -> Result<Vec<ExpandTermToken>> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::expand_item)
        .map(|item| lower_expand_item(item, ctx))
        .collect()
}

fn lower_expand_item(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<ExpandTermToken> {
    ctx.count_term()?;
    let mut inner = pair.into_inner();
    let path_pair = inner.next().ok_or_else(|| {
        QuonError::Internal("expand item without a path".to_string())
    })?;
    let mut term = ExpandTermToken {
        pos: path_pair.as_span().start(),
        segments: lower_select_path(path_pair, ctx)?,
        ..ExpandTermToken::default()
    };

    if let Some(opts) = inner.next() {
        for opt in opts.into_inner().filter(|p| p.as_rule() == Rule::expand_opt) {
            lower_expand_option(opt, &mut term, ctx)?;
        }
    }
    Ok(term)
}

fn lower_expand_option(
    pair: Pair<'_, Rule>,
    term: &mut ExpandTermToken,
    ctx: &mut ParseContext<'_>,
) -> Result<()> {
    let inner = pair.into_inner().next().ok_or_else(|| {
        QuonError::Internal("empty expand option".to_string())
    })?;
    let rule = inner.as_rule();
    let position = inner.as_span().start();
    let duplicate = |name: &str| QuonError::Syntax {
        position,
        message: format!("duplicate expand option '{name}'"),
    };
    let mut parts = inner.into_inner();
    let kw = parts.next().ok_or_else(|| {
        QuonError::Internal("expand option without a keyword".to_string())
    })?;

    match rule {
        Rule::filter_opt => {
            ctx.check_keyword(&kw, "$filter")?;
            if term.filter.is_some() {
                return Err(duplicate("$filter"));
            }
            let expr_pair = parts.next().ok_or_else(|| {
                QuonError::Internal("$filter option without an expression".to_string())
            })?;
            // Nested filters recurse against the filter limit, not the
            // expand limit.
            let mut nested = ParseContext::new(ctx.settings, ctx.settings.max_filter_depth);
            term.filter = Some(lower_expr(expr_pair, &mut nested)?);
        }
        Rule::orderby_opt => {
            ctx.check_keyword(&kw, "$orderby")?;
            if term.orderby.is_some() {
                return Err(duplicate("$orderby"));
            }
            let mut nested = ParseContext::new(ctx.settings, ctx.settings.max_orderby_depth);
            let items = parts
                .filter(|p| p.as_rule() == Rule::orderby_item)
                .map(|item| lower_orderby_item(item, &mut nested))
                .collect::<Result<Vec<_>>>()?;
            term.orderby = Some(items);
        }
        Rule::select_opt => {
            ctx.check_keyword(&kw, "$select")?;
            if term.select.is_some() {
                return Err(duplicate("$select"));
            }
            let items = parts
                .filter(|p| p.as_rule() == Rule::select_item)
                .map(|item| lower_select_item(item, ctx))
                .collect::<Result<Vec<_>>>()?;
            term.select = Some(items);
        }
        Rule::expand_opt_nested => {
            ctx.check_keyword(&kw, "$expand")?;
            if term.expand.is_some() {
                return Err(duplicate("$expand"));
            }
            let items_pair = parts.next().ok_or_else(|| {
                QuonError::Internal("$expand option without items".to_string())
            })?;
            let items = ctx.recurse(|ctx| lower_expand_items(items_pair, ctx))?;
            term.expand = Some(items);
        }
        Rule::search_opt => {
            ctx.check_keyword(&kw, "$search")?;
            if term.search.is_some() {
                return Err(duplicate("$search"));
            }
            let or_pair = parts.next().ok_or_else(|| {
                QuonError::Internal("$search option without an expression".to_string())
            })?;
            let mut nested = ParseContext::new(ctx.settings, ctx.settings.max_search_depth);
            term.search = Some(lower_search_or(or_pair, &mut nested)?);
        }
        other => {
            return Err(QuonError::Internal(format!(
                "unexpected rule {other:?} in expand option"
            )))
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// $search
// ---------------------------------------------------------------------------

fn lower_search_or(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<SearchExpr> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| {
        QuonError::Internal("empty search expression".to_string())
    })?;
    let mut node = lower_search_and(first, ctx)?;
    while let Some(op_pair) = inner.next() {
        ctx.check_keyword(&op_pair, "OR")?;
        let right_pair = inner.next().ok_or_else(|| {
            QuonError::Internal("'OR' without right operand".to_string())
        })?;
        let right = lower_search_and(right_pair, ctx)?;
        node = SearchExpr::Or(Box::new(node), Box::new(right));
    }
    Ok(node)
}

fn lower_search_and(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<SearchExpr> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| {
        QuonError::Internal("empty search conjunction".to_string())
    })?;
    let mut node = lower_search_not(first, ctx)?;
    for next in inner {
        if next.as_rule() == Rule::search_and_kw {
            ctx.check_keyword(&next, "AND")?;
            continue;
        }
        let right = lower_search_not(next, ctx)?;
        node = SearchExpr::And(Box::new(node), Box::new(right));
    }
    Ok(node)
}

fn lower_search_not(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<SearchExpr> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| {
        QuonError::Internal("empty search negation".to_string())
    })?;
    if first.as_rule() == Rule::search_not_kw {
        ctx.check_keyword(&first, "NOT")?;
        let operand_pair = inner.next().ok_or_else(|| {
            QuonError::Internal("'NOT' without operand".to_string())
        })?;
        let operand = ctx.recurse(|ctx| lower_search_not(operand_pair, ctx))?;
        return Ok(SearchExpr::Not(Box::new(operand)));
    }
    lower_search_atom(first, ctx)
}

fn lower_search_atom(pair: Pair<'_, Rule>, ctx: &mut ParseContext<'_>) -> Result<SearchExpr> {
    let inner = pair.into_inner().next().ok_or_else(|| {
        QuonError::Internal("empty search atom".to_string())
    })?;
    match inner.as_rule() {
        Rule::search_phrase => {
            let text = inner.as_str();
            Ok(SearchExpr::Phrase(text[1..text.len() - 1].to_string()))
        }
        Rule::search_group => {
            let or = expect_inner(inner, Rule::search_or)?;
            ctx.recurse(|ctx| lower_search_or(or, ctx))
        }
        Rule::search_word => Ok(SearchExpr::Word(inner.as_str().to_string())),
        other => Err(QuonError::Internal(format!(
            "unexpected rule {other:?} in search atom"
        ))),
    }
}
