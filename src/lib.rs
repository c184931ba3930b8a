//! quon - parser and metadata binder for OData-style query options.
//!
//! The crate turns raw query-option text (`$filter`, `$orderby`,
//! `$select`, `$expand`, `$search`) into an untyped syntax tree, then
//! binds that tree against a read-only metadata model, yielding a typed
//! expression tree or a structured set of diagnostics.

pub mod binder;
pub mod error;
pub mod literal;
pub mod metadata;
pub mod parser;
pub mod types;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use binder::{
    Bindable, CustomQueryOption, FilterClause, OrderByClause, SearchClause, SelectExpandClause,
    TypedNode,
};
pub use error::{Diagnostic, DiagnosticKind, QuonError, Result};
pub use literal::ProtocolVersion;
pub use metadata::{Model, TypeRef};
pub use types::{PrimitiveKind, Value};

use binder::{Binder, BindingState};

/// Limits and matching policy for one parser instance.
///
/// The depth limits are the primary defense against adversarial input:
/// every recursive grammar production counts against the relevant limit,
/// independent of how deep the host's stack could otherwise go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserSettings {
    /// Maximum number of segments in one path.
    pub max_path_depth: u32,
    /// Maximum recursion depth of a `$filter` expression, and of binding.
    pub max_filter_depth: u32,
    /// Maximum recursion depth of an `$orderby` expression.
    pub max_orderby_depth: u32,
    /// Maximum recursion depth of a `$search` expression.
    pub max_search_depth: u32,
    /// Maximum number of `$select`/`$expand` terms in one clause,
    /// counted across nesting; also bounds expand nesting depth.
    pub max_select_expand_terms: u32,
    /// Whether built-in identifiers (`$count`, `eq`, `and`, ...) match
    /// case-insensitively. Never affects user identifiers.
    pub case_insensitive_builtin_identifiers: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            max_path_depth: 100,
            max_filter_depth: 50,
            max_orderby_depth: 50,
            max_search_depth: 100,
            max_select_expand_terms: 100,
            case_insensitive_builtin_identifiers: false,
        }
    }
}

/// Parses and binds query options against one target type.
///
/// The model is shared read-only; concurrent parsers over one model are
/// safe. Each parse call creates its own binding state, so a parser value
/// can be reused across calls.
pub struct QueryOptionParser {
    model: Arc<Model>,
    target: TypeRef,
    settings: ParserSettings,
    custom_options: Vec<CustomQueryOption>,
}

impl QueryOptionParser {
    /// Creates a parser binding against `target`, an entity type or a
    /// collection of one.
    #[must_use]
    pub fn new(model: Arc<Model>, target: TypeRef) -> Self {
        QueryOptionParser {
            model,
            target,
            settings: ParserSettings::default(),
            custom_options: Vec::new(),
        }
    }

    /// Replaces the parser settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ParserSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Supplies custom query options; parameter aliases in `$filter` and
    /// `$orderby` consume them.
    #[must_use]
    pub fn with_custom_options(mut self, options: Vec<CustomQueryOption>) -> Self {
        self.custom_options = options;
        self
    }

    /// Returns the parser settings.
    #[must_use]
    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    fn new_binder(&self) -> Binder<'_> {
        let state = BindingState::new(&self.model, self.settings.max_filter_depth)
            .with_case_insensitive(self.settings.case_insensitive_builtin_identifiers)
            .with_custom_options(self.custom_options.clone());
        Binder::new(state)
    }

    /// Parses and binds a `$filter` query option.
    ///
    /// # Errors
    ///
    /// Fails on syntax errors, exceeded limits, and fatal literal or type
    /// errors. Unresolved identifiers surface through
    /// [`FilterClause::diagnostics`] instead.
    pub fn parse_filter(&self, text: &str) -> Result<FilterClause> {
        let expr = parser::parse_filter(text, &self.settings)?;
        self.new_binder().bind_filter(&self.target, &expr)
    }

    /// Parses and binds an `$orderby` query option.
    ///
    /// # Errors
    ///
    /// As [`QueryOptionParser::parse_filter`].
    pub fn parse_orderby(&self, text: &str) -> Result<OrderByClause> {
        let items = parser::parse_orderby(text, &self.settings)?;
        self.new_binder().bind_orderby(&self.target, &items)
    }

    /// Parses and binds `$select` and `$expand` query options together.
    /// Either may be absent; term order is preserved.
    ///
    /// # Errors
    ///
    /// As [`QueryOptionParser::parse_filter`].
    pub fn parse_select_expand(
        &self,
        select: Option<&str>,
        expand: Option<&str>,
    ) -> Result<SelectExpandClause> {
        let select_terms = match select {
            Some(text) => parser::parse_select(text, &self.settings)?,
            None => Vec::new(),
        };
        let expand_terms = match expand {
            Some(text) => parser::parse_expand(text, &self.settings)?,
            None => Vec::new(),
        };
        self.new_binder()
            .bind_select_expand(&self.target, &select_terms, &expand_terms)
    }

    /// Parses a `$search` query option. Search terms carry no metadata
    /// types, so the clause wraps the parsed expression directly.
    ///
    /// # Errors
    ///
    /// Fails on syntax errors and exceeded limits.
    pub fn parse_search(&self, text: &str) -> Result<SearchClause> {
        Ok(SearchClause::new(parser::parse_search(
            text,
            &self.settings,
        )?))
    }
}
