//! Binding state: the per-bind-call context for metadata binding.

use crate::error::{QuonError, Result};
use crate::metadata::{Model, TypeRef};

/// A lexically scoped variable: a lambda parameter or the implicit
/// iteration variable (`$it`).
#[derive(Debug, Clone, PartialEq)]
pub struct RangeVariable {
    /// Variable name as referenced in expressions.
    pub name: String,
    /// The bound element type.
    pub type_ref: TypeRef,
}

impl RangeVariable {
    /// Creates a new range variable.
    #[must_use]
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        RangeVariable {
            name: name.into(),
            type_ref,
        }
    }
}

/// A custom query option supplied alongside the system options, consumed
/// when a parameter alias binds to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomQueryOption {
    /// Option name, including any `@` sigil.
    pub name: String,
    /// Raw option value text.
    pub value: String,
}

impl CustomQueryOption {
    /// Creates a new custom query option.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        CustomQueryOption {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Encapsulates the state of one top-level bind invocation.
///
/// Never shared across binds or threads; the referenced model is
/// immutable and safe for concurrent reads from many states.
#[derive(Debug)]
pub struct BindingState<'a> {
    /// The model used for binding.
    model: &'a Model,
    /// Lexical scope stack for lambda bodies, innermost last.
    range_variables: Vec<RangeVariable>,
    /// The implicit iteration variable, set once per bind.
    implicit_range_variable: Option<RangeVariable>,
    /// Current recursion depth of binding.
    recursion_depth: u32,
    /// Configured recursion bound.
    recursion_limit: u32,
    /// Whether built-in identifiers match case-insensitively.
    case_insensitive_builtin_identifiers: bool,
    /// Custom query options not yet consumed by a parameter alias.
    custom_options: Vec<CustomQueryOption>,
}

impl<'a> BindingState<'a> {
    /// Creates a binding state over the given model.
    #[must_use]
    pub fn new(model: &'a Model, recursion_limit: u32) -> Self {
        BindingState {
            model,
            range_variables: Vec::new(),
            implicit_range_variable: None,
            recursion_depth: 0,
            recursion_limit,
            case_insensitive_builtin_identifiers: false,
            custom_options: Vec::new(),
        }
    }

    /// Sets the case policy for built-in identifiers.
    #[must_use]
    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive_builtin_identifiers = case_insensitive;
        self
    }

    /// Supplies the custom query options available to parameter aliases.
    #[must_use]
    pub fn with_custom_options(mut self, options: Vec<CustomQueryOption>) -> Self {
        self.custom_options = options;
        self
    }

    /// The model used for binding.
    #[must_use]
    pub fn model(&self) -> &'a Model {
        self.model
    }

    /// The configured recursion bound.
    #[must_use]
    pub fn recursion_limit(&self) -> u32 {
        self.recursion_limit
    }

    /// Whether built-in identifiers match case-insensitively.
    #[must_use]
    pub fn case_insensitive_builtin_identifiers(&self) -> bool {
        self.case_insensitive_builtin_identifiers
    }

    /// Marks that a recursive bind step was entered.
    ///
    /// Must be paired with [`BindingState::leave_recursion`] on every exit
    /// path; the binder does this through a scoped closure helper.
    ///
    /// # Errors
    ///
    /// Returns [`QuonError::RecursionLimitExceeded`] when the depth now
    /// exceeds the configured bound.
    pub fn enter_recursion(&mut self) -> Result<()> {
        self.recursion_depth += 1;
        if self.recursion_depth > self.recursion_limit {
            return Err(QuonError::RecursionLimitExceeded {
                limit: self.recursion_limit,
            });
        }
        Ok(())
    }

    /// Marks that a recursive bind step is leaving.
    pub fn leave_recursion(&mut self) {
        debug_assert!(
            self.recursion_depth > 0,
            "imbalanced recursion calls: leave without enter"
        );
        self.recursion_depth = self.recursion_depth.saturating_sub(1);
    }

    /// Pushes a lambda range variable onto the scope stack.
    pub fn push_range_variable(&mut self, variable: RangeVariable) {
        self.range_variables.push(variable);
    }

    /// Pops the innermost lambda range variable.
    pub fn pop_range_variable(&mut self) -> Option<RangeVariable> {
        self.range_variables.pop()
    }

    /// Sets the implicit iteration variable. Write-once per bind: setting
    /// it twice is a programming error, not a user error.
    pub fn set_implicit_range_variable(&mut self, variable: RangeVariable) {
        debug_assert!(
            self.implicit_range_variable.is_none(),
            "the implicit range variable should only be set once per bind"
        );
        self.implicit_range_variable = Some(variable);
    }

    /// The implicit iteration variable, if set.
    #[must_use]
    pub fn implicit_range_variable(&self) -> Option<&RangeVariable> {
        self.implicit_range_variable.as_ref()
    }

    /// Looks up a range variable by name, walking the scope stack from the
    /// innermost scope down, then the implicit variable.
    #[must_use]
    pub fn lookup_range_variable(&self, name: &str) -> Option<&RangeVariable> {
        self.range_variables
            .iter()
            .rev()
            .find(|v| v.name == name)
            .or(match &self.implicit_range_variable {
                Some(implicit) if implicit.name == name => Some(implicit),
                _ => None,
            })
    }

    /// Removes and returns the custom query option with the given name,
    /// if one is still unconsumed.
    pub fn consume_custom_option(&mut self, name: &str) -> Option<CustomQueryOption> {
        let index = self.custom_options.iter().position(|o| o.name == name)?;
        Some(self.custom_options.remove(index))
    }
}
