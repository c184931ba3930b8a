//! Metadata binder: turns the untyped syntax tree into a typed
//! expression tree, resolving identifiers, operators and literals against
//! the model. Unresolved elements become placeholder nodes carrying
//! diagnostics; binding continues around them.

mod expression;
mod promote;
mod semantic;
mod state;

pub use expression::{
    Bindable, ExpandItem, FilterClause, Memo, OrderByClause, OrderByItem, SearchClause,
    SelectExpandClause, SelectItem, TypedNode, UnresolvedNode,
};
pub use promote::{binary_result_type, common_numeric_kind, has_exception_entry};
pub use semantic::Binder;
pub use state::{BindingState, CustomQueryOption, RangeVariable};
