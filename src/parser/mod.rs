//! Syntactic parser: converts raw query-option text into the untyped
//! syntax tree. No metadata knowledge; identifier resolution happens in
//! the binder.

pub mod ast;
mod grammar;

pub use grammar::{
    parse_expand, parse_filter, parse_literal, parse_orderby, parse_search, parse_select,
};
