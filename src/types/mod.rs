//! Core value types shared by the parser, binder and literal service.

mod value;

pub use value::{PrimitiveKind, Value};
