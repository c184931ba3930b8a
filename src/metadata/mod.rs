//! Metadata model consumed read-only by the binder.

mod schema;

pub use schema::{
    ComplexType, EntityType, EnumMember, EnumType, Model, NavigationProperty, Operation,
    OperationParameter, StructuralProperty, TypeDefinition, TypeRef,
};
