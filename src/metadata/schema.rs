//! Metadata model: the read-only catalog of types, properties and
//! operations the binder resolves against.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{QuonError, Result};
use crate::types::PrimitiveKind;

/// A reference to a type, together with its nullability.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    /// The referenced type definition.
    pub definition: TypeDefinition,
    /// Whether the null value is allowed.
    pub nullable: bool,
}

impl TypeRef {
    /// Creates a reference to a primitive type.
    #[must_use]
    pub fn primitive(kind: PrimitiveKind, nullable: bool) -> Self {
        TypeRef {
            definition: TypeDefinition::Primitive(kind),
            nullable,
        }
    }

    /// Creates a collection reference over the given element type.
    #[must_use]
    pub fn collection(element: TypeRef) -> Self {
        TypeRef {
            definition: TypeDefinition::Collection(Box::new(element)),
            nullable: false,
        }
    }

    /// Returns the same reference with the given nullability.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Returns whether this reference is collection-valued.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self.definition, TypeDefinition::Collection(_))
    }

    /// Returns the element type of a collection reference, or the reference
    /// itself for single-valued references.
    #[must_use]
    pub fn element_type(&self) -> &TypeRef {
        match &self.definition {
            TypeDefinition::Collection(element) => element,
            _ => self,
        }
    }

    /// Returns the primitive kind, if this is a single-valued primitive
    /// reference.
    #[must_use]
    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self.definition {
            TypeDefinition::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    /// Returns the enum type, if this is a single-valued enum reference.
    #[must_use]
    pub fn as_enum(&self) -> Option<&Arc<EnumType>> {
        match &self.definition {
            TypeDefinition::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the qualified name of the referenced type.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.definition.full_name()
    }
}

/// A type definition reachable from the model.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    /// Built-in primitive type.
    Primitive(PrimitiveKind),
    /// Enumeration type.
    Enum(Arc<EnumType>),
    /// Complex (structured, keyless) type.
    Complex(Arc<ComplexType>),
    /// Entity (structured, keyed) type.
    Entity(Arc<EntityType>),
    /// Collection of an element type.
    Collection(Box<TypeRef>),
}

impl TypeDefinition {
    /// Returns the qualified name of this type.
    #[must_use]
    pub fn full_name(&self) -> String {
        match self {
            TypeDefinition::Primitive(kind) => kind.name().to_string(),
            TypeDefinition::Enum(e) => e.full_name(),
            TypeDefinition::Complex(c) => c.full_name(),
            TypeDefinition::Entity(e) => e.full_name(),
            TypeDefinition::Collection(element) => {
                format!("Collection({})", element.full_name())
            }
        }
    }

    /// Returns the structural properties of a structured type, or `None`
    /// for non-structured types.
    #[must_use]
    pub fn structural_properties(&self) -> Option<&[StructuralProperty]> {
        match self {
            TypeDefinition::Complex(c) => Some(&c.properties),
            TypeDefinition::Entity(e) => Some(&e.properties),
            _ => None,
        }
    }

    /// Returns the navigation properties of an entity type, or `None`
    /// otherwise.
    #[must_use]
    pub fn navigation_properties(&self) -> Option<&[NavigationProperty]> {
        match self {
            TypeDefinition::Entity(e) => Some(&e.navigations),
            _ => None,
        }
    }
}

/// An enumeration type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    /// Declaring namespace.
    pub namespace: String,
    /// Bare type name.
    pub name: String,
    /// Members in declaration order.
    pub members: Vec<EnumMember>,
}

impl EnumType {
    /// Returns the qualified name of this enum type.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Returns whether the given literal type name refers to this enum.
    /// Both the qualified and the bare name are accepted.
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        name == self.name || name == self.full_name()
    }

    /// Looks up a member by name, or by its integer value when `text`
    /// parses as one.
    #[must_use]
    pub fn find_member(&self, text: &str) -> Option<&EnumMember> {
        if let Some(member) = self.members.iter().find(|m| m.name == text) {
            return Some(member);
        }
        if let Ok(value) = text.parse::<i64>() {
            return self.members.iter().find(|m| m.value == value);
        }
        None
    }
}

/// A member of an enumeration type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    /// Member name.
    pub name: String,
    /// Underlying integer value.
    pub value: i64,
}

/// A structural (primitive, enum or complex valued) property.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralProperty {
    /// Property name.
    pub name: String,
    /// Declared type.
    pub type_ref: TypeRef,
}

impl StructuralProperty {
    /// Creates a new structural property.
    #[must_use]
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        StructuralProperty {
            name: name.into(),
            type_ref,
        }
    }
}

/// A navigation property pointing at another entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationProperty {
    /// Property name.
    pub name: String,
    /// Name of the target entity type, as registered in the model.
    pub target: String,
    /// Whether the navigation is collection-valued.
    pub collection: bool,
    /// Whether a single-valued navigation may be null.
    pub nullable: bool,
}

impl NavigationProperty {
    /// Creates a single-valued navigation property.
    #[must_use]
    pub fn single(name: impl Into<String>, target: impl Into<String>) -> Self {
        NavigationProperty {
            name: name.into(),
            target: target.into(),
            collection: false,
            nullable: true,
        }
    }

    /// Creates a collection-valued navigation property.
    #[must_use]
    pub fn many(name: impl Into<String>, target: impl Into<String>) -> Self {
        NavigationProperty {
            name: name.into(),
            target: target.into(),
            collection: true,
            nullable: false,
        }
    }
}

/// An entity type: structured, keyed, navigable.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    /// Declaring namespace.
    pub namespace: String,
    /// Bare type name.
    pub name: String,
    /// Names of the key properties.
    pub key: Vec<String>,
    /// Structural properties in declaration order.
    pub properties: Vec<StructuralProperty>,
    /// Navigation properties in declaration order.
    pub navigations: Vec<NavigationProperty>,
}

impl EntityType {
    /// Returns the qualified name of this entity type.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// A complex type: structured, keyless.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexType {
    /// Declaring namespace.
    pub namespace: String,
    /// Bare type name.
    pub name: String,
    /// Structural properties in declaration order.
    pub properties: Vec<StructuralProperty>,
}

impl ComplexType {
    /// Returns the qualified name of this complex type.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// A model-declared operation (function or action).
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Declaring namespace.
    pub namespace: String,
    /// Bare operation name.
    pub name: String,
    /// Declared parameters, binding parameter first for bound operations.
    pub parameters: Vec<OperationParameter>,
    /// Return type, if any.
    pub return_type: Option<TypeRef>,
    /// Whether the operation is bound to its first parameter.
    pub bound: bool,
}

/// A declared operation parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationParameter {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    pub type_ref: TypeRef,
}

/// Central registry of the types and operations available for binding.
///
/// Built programmatically, then shared read-only (typically behind an
/// `Arc`). Concurrent binds against one model are safe: nothing here
/// mutates after construction.
#[derive(Debug, Clone, Default)]
pub struct Model {
    /// Entity types by bare name.
    entity_types: HashMap<String, Arc<EntityType>>,
    /// Complex types by bare name.
    complex_types: HashMap<String, Arc<ComplexType>>,
    /// Enum types by bare name.
    enum_types: HashMap<String, Arc<EnumType>>,
    /// Operations grouped by bare name; overloads share an entry.
    operations: HashMap<String, Vec<Arc<Operation>>>,
}

impl Model {
    /// Creates a new empty model.
    #[must_use]
    pub fn new() -> Self {
        Model::default()
    }

    /// Registers an entity type.
    ///
    /// # Errors
    ///
    /// Returns an error if a type with the same name already exists or a
    /// navigation property targets an unknown entity type (self-references
    /// are allowed).
    pub fn add_entity_type(&mut self, entity: EntityType) -> Result<()> {
        if self.type_name_taken(&entity.name) {
            return Err(QuonError::Metadata(format!(
                "Type '{}' already exists",
                entity.name
            )));
        }
        for nav in &entity.navigations {
            if nav.target != entity.name && !self.entity_types.contains_key(&nav.target) {
                return Err(QuonError::Metadata(format!(
                    "Navigation property '{}' targets unknown entity type '{}'",
                    nav.name, nav.target
                )));
            }
        }
        self.entity_types
            .insert(entity.name.clone(), Arc::new(entity));
        Ok(())
    }

    /// Registers a complex type.
    ///
    /// # Errors
    ///
    /// Returns an error if a type with the same name already exists.
    pub fn add_complex_type(&mut self, complex: ComplexType) -> Result<()> {
        if self.type_name_taken(&complex.name) {
            return Err(QuonError::Metadata(format!(
                "Type '{}' already exists",
                complex.name
            )));
        }
        self.complex_types
            .insert(complex.name.clone(), Arc::new(complex));
        Ok(())
    }

    /// Registers an enum type.
    ///
    /// # Errors
    ///
    /// Returns an error if a type with the same name already exists.
    pub fn add_enum_type(&mut self, enumeration: EnumType) -> Result<()> {
        if self.type_name_taken(&enumeration.name) {
            return Err(QuonError::Metadata(format!(
                "Type '{}' already exists",
                enumeration.name
            )));
        }
        self.enum_types
            .insert(enumeration.name.clone(), Arc::new(enumeration));
        Ok(())
    }

    /// Registers an operation. Overloads of one name accumulate.
    pub fn add_operation(&mut self, operation: Operation) {
        self.operations
            .entry(operation.name.clone())
            .or_default()
            .push(Arc::new(operation));
    }

    fn type_name_taken(&self, name: &str) -> bool {
        self.entity_types.contains_key(name)
            || self.complex_types.contains_key(name)
            || self.enum_types.contains_key(name)
    }

    /// Resolves a type name to its definition. Both bare and qualified
    /// names are accepted.
    #[must_use]
    pub fn resolve_type(&self, name: &str) -> Option<TypeDefinition> {
        let bare = name.rsplit('.').next().unwrap_or(name);
        if let Some(entity) = self.entity_types.get(bare) {
            if entity.matches(name) {
                return Some(TypeDefinition::Entity(Arc::clone(entity)));
            }
        }
        if let Some(complex) = self.complex_types.get(bare) {
            if name == complex.name || name == complex.full_name() {
                return Some(TypeDefinition::Complex(Arc::clone(complex)));
            }
        }
        if let Some(enumeration) = self.enum_types.get(bare) {
            if enumeration.matches_name(name) {
                return Some(TypeDefinition::Enum(Arc::clone(enumeration)));
            }
        }
        None
    }

    /// Looks up an entity type by bare name.
    #[must_use]
    pub fn entity_type(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.entity_types.get(name)
    }

    /// Looks up a structural property on a structured type.
    #[must_use]
    pub fn structural_property<'a>(
        &self,
        definition: &'a TypeDefinition,
        name: &str,
    ) -> Option<&'a StructuralProperty> {
        definition
            .structural_properties()?
            .iter()
            .find(|p| p.name == name)
    }

    /// Looks up a navigation property on a structured type.
    #[must_use]
    pub fn navigation_property<'a>(
        &self,
        definition: &'a TypeDefinition,
        name: &str,
    ) -> Option<&'a NavigationProperty> {
        definition
            .navigation_properties()?
            .iter()
            .find(|n| n.name == name)
    }

    /// Resolves the type a navigation property yields: the target entity
    /// type, wrapped in a collection for collection-valued navigations.
    ///
    /// # Errors
    ///
    /// Returns an error if the target entity type is missing from the
    /// model, which indicates the model was built inconsistently.
    pub fn navigation_target_type(&self, nav: &NavigationProperty) -> Result<TypeRef> {
        let entity = self.entity_types.get(&nav.target).ok_or_else(|| {
            QuonError::Metadata(format!(
                "Navigation property '{}' targets unknown entity type '{}'",
                nav.name, nav.target
            ))
        })?;
        let element = TypeRef {
            definition: TypeDefinition::Entity(Arc::clone(entity)),
            nullable: nav.nullable,
        };
        if nav.collection {
            Ok(TypeRef::collection(element))
        } else {
            Ok(element)
        }
    }

    /// Returns all registered operations with the given bare name.
    #[must_use]
    pub fn find_operations_by_name(&self, name: &str) -> &[Arc<Operation>] {
        self.operations.get(name).map_or(&[], Vec::as_slice)
    }

    /// Returns a reference to the given primitive type.
    #[must_use]
    pub fn primitive(&self, kind: PrimitiveKind, nullable: bool) -> TypeRef {
        TypeRef::primitive(kind, nullable)
    }
}

impl EntityType {
    fn matches(&self, name: &str) -> bool {
        name == self.name || name == self.full_name()
    }
}
