//! Node type definitions: declared fields, computed fields, relations.
//!
//! A `NodeTypeDef` is the static schema for one node type. It is immutable
//! after `build()` and shared as `Rc<NodeTypeDef>` through a
//! [`TypeRegistry`](super::TypeRegistry). The identity properties (id,
//! version, lastUpdatedBy, type) are implied on every node type; declaring
//! one as a field is a fatal `ImpliedProperty` error.

use crate::consts::{self, PATH_SEPARATOR, UNION_ALIAS_SEPARATOR};
use crate::error::{Error, Result};
use crate::value::Value;
use hashbrown::HashMap;
use std::fmt;

use super::field::{FieldSpec, FieldType};

/// Cardinality of a relation: governs result shape (scalar vs list).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    /// Relation resolves to at most one node.
    One,
    /// Relation resolves to a list of nodes.
    Many,
}

/// Target of a relation, by node type name.
///
/// Targets are names, not definitions: they are resolved through the
/// `TypeRegistry` when a query is compiled, so mutually-referencing node
/// types never hold references to each other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationTarget {
    /// A single concrete node type.
    Single(String),
    /// A union of node types; results carry whichever member matched.
    Union(Vec<String>),
}

/// A relation declared on a node type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationSpec {
    cardinality: Cardinality,
    target: RelationTarget,
}

impl RelationSpec {
    /// Declares a to-one relation to a single node type.
    pub fn one(target: impl Into<String>) -> Self {
        Self {
            cardinality: Cardinality::One,
            target: RelationTarget::Single(target.into()),
        }
    }

    /// Declares a to-many relation to a single node type.
    pub fn many(target: impl Into<String>) -> Self {
        Self {
            cardinality: Cardinality::Many,
            target: RelationTarget::Single(target.into()),
        }
    }

    /// Declares a relation to a union of node types.
    pub fn union(cardinality: Cardinality, targets: &[&str]) -> Self {
        Self {
            cardinality,
            target: RelationTarget::Union(targets.iter().map(|t| t.to_string()).collect()),
        }
    }

    /// Returns the relation cardinality.
    #[inline]
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Returns the relation target.
    #[inline]
    pub fn target(&self) -> &RelationTarget {
        &self.target
    }
}

/// Function computing a derived property from a node's parsed data.
pub type ComputeFn = Box<dyn Fn(&HashMap<String, Value>) -> Value>;

/// A computed (derived) property on a node type.
///
/// Dependencies are an explicit allow-list of declared property paths; a
/// proxy refuses to evaluate the computation while any dependency is not up
/// to date.
pub struct ComputedSpec {
    name: String,
    dependencies: Vec<String>,
    compute: ComputeFn,
}

impl ComputedSpec {
    /// Creates a computed property from its dependencies and function.
    pub fn new<F>(name: impl Into<String>, dependencies: &[&str], compute: F) -> Self
    where
        F: Fn(&HashMap<String, Value>) -> Value + 'static,
    {
        Self {
            name: name.into(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            compute: Box::new(compute),
        }
    }

    /// Returns the property name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared dependency paths.
    #[inline]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Evaluates the computation over a node's parsed data.
    pub fn evaluate(&self, parsed: &HashMap<String, Value>) -> Value {
        (self.compute)(parsed)
    }
}

impl fmt::Debug for ComputedSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedSpec")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Static schema for one node type.
pub struct NodeTypeDef {
    type_name: String,
    fields: Vec<FieldSpec>,
    computed: Vec<ComputedSpec>,
    relations: Vec<(String, RelationSpec)>,
}

impl NodeTypeDef {
    /// Returns the node type name.
    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the declared fields, in declaration order.
    ///
    /// Identity properties are implied and never appear here.
    #[inline]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Gets a declared field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Returns the computed properties.
    #[inline]
    pub fn computed(&self) -> &[ComputedSpec] {
        &self.computed
    }

    /// Gets a computed property by name.
    pub fn computed_spec(&self, name: &str) -> Option<&ComputedSpec> {
        self.computed.iter().find(|c| c.name() == name)
    }

    /// Returns the declared relations, in declaration order.
    #[inline]
    pub fn relations(&self) -> &[(String, RelationSpec)] {
        &self.relations
    }

    /// Gets a relation by alias.
    pub fn relation(&self, alias: &str) -> Option<&RelationSpec> {
        self.relations
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, spec)| spec)
    }

    /// Returns every declared leaf property path, flattened.
    ///
    /// Object fields expand recursively with the reserved separator; arrays
    /// and records are leaves. This is the default projection for a query
    /// with no selection.
    pub fn declared_property_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for spec in &self.fields {
            collect_paths(spec.name(), spec.field_type(), &mut paths);
        }
        paths
    }
}

fn collect_paths(root: &str, field_type: &FieldType, out: &mut Vec<String>) {
    match field_type {
        FieldType::Object(specs) => {
            for spec in specs {
                collect_paths(&consts::join_path(root, spec.name()), spec.field_type(), out);
            }
        }
        _ => out.push(root.to_string()),
    }
}

impl fmt::Debug for NodeTypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTypeDef")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .field("computed", &self.computed)
            .field("relations", &self.relations)
            .finish()
    }
}

/// Builder for node type definitions.
#[derive(Debug)]
pub struct NodeTypeDefBuilder {
    type_name: String,
    fields: Vec<FieldSpec>,
    computed: Vec<ComputedSpec>,
    relations: Vec<(String, RelationSpec)>,
}

impl NodeTypeDefBuilder {
    /// Creates a new builder for the given node type name.
    pub fn new(type_name: impl Into<String>) -> Result<Self> {
        let type_name = type_name.into();
        check_naming_rules(&type_name)?;
        Ok(Self {
            type_name,
            fields: Vec::new(),
            computed: Vec::new(),
            relations: Vec::new(),
        })
    }

    /// Declares a field.
    ///
    /// Fails with `ImpliedProperty` for identity names and `InvalidSchema`
    /// for duplicates or names violating naming rules (recursively for
    /// nested object fields).
    pub fn field(mut self, spec: FieldSpec) -> Result<Self> {
        self.check_top_level_name(spec.name())?;
        check_field_names(spec.field_type())?;
        self.fields.push(spec);
        Ok(self)
    }

    /// Declares a computed property.
    pub fn computed(mut self, spec: ComputedSpec) -> Result<Self> {
        self.check_top_level_name(spec.name())?;
        self.computed.push(spec);
        Ok(self)
    }

    /// Declares a relation under the given alias.
    pub fn relation(mut self, alias: impl Into<String>, spec: RelationSpec) -> Result<Self> {
        let alias = alias.into();
        self.check_top_level_name(&alias)?;
        self.relations.push((alias, spec));
        Ok(self)
    }

    /// Finalizes the definition.
    pub fn build(self) -> NodeTypeDef {
        NodeTypeDef {
            type_name: self.type_name,
            fields: self.fields,
            computed: self.computed,
            relations: self.relations,
        }
    }

    fn check_top_level_name(&self, name: &str) -> Result<()> {
        if consts::is_identity_property(name) {
            return Err(Error::implied_property(&self.type_name, name));
        }
        check_naming_rules(name)?;
        let taken = self.fields.iter().any(|f| f.name() == name)
            || self.computed.iter().any(|c| c.name() == name)
            || self.relations.iter().any(|(alias, _)| alias == name);
        if taken {
            return Err(Error::invalid_schema(format!(
                "Property already declared: {}",
                name
            )));
        }
        Ok(())
    }
}

/// Validates a name follows naming rules and avoids reserved separators.
fn check_naming_rules(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_schema("Name cannot be empty"));
    }
    let first = name.chars().next().unwrap();
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(Error::invalid_schema(format!(
            "Name must start with letter or underscore: {}",
            name
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::invalid_schema(format!(
            "Name contains invalid characters: {}",
            name
        )));
    }
    if name.contains(PATH_SEPARATOR) || name.contains(UNION_ALIAS_SEPARATOR) {
        return Err(Error::invalid_schema(format!(
            "Name contains a reserved separator: {}",
            name
        )));
    }
    Ok(())
}

fn check_field_names(field_type: &FieldType) -> Result<()> {
    if let FieldType::Object(specs) = field_type {
        for spec in specs {
            check_naming_rules(spec.name())?;
            check_field_names(spec.field_type())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo_def() -> NodeTypeDef {
        NodeTypeDefBuilder::new("todo")
            .unwrap()
            .field(FieldSpec::new("task", FieldType::String))
            .unwrap()
            .field(FieldSpec::new(
                "meta",
                FieldType::Object(vec![
                    FieldSpec::new("priority", FieldType::Number),
                    FieldSpec::new("done", FieldType::Boolean),
                ]),
            ))
            .unwrap()
            .relation("assignee", RelationSpec::one("user"))
            .unwrap()
            .build()
    }

    #[test]
    fn test_builder_basics() {
        let def = todo_def();
        assert_eq!(def.type_name(), "todo");
        assert_eq!(def.fields().len(), 2);
        assert!(def.field("task").is_some());
        assert!(def.field("missing").is_none());
        assert_eq!(
            def.relation("assignee").unwrap().cardinality(),
            Cardinality::One
        );
    }

    #[test]
    fn test_reserved_field_name_is_fatal() {
        let err = NodeTypeDefBuilder::new("todo")
            .unwrap()
            .field(FieldSpec::new("version", FieldType::Number))
            .unwrap_err();
        match err {
            Error::ImpliedProperty { property, .. } => assert_eq!(property, "version"),
            other => panic!("expected ImpliedProperty, got {:?}", other),
        }
    }

    #[test]
    fn test_reserved_relation_alias_is_fatal() {
        let err = NodeTypeDefBuilder::new("todo")
            .unwrap()
            .relation("type", RelationSpec::one("user"))
            .unwrap_err();
        assert!(matches!(err, Error::ImpliedProperty { .. }));
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let err = NodeTypeDefBuilder::new("todo")
            .unwrap()
            .field(FieldSpec::new("task", FieldType::String))
            .unwrap()
            .relation("task", RelationSpec::many("user"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn test_separator_in_name_rejected() {
        let err = NodeTypeDefBuilder::new("todo")
            .unwrap()
            .field(FieldSpec::new("a__dot__b", FieldType::String))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn test_declared_property_paths() {
        let def = todo_def();
        assert_eq!(
            def.declared_property_paths(),
            vec!["task", "meta__dot__priority", "meta__dot__done"]
        );
    }

    #[test]
    fn test_computed_spec_evaluate() {
        let spec = ComputedSpec::new("loud", &["task"], |parsed| {
            let task = parsed.get("task").and_then(|v| v.as_str()).unwrap_or("");
            Value::String(task.to_uppercase())
        });
        let mut parsed = HashMap::new();
        parsed.insert("task".to_string(), Value::String("ship it".into()));
        assert_eq!(spec.evaluate(&parsed), Value::String("SHIP IT".into()));
        assert_eq!(spec.dependencies(), &["task".to_string()]);
    }
}
