//! Node type registry.
//!
//! The registry is the explicit configuration object of the sync layer: node
//! type definitions are registered once, shared as `Rc`, and looked up by
//! name when relations are resolved at compile time. There is no global
//! state; callers construct a registry and pass it where it is needed.

use crate::error::{Error, Result};
use hashbrown::HashMap;
use std::rc::Rc;

use super::node_type::NodeTypeDef;

/// Registry of node type definitions, keyed by type name.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Rc<NodeTypeDef>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Registers a definition and returns the shared handle.
    ///
    /// Registering the same type name twice is an `InvalidSchema` error.
    pub fn register(&mut self, def: NodeTypeDef) -> Result<Rc<NodeTypeDef>> {
        let name = def.type_name().to_string();
        if self.types.contains_key(&name) {
            return Err(Error::invalid_schema(format!(
                "Node type already registered: {}",
                name
            )));
        }
        let rc = Rc::new(def);
        self.types.insert(name, rc.clone());
        Ok(rc)
    }

    /// Gets a registered definition by type name.
    pub fn get(&self, type_name: &str) -> Option<Rc<NodeTypeDef>> {
        self.types.get(type_name).cloned()
    }

    /// Gets a registered definition, failing with `InvalidQuery` if absent.
    ///
    /// Used by the compiler when resolving relation targets by name.
    pub fn require(&self, type_name: &str) -> Result<Rc<NodeTypeDef>> {
        self.get(type_name)
            .ok_or_else(|| Error::invalid_query(format!("Unknown node type: {}", type_name)))
    }

    /// Returns the number of registered types.
    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no types are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, FieldType, NodeTypeDefBuilder};

    fn user_def() -> crate::schema::NodeTypeDef {
        NodeTypeDefBuilder::new("user")
            .unwrap()
            .field(FieldSpec::new("name", FieldType::String))
            .unwrap()
            .build()
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = TypeRegistry::new();
        assert!(registry.is_empty());

        let def = registry.register(user_def()).unwrap();
        assert_eq!(def.type_name(), "user");
        assert_eq!(registry.len(), 1);
        assert!(registry.get("user").is_some());
        assert!(registry.get("todo").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = TypeRegistry::new();
        registry.register(user_def()).unwrap();
        let err = registry.register(user_def()).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn test_require_unknown_type() {
        let registry = TypeRegistry::new();
        let err = registry.require("ghost").unwrap_err();
        assert!(matches!(err, Error::InvalidQuery { .. }));
    }
}
