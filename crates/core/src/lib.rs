//! Plexus Core - Core types and node schema definitions for the plexus
//! client-side synchronization layer.
//!
//! This crate provides the foundational types shared by the rest of the
//! workspace:
//!
//! - `Value`: parsed runtime values held by node fields
//! - `schema`: node type definitions (field specs, computed properties,
//!   relations, the type registry)
//! - reserved wire constants (path separator, null sentinel, JSON tag,
//!   union alias separator, identity property names)
//! - `Error`: the error taxonomy for sync-layer operations
//!
//! # Example
//!
//! ```rust
//! use plexus_core::schema::{FieldSpec, FieldType, NodeTypeDefBuilder, RelationSpec, TypeRegistry};
//!
//! let todo = NodeTypeDefBuilder::new("todo")
//!     .unwrap()
//!     .field(FieldSpec::new("task", FieldType::String))
//!     .unwrap()
//!     .field(FieldSpec::new("done", FieldType::Boolean))
//!     .unwrap()
//!     .relation("assignee", RelationSpec::one("user"))
//!     .unwrap()
//!     .build();
//!
//! let mut registry = TypeRegistry::new();
//! let todo = registry.register(todo).unwrap();
//!
//! assert_eq!(todo.type_name(), "todo");
//! assert!(todo.field("task").is_some());
//! ```

mod consts;
mod error;
pub mod schema;
mod value;

pub use consts::{
    is_identity_property, join_path, split_path, IDENTITY_PROPERTIES, JSON_TAG, NULL_SENTINEL,
    PATH_SEPARATOR, PROP_ID, PROP_LAST_UPDATED_BY, PROP_TYPE, PROP_VERSION,
    UNION_ALIAS_SEPARATOR,
};
pub use error::{Error, Result};
pub use value::Value;
