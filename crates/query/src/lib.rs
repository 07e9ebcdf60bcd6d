//! Plexus Query - Query record compiler for the plexus sync layer.
//!
//! Turns declarative query definitions into the normalized `QueryRecord`
//! tree, a ready wire document, and per-alias subscription descriptors:
//!
//! - `QueryDefinitions` / `QueryDefinition` / `Target`: what to fetch
//! - `Selection`: the projection manifest (fields, nested objects,
//!   relations)
//! - `compile`: the stateless compiler
//! - `QueryRecord` / `QueryRecordEntry`: the normalized output consumed by
//!   query managers
//!
//! # Example
//!
//! ```rust
//! use plexus_core::schema::{FieldSpec, FieldType, NodeTypeDefBuilder, TypeRegistry};
//! use plexus_query::{compile, QueryDefinition, QueryDefinitions, Selection};
//!
//! let mut registry = TypeRegistry::new();
//! let todo = registry
//!     .register(
//!         NodeTypeDefBuilder::new("todo")
//!             .unwrap()
//!             .field(FieldSpec::new("task", FieldType::String))
//!             .unwrap()
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let compiled = compile(
//!     &registry,
//!     &QueryDefinitions::new().query(
//!         "todos",
//!         QueryDefinition::new(todo).select(Selection::new().field("task")),
//!     ),
//! )
//! .unwrap();
//!
//! assert!(compiled.record.get("todos").unwrap().has_property("task"));
//! ```

mod compile;
mod definition;
mod record;
mod selection;

pub use compile::compile;
pub use definition::{QueryDefinition, QueryDefinitions, Target};
pub use record::{
    CompiledQuery, QueryRecord, QueryRecordEntry, RelationalEntry, SubscriptionDescriptor,
};
pub use selection::{Selection, SelectionItem};
