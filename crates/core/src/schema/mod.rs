//! Schema definitions for node types.

mod field;
mod node_type;
mod registry;

pub use field::{FieldSpec, FieldType};
pub use node_type::{
    Cardinality, ComputeFn, ComputedSpec, NodeTypeDef, NodeTypeDefBuilder, RelationSpec,
    RelationTarget,
};
pub use registry::TypeRegistry;
