//! Property-based tests for the query record compiler using proptest.

use plexus_core::schema::{FieldSpec, FieldType, NodeTypeDefBuilder, RelationSpec, TypeRegistry};
use plexus_query::{compile, QueryDefinition, QueryDefinitions, Selection};
use proptest::prelude::*;

const SCALAR_FIELDS: [&str; 4] = ["task", "done", "score", "notes"];

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register(
            NodeTypeDefBuilder::new("user")
                .unwrap()
                .field(FieldSpec::new("name", FieldType::String))
                .unwrap()
                .build(),
        )
        .unwrap();
    registry
        .register(
            NodeTypeDefBuilder::new("todo")
                .unwrap()
                .field(FieldSpec::new("task", FieldType::String))
                .unwrap()
                .field(FieldSpec::new("done", FieldType::Boolean))
                .unwrap()
                .field(FieldSpec::new("score", FieldType::Number))
                .unwrap()
                .field(FieldSpec::new("notes", FieldType::String).optional(true))
                .unwrap()
                .relation("assignee", RelationSpec::one("user"))
                .unwrap()
                .build(),
        )
        .unwrap();
    registry
}

fn selection_from(indices: &[usize], with_relation: bool) -> Selection {
    let mut selection = Selection::new();
    for &i in indices {
        selection = selection.field(SCALAR_FIELDS[i % SCALAR_FIELDS.len()]);
    }
    if with_relation {
        selection = selection.relation("assignee", Selection::new().field("name"));
    }
    selection
}

proptest! {
    /// Compiling identical definitions twice yields structurally identical
    /// records and byte-identical documents.
    #[test]
    fn compile_is_deterministic(
        indices in prop::collection::vec(0usize..4, 1..12),
        with_relation in any::<bool>(),
        ids in prop::collection::vec("[a-z]{1,8}", 0..4)
    ) {
        let registry = registry();
        let build = || {
            let mut qd = QueryDefinition::new(registry.get("todo").unwrap())
                .select(selection_from(&indices, with_relation));
            if !ids.is_empty() {
                qd = qd.by_ids(ids.clone());
            }
            QueryDefinitions::new().query("todos", qd)
        };

        let first = compile(&registry, &build()).unwrap();
        let second = compile(&registry, &build()).unwrap();

        prop_assert_eq!(&first.record, &second.record);
        prop_assert_eq!(&first.document, &second.document);
        prop_assert_eq!(&first.subscriptions, &second.subscriptions);
    }

    /// Identity properties lead every compiled entry exactly once,
    /// regardless of how often the selection repeats fields.
    #[test]
    fn identity_properties_lead_and_never_duplicate(
        indices in prop::collection::vec(0usize..4, 1..16)
    ) {
        let registry = registry();
        let defs = QueryDefinitions::new().query(
            "todos",
            QueryDefinition::new(registry.get("todo").unwrap())
                .select(selection_from(&indices, false)),
        );
        let compiled = compile(&registry, &defs).unwrap();
        let entry = compiled.record.get("todos").unwrap();

        prop_assert_eq!(
            &entry.properties[..4],
            &["id".to_string(), "version".to_string(), "lastUpdatedBy".to_string(), "type".to_string()][..]
        );
        for property in &entry.properties {
            let count = entry.properties.iter().filter(|p| p == &property).count();
            prop_assert_eq!(count, 1, "property {} appears {} times", property, count);
        }
    }
}
