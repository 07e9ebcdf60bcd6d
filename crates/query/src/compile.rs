//! The query record compiler.
//!
//! A pure function from query definitions to the normalized `QueryRecord`
//! tree, a ready wire document, and per-alias subscription descriptors.
//! Compilation is deterministic: identical definitions yield structurally
//! identical records and byte-identical documents.

use plexus_core::schema::{FieldSpec, FieldType, NodeTypeDef, RelationTarget, TypeRegistry};
use plexus_core::{join_path, Error, Result, IDENTITY_PROPERTIES, UNION_ALIAS_SEPARATOR};
use std::rc::Rc;

use crate::definition::{QueryDefinition, QueryDefinitions, Target};
use crate::record::{
    CompiledQuery, QueryRecord, QueryRecordEntry, RelationalEntry, SubscriptionDescriptor,
};
use crate::selection::{Selection, SelectionItem};

/// Compiles query definitions into a record, wire document, and
/// subscription descriptors.
pub fn compile(registry: &TypeRegistry, definitions: &QueryDefinitions) -> Result<CompiledQuery> {
    let mut seen = Vec::new();
    for (alias, _) in definitions.entries() {
        if seen.contains(&alias.as_str()) {
            return Err(Error::invalid_query(format!("Duplicate alias: {}", alias)));
        }
        seen.push(alias.as_str());
    }

    let mut entries = Vec::with_capacity(definitions.entries().len());
    for (alias, definition) in definitions.entries() {
        let compiled = match definition {
            None => None,
            Some(qd) => Some(compile_entry(registry, qd)?),
        };
        entries.push((alias.clone(), compiled));
    }
    let record = QueryRecord::new(entries);

    let document = render_document("query", &record);
    let subscriptions = record
        .entries()
        .iter()
        .filter_map(|(alias, entry)| {
            entry.as_ref().map(|e| SubscriptionDescriptor {
                alias: alias.clone(),
                node_type: e.def.type_name().to_string(),
                document: render_single("subscription", alias, e),
            })
        })
        .collect();

    Ok(CompiledQuery {
        record,
        document,
        subscriptions,
    })
}

fn compile_entry(registry: &TypeRegistry, qd: &QueryDefinition) -> Result<QueryRecordEntry> {
    let (properties, relational) = match qd.selection() {
        None => (default_properties(qd.def()), Vec::new()),
        Some(selection) => compile_selection(registry, qd.def(), selection, false)?,
    };
    Ok(QueryRecordEntry {
        def: qd.def().clone(),
        target: qd.target_selector().clone(),
        properties,
        relational,
        filter: qd.filter_payload().cloned(),
        sort: qd.sort_payload().cloned(),
    })
}

/// Identity properties first, then every declared leaf path.
fn default_properties(def: &NodeTypeDef) -> Vec<String> {
    let mut properties: Vec<String> = IDENTITY_PROPERTIES.iter().map(|p| p.to_string()).collect();
    for path in def.declared_property_paths() {
        push_unique(&mut properties, path);
    }
    properties
}

/// Walks a selection against a node type definition.
///
/// `lenient` is set when compiling a union member: selection items not
/// declared on that member are skipped instead of rejected, so one
/// selection can serve every member of the union.
fn compile_selection(
    registry: &TypeRegistry,
    def: &Rc<NodeTypeDef>,
    selection: &Selection,
    lenient: bool,
) -> Result<(Vec<String>, Vec<(String, RelationalEntry)>)> {
    if selection.is_empty() {
        return Ok((default_properties(def), Vec::new()));
    }

    let mut properties: Vec<String> =
        IDENTITY_PROPERTIES.iter().map(|p| p.to_string()).collect();
    let mut relational: Vec<(String, RelationalEntry)> = Vec::new();

    for item in selection.items() {
        match item {
            SelectionItem::Field(name) => {
                if let Some(spec) = def.field(name) {
                    push_field_paths(name, spec.field_type(), &mut properties);
                } else if def.computed_spec(name).is_some() {
                    // Computed properties are derived client-side; nothing
                    // goes on the wire and dependencies are not implied.
                } else if def.relation(name).is_some() {
                    return Err(Error::invalid_query(format!(
                        "Relation {} requires a nested selection",
                        name
                    )));
                } else if !lenient {
                    return Err(Error::invalid_query(format!(
                        "Unknown property {} on {}",
                        name,
                        def.type_name()
                    )));
                }
            }
            SelectionItem::Object { name, nested } => {
                let Some(spec) = def.field(name) else {
                    if lenient {
                        continue;
                    }
                    return Err(Error::invalid_query(format!(
                        "Unknown property {} on {}",
                        name,
                        def.type_name()
                    )));
                };
                let FieldType::Object(nested_specs) = spec.field_type() else {
                    return Err(Error::invalid_query(format!(
                        "Property {} on {} is not an object field",
                        name,
                        def.type_name()
                    )));
                };
                compile_object_selection(name, nested_specs, nested, &mut properties)?;
            }
            SelectionItem::Relation { alias, nested } => {
                let Some(spec) = def.relation(alias) else {
                    if lenient {
                        continue;
                    }
                    return Err(Error::invalid_query(format!(
                        "Unknown relation {} on {}",
                        alias,
                        def.type_name()
                    )));
                };
                if relational.iter().any(|(name, _)| {
                    name == alias
                        || name
                            .split(UNION_ALIAS_SEPARATOR)
                            .next()
                            .is_some_and(|base| base == alias)
                }) {
                    return Err(Error::invalid_query(format!(
                        "Duplicate relation alias: {}",
                        alias
                    )));
                }
                match spec.target() {
                    RelationTarget::Single(type_name) => {
                        let child = registry.require(type_name)?;
                        let (p, r) = compile_selection(registry, &child, nested, false)?;
                        relational.push((
                            alias.clone(),
                            RelationalEntry {
                                cardinality: spec.cardinality(),
                                entry: relational_record_entry(child, p, r),
                            },
                        ));
                    }
                    RelationTarget::Union(members) => {
                        // One sibling entry per member, tagged with the
                        // reserved suffix so results can be matched back.
                        for member in members {
                            let child = registry.require(member)?;
                            let (p, r) = compile_selection(registry, &child, nested, true)?;
                            let member_alias =
                                format!("{}{}{}", alias, UNION_ALIAS_SEPARATOR, member);
                            relational.push((
                                member_alias,
                                RelationalEntry {
                                    cardinality: spec.cardinality(),
                                    entry: relational_record_entry(child, p, r),
                                },
                            ));
                        }
                    }
                }
            }
        }
    }

    Ok((properties, relational))
}

fn relational_record_entry(
    def: Rc<NodeTypeDef>,
    properties: Vec<String>,
    relational: Vec<(String, RelationalEntry)>,
) -> QueryRecordEntry {
    QueryRecordEntry {
        def,
        target: Target::AllOfType,
        properties,
        relational,
        filter: None,
        sort: None,
    }
}

fn compile_object_selection(
    root: &str,
    specs: &[FieldSpec],
    selection: &Selection,
    properties: &mut Vec<String>,
) -> Result<()> {
    if selection.is_empty() {
        for spec in specs {
            push_field_paths(&join_path(root, spec.name()), spec.field_type(), properties);
        }
        return Ok(());
    }
    for item in selection.items() {
        match item {
            SelectionItem::Field(name) => {
                let Some(spec) = specs.iter().find(|s| s.name() == name.as_str()) else {
                    return Err(Error::invalid_query(format!(
                        "Unknown nested property {} under {}",
                        name, root
                    )));
                };
                push_field_paths(&join_path(root, name), spec.field_type(), properties);
            }
            SelectionItem::Object { name, nested } => {
                let Some(spec) = specs.iter().find(|s| s.name() == name.as_str()) else {
                    return Err(Error::invalid_query(format!(
                        "Unknown nested property {} under {}",
                        name, root
                    )));
                };
                let FieldType::Object(nested_specs) = spec.field_type() else {
                    return Err(Error::invalid_query(format!(
                        "Nested property {} under {} is not an object field",
                        name, root
                    )));
                };
                compile_object_selection(&join_path(root, name), nested_specs, nested, properties)?;
            }
            SelectionItem::Relation { alias, .. } => {
                return Err(Error::invalid_query(format!(
                    "Relation {} cannot be nested inside object field {}",
                    alias, root
                )));
            }
        }
    }
    Ok(())
}

/// Expands a field into its flattened leaf paths (a single path for
/// non-object fields).
fn push_field_paths(path: &str, field_type: &FieldType, properties: &mut Vec<String>) {
    match field_type {
        FieldType::Object(specs) => {
            for spec in specs {
                push_field_paths(&join_path(path, spec.name()), spec.field_type(), properties);
            }
        }
        _ => push_unique(properties, path.to_string()),
    }
}

fn push_unique(properties: &mut Vec<String>, path: String) {
    if !properties.contains(&path) {
        properties.push(path);
    }
}

// ---- document rendering ----

fn render_document(operation: &str, record: &QueryRecord) -> String {
    if !record.has_live_entries() {
        return String::new();
    }
    let mut out = String::new();
    out.push_str(operation);
    out.push_str(" {\n");
    for (alias, entry) in record.entries() {
        if let Some(entry) = entry {
            render_entry(&mut out, alias, entry, 1, true);
        }
    }
    out.push_str("}\n");
    out
}

fn render_single(operation: &str, alias: &str, entry: &QueryRecordEntry) -> String {
    let mut out = String::new();
    out.push_str(operation);
    out.push_str(" {\n");
    render_entry(&mut out, alias, entry, 1, true);
    out.push_str("}\n");
    out
}

fn render_entry(out: &mut String, alias: &str, entry: &QueryRecordEntry, depth: usize, root: bool) {
    let indent = "  ".repeat(depth);
    if root {
        out.push_str(&format!(
            "{}{}: nodes({}) {{\n",
            indent,
            alias,
            render_args(entry)
        ));
    } else {
        out.push_str(&format!(
            "{}{}: related(type: {}) {{\n",
            indent,
            alias,
            quote(entry.def.type_name())
        ));
    }
    let inner = "  ".repeat(depth + 1);
    for property in &entry.properties {
        out.push_str(&inner);
        out.push_str(property);
        out.push('\n');
    }
    for (rel_alias, rel) in &entry.relational {
        render_entry(out, rel_alias, &rel.entry, depth + 1, false);
    }
    out.push_str(&indent);
    out.push_str("}\n");
}

fn render_args(entry: &QueryRecordEntry) -> String {
    let mut args = vec![format!("type: {}", quote(entry.def.type_name()))];
    match &entry.target {
        Target::AllOfType => {}
        Target::ById(id) => args.push(format!("id: {}", quote(id))),
        Target::ByIds(ids) => args.push(format!("ids: {}", quote_list(ids))),
        Target::UnderIds(ids) => args.push(format!("underIds: {}", quote_list(ids))),
    }
    if let Some(filter) = &entry.filter {
        args.push(format!("filter: {}", filter));
    }
    if let Some(sort) = &entry.sort {
        args.push(format!("sort: {}", sort));
    }
    args.join(", ")
}

fn quote(raw: &str) -> String {
    serde_json::Value::String(raw.to_string()).to_string()
}

fn quote_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| quote(i)).collect();
    format!("[{}]", quoted.join(", "))
}
