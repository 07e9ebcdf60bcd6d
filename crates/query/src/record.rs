//! Compiled query records: the normalized internal form of a query.

use plexus_core::schema::{Cardinality, NodeTypeDef};
use std::rc::Rc;

use crate::definition::Target;

/// One compiled query entry: node type, target, requested properties and
/// relational sub-records.
#[derive(Clone, Debug)]
pub struct QueryRecordEntry {
    /// Node type definition this entry reads.
    pub def: Rc<NodeTypeDef>,
    /// Target selector. Relational entries carry `Target::AllOfType`.
    pub target: Target,
    /// Ordered set of requested property paths, flattened, identity
    /// properties first.
    pub properties: Vec<String>,
    /// Relational sub-records by alias. Union relations appear as one
    /// sibling per member type under a suffixed alias.
    pub relational: Vec<(String, RelationalEntry)>,
    /// Filter payload forwarded to the wire document.
    pub filter: Option<serde_json::Value>,
    /// Sort payload forwarded to the wire document.
    pub sort: Option<serde_json::Value>,
}

impl QueryRecordEntry {
    /// Gets a relational sub-record by alias.
    pub fn relational_entry(&self, alias: &str) -> Option<&RelationalEntry> {
        self.relational
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, entry)| entry)
    }

    /// Returns true if the given property path was requested.
    pub fn has_property(&self, path: &str) -> bool {
        self.properties.iter().any(|p| p == path)
    }
}

impl PartialEq for QueryRecordEntry {
    fn eq(&self, other: &Self) -> bool {
        // Node defs compare by type name; they are registry-shared handles.
        self.def.type_name() == other.def.type_name()
            && self.target == other.target
            && self.properties == other.properties
            && self.relational == other.relational
            && self.filter == other.filter
            && self.sort == other.sort
    }
}

/// A relational sub-record with its one/many cardinality tag.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationalEntry {
    /// Governs the result shape: scalar proxy or proxy list.
    pub cardinality: Cardinality,
    /// The compiled entry for the related nodes.
    pub entry: QueryRecordEntry,
}

/// The compiled, normalized form of a query definition tree.
///
/// Aliases keep their definition order; a null-compiled alias holds `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryRecord {
    entries: Vec<(String, Option<QueryRecordEntry>)>,
}

impl QueryRecord {
    pub(crate) fn new(entries: Vec<(String, Option<QueryRecordEntry>)>) -> Self {
        Self { entries }
    }

    /// Returns all aliases with their compiled entries, in order.
    #[inline]
    pub fn entries(&self) -> &[(String, Option<QueryRecordEntry>)] {
        &self.entries
    }

    /// Gets a live entry by alias. Returns `None` for unknown and for
    /// null-compiled aliases.
    pub fn get(&self, alias: &str) -> Option<&QueryRecordEntry> {
        self.entries
            .iter()
            .find(|(name, _)| name == alias)
            .and_then(|(_, entry)| entry.as_ref())
    }

    /// Returns true if at least one alias compiled to a live entry.
    pub fn has_live_entries(&self) -> bool {
        self.entries.iter().any(|(_, entry)| entry.is_some())
    }
}

/// Per-alias subscription descriptor for the push channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionDescriptor {
    /// The alias messages will be tagged with.
    pub alias: String,
    /// The node type the subscription covers.
    pub node_type: String,
    /// Ready wire document for the subscription.
    pub document: String,
}

/// Full output of the compiler: the normalized record, a ready wire
/// document, and per-alias subscription descriptors.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledQuery {
    pub record: QueryRecord,
    pub document: String,
    pub subscriptions: Vec<SubscriptionDescriptor>,
}
