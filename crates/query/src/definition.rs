//! Query definitions: the caller-facing description of what to fetch.

use plexus_core::schema::NodeTypeDef;
use std::rc::Rc;

use crate::selection::Selection;

/// Target selector for a query alias.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Every node of the type (and relational sub-results, which carry no
    /// explicit target).
    AllOfType,
    /// A single node by id; compiles to a single-result alias.
    ById(String),
    /// A set of nodes by id.
    ByIds(Vec<String>),
    /// Nodes living under the given ancestor ids.
    UnderIds(Vec<String>),
}

impl Target {
    /// Returns true if this target yields at most one result.
    #[inline]
    pub fn is_single(&self) -> bool {
        matches!(self, Target::ById(_))
    }
}

/// One alias's query definition.
#[derive(Clone, Debug)]
pub struct QueryDefinition {
    def: Rc<NodeTypeDef>,
    selection: Option<Selection>,
    target: Target,
    filter: Option<serde_json::Value>,
    sort: Option<serde_json::Value>,
}

impl QueryDefinition {
    /// Creates a definition querying every node of a type with every
    /// declared field and no relations.
    pub fn new(def: Rc<NodeTypeDef>) -> Self {
        Self {
            def,
            selection: None,
            target: Target::AllOfType,
            filter: None,
            sort: None,
        }
    }

    /// Sets the projection. Without one, all declared scalar and object
    /// fields are requested and no relations.
    pub fn select(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Sets the target selector.
    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Targets a single node by id.
    pub fn by_id(self, id: impl Into<String>) -> Self {
        self.target(Target::ById(id.into()))
    }

    /// Targets a set of nodes by id.
    pub fn by_ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target(Target::ByIds(ids.into_iter().map(Into::into).collect()))
    }

    /// Targets nodes under the given ancestor ids.
    pub fn under_ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target(Target::UnderIds(ids.into_iter().map(Into::into).collect()))
    }

    /// Attaches a filter payload, forwarded verbatim to the wire document.
    pub fn filter(mut self, filter: serde_json::Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Attaches a sort payload, forwarded verbatim to the wire document.
    pub fn sort(mut self, sort: serde_json::Value) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Returns the node type definition.
    #[inline]
    pub fn def(&self) -> &Rc<NodeTypeDef> {
        &self.def
    }

    /// Returns the projection, if any.
    #[inline]
    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Returns the target selector.
    #[inline]
    pub fn target_selector(&self) -> &Target {
        &self.target
    }

    /// Returns the filter payload, if any.
    #[inline]
    pub fn filter_payload(&self) -> Option<&serde_json::Value> {
        self.filter.as_ref()
    }

    /// Returns the sort payload, if any.
    #[inline]
    pub fn sort_payload(&self) -> Option<&serde_json::Value> {
        self.sort.as_ref()
    }
}

/// An ordered set of aliased query definitions.
///
/// A `null_query` alias compiles to no entry; its result is reported as
/// null with no round trip.
#[derive(Clone, Debug, Default)]
pub struct QueryDefinitions {
    entries: Vec<(String, Option<QueryDefinition>)>,
}

impl QueryDefinitions {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an aliased query.
    pub fn query(mut self, alias: impl Into<String>, definition: QueryDefinition) -> Self {
        self.entries.push((alias.into(), Some(definition)));
        self
    }

    /// Adds a null alias: no entry is compiled and the result is null.
    pub fn null_query(mut self, alias: impl Into<String>) -> Self {
        self.entries.push((alias.into(), None));
        self
    }

    /// Returns the entries in insertion order.
    #[inline]
    pub fn entries(&self) -> &[(String, Option<QueryDefinition>)] {
        &self.entries
    }
}
