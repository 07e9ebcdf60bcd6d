//! Selections: the projection manifest of a query definition.
//!
//! A `Selection` plays the role a projection function plays in dynamic
//! clients: an explicit list of requested fields, nested object fields, and
//! relations, which the compiler walks against the node type definition.
//! Names are classified at compile time — a declared field is a field
//! request, a computed property compiles to no wire property, and anything
//! else must name a declared relation.

/// One requested item in a selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionItem {
    /// A declared field or computed property. Selecting an object-typed
    /// field by name requests all of its nested leaves.
    Field(String),
    /// A nested projection into an object-typed field.
    Object {
        name: String,
        nested: Selection,
    },
    /// A relation request. An empty nested selection requests all of the
    /// target's declared fields and no further relations.
    Relation {
        alias: String,
        nested: Selection,
    },
}

/// The ordered set of requested items for one query entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    items: Vec<SelectionItem>,
}

impl Selection {
    /// Creates an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a declared field or computed property.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.items.push(SelectionItem::Field(name.into()));
        self
    }

    /// Requests several fields at once.
    pub fn fields(mut self, names: &[&str]) -> Self {
        for name in names {
            self.items.push(SelectionItem::Field(name.to_string()));
        }
        self
    }

    /// Requests a nested projection into an object-typed field.
    pub fn object(mut self, name: impl Into<String>, nested: Selection) -> Self {
        self.items.push(SelectionItem::Object {
            name: name.into(),
            nested,
        });
        self
    }

    /// Requests a relation under its alias.
    pub fn relation(mut self, alias: impl Into<String>, nested: Selection) -> Self {
        self.items.push(SelectionItem::Relation {
            alias: alias.into(),
            nested,
        });
        self
    }

    /// Returns the requested items in insertion order.
    #[inline]
    pub fn items(&self) -> &[SelectionItem] {
        &self.items
    }

    /// Returns true if nothing was requested.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_builder() {
        let sel = Selection::new()
            .fields(&["task", "done"])
            .object("meta", Selection::new().field("priority"))
            .relation("assignee", Selection::new().field("name"));

        assert_eq!(sel.items().len(), 4);
        assert_eq!(sel.items()[0], SelectionItem::Field("task".into()));
        match &sel.items()[3] {
            SelectionItem::Relation { alias, nested } => {
                assert_eq!(alias, "assignee");
                assert_eq!(nested.items().len(), 1);
            }
            other => panic!("expected relation, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_selection() {
        assert!(Selection::new().is_empty());
        assert!(!Selection::new().field("a").is_empty());
    }
}
