//! Read-guarded result proxies.
//!
//! A `Proxy` wraps exactly one data object plus the frozen set of
//! properties its originating query requested. Reading a declared property
//! outside that set is a `NotUpToDate` error naming the property and the
//! query; this deliberately blocks silent reliance on cached-but-
//! unsubscribed data. One data object may back many simultaneously live
//! proxies across different queries, each independently scoped.

use hashbrown::HashMap;
use plexus_cache::DataObject;
use plexus_core::schema::{FieldSpec, FieldType, NodeTypeDef};
use plexus_core::{
    is_identity_property, join_path, Error, Result, Value, PATH_SEPARATOR, PROP_ID,
    PROP_LAST_UPDATED_BY, PROP_TYPE, PROP_VERSION,
};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// The resolved nodes of one relation alias, shaped by cardinality.
#[derive(Clone, Debug)]
pub enum RelationalResult {
    /// To-one relation: the proxy, or `None` when unresolved.
    One(Option<Rc<Proxy>>),
    /// To-many relation: proxies in result order.
    Many(Vec<Rc<Proxy>>),
}

impl RelationalResult {
    /// Returns the contained ids, for diffing and display.
    pub fn ids(&self) -> Vec<String> {
        match self {
            RelationalResult::One(Some(proxy)) => vec![proxy.id()],
            RelationalResult::One(None) => Vec::new(),
            RelationalResult::Many(proxies) => proxies.iter().map(|p| p.id()).collect(),
        }
    }
}

/// A per-query read-guarded view over one data object.
#[derive(Debug)]
pub struct Proxy {
    def: Rc<NodeTypeDef>,
    dobj: Rc<RefCell<DataObject>>,
    allowed: Rc<Vec<String>>,
    query_name: String,
    relational: RefCell<HashMap<String, RelationalResult>>,
    revision: Cell<u64>,
}

impl Proxy {
    /// Builds a proxy scoped to the given requested property paths.
    ///
    /// The data object is held by reference, never copied; `relational`
    /// carries the initial relation results keyed by base alias.
    pub(crate) fn new(
        def: Rc<NodeTypeDef>,
        dobj: Rc<RefCell<DataObject>>,
        allowed: Vec<String>,
        query_name: impl Into<String>,
        relational: HashMap<String, RelationalResult>,
    ) -> Self {
        Self {
            def,
            dobj,
            allowed: Rc::new(allowed),
            query_name: query_name.into(),
            relational: RefCell::new(relational),
            revision: Cell::new(0),
        }
    }

    /// Returns the node id.
    pub fn id(&self) -> String {
        self.dobj.borrow().id().to_string()
    }

    /// Returns the node version.
    pub fn version(&self) -> i64 {
        self.dobj.borrow().version()
    }

    /// Returns the last editor, if known.
    pub fn last_updated_by(&self) -> Option<String> {
        self.dobj.borrow().last_updated_by().map(str::to_string)
    }

    /// Returns the node type name.
    pub fn type_name(&self) -> &str {
        self.def.type_name()
    }

    /// Returns the originating query's name, as used in read-guard errors.
    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    /// Reads a property by name or flattened path.
    ///
    /// Identity properties always succeed. Declared fields succeed only
    /// when requested; computed properties check every declared dependency
    /// and wrap a missing one as `NotUpToDateDependency`. Object fields
    /// return their parsed value pruned to the requested leaves.
    pub fn get(&self, property: &str) -> Result<Value> {
        if is_identity_property(property) {
            return Ok(self.identity_value(property));
        }

        let (root, _) = plexus_core::split_path(property);
        if let Some(spec) = self.def.field(root) {
            return self.get_field(spec, property);
        }
        if let Some(computed) = self.def.computed_spec(property) {
            for dependency in computed.dependencies() {
                if !self.is_up_to_date(dependency) {
                    return Err(Error::not_up_to_date_dependency(
                        property,
                        dependency,
                        &self.query_name,
                    ));
                }
            }
            return Ok(computed.evaluate(self.dobj.borrow().parsed()));
        }
        if self.def.relation(property).is_some() {
            return Err(Error::invalid_query(format!(
                "Relation {} is read via relational_result",
                property
            )));
        }
        Err(Error::invalid_query(format!(
            "Unknown property {} on {}",
            property,
            self.def.type_name()
        )))
    }

    /// Returns a guarded view over an object-typed field.
    pub fn object(&self, field: &str) -> Result<ObjectView> {
        let Some(spec) = self.def.field(field) else {
            return Err(Error::invalid_query(format!(
                "Unknown property {} on {}",
                field,
                self.def.type_name()
            )));
        };
        let FieldType::Object(specs) = spec.field_type() else {
            return Err(Error::invalid_query(format!(
                "Property {} on {} is not an object field",
                field,
                self.def.type_name()
            )));
        };
        if !self.subtree_requested(field) {
            return Err(Error::not_up_to_date(field, &self.query_name));
        }
        Ok(ObjectView {
            dobj: self.dobj.clone(),
            specs: specs.clone(),
            prefix: field.to_string(),
            allowed: self.allowed.clone(),
            query_name: self.query_name.clone(),
        })
    }

    /// Reads a relation's resolved nodes.
    ///
    /// A declared relation the query did not request is `NotUpToDate`.
    pub fn relational_result(&self, alias: &str) -> Result<RelationalResult> {
        if let Some(result) = self.relational.borrow().get(alias) {
            return Ok(result.clone());
        }
        if self.def.relation(alias).is_some() {
            return Err(Error::not_up_to_date(alias, &self.query_name));
        }
        Err(Error::invalid_query(format!(
            "Unknown relation {} on {}",
            alias,
            self.def.type_name()
        )))
    }

    /// Enumerates every property readable right now: identity properties,
    /// requested paths, computed properties whose dependencies are all up
    /// to date, and resolved relation aliases. Drives iteration and
    /// serialization for callers walking keys.
    pub fn up_to_date_properties(&self) -> Vec<String> {
        let mut properties: Vec<String> = Vec::new();
        for identity in plexus_core::IDENTITY_PROPERTIES {
            properties.push(identity.to_string());
        }
        for path in self.allowed.iter() {
            if !is_identity_property(path) {
                properties.push(path.clone());
            }
        }
        for computed in self.def.computed() {
            if computed
                .dependencies()
                .iter()
                .all(|dependency| self.is_up_to_date(dependency))
            {
                properties.push(computed.name().to_string());
            }
        }
        for alias in self.relational.borrow().keys() {
            properties.push(alias.clone());
        }
        properties
    }

    /// Counter bumped on every relational update; lets callers detect
    /// relation-view changes without diffing.
    #[inline]
    pub fn relational_revision(&self) -> u64 {
        self.revision.get()
    }

    /// The single post-construction mutation point: replaces the entries
    /// for the given aliases with recomputed results.
    pub(crate) fn update_relational_results(&self, results: HashMap<String, RelationalResult>) {
        let mut relational = self.relational.borrow_mut();
        for (alias, result) in results {
            relational.insert(alias, result);
        }
        self.revision.set(self.revision.get() + 1);
    }

    fn identity_value(&self, property: &str) -> Value {
        let dobj = self.dobj.borrow();
        match property {
            PROP_ID => Value::String(dobj.id().to_string()),
            PROP_VERSION => Value::Number(dobj.version() as f64),
            PROP_LAST_UPDATED_BY => dobj
                .last_updated_by()
                .map(|editor| Value::String(editor.to_string()))
                .unwrap_or(Value::Null),
            PROP_TYPE => Value::String(self.def.type_name().to_string()),
            _ => Value::Null,
        }
    }

    fn get_field(&self, spec: &FieldSpec, path: &str) -> Result<Value> {
        if let FieldType::Object(specs) = spec.field_type() {
            if path == spec.name() {
                if !self.subtree_requested(path) {
                    return Err(Error::not_up_to_date(path, &self.query_name));
                }
                let parsed = self
                    .dobj
                    .borrow()
                    .parsed_at_path(path)
                    .unwrap_or(Value::Null);
                return Ok(prune_object(&parsed, specs, path, &self.allowed));
            }
        }
        if !self.is_up_to_date(path) {
            return Err(Error::not_up_to_date(path, &self.query_name));
        }
        Ok(self
            .dobj
            .borrow()
            .parsed_at_path(path)
            .unwrap_or(Value::Null))
    }

    /// A path is up to date when it was requested exactly, or when it
    /// names an object root with at least one requested leaf.
    fn is_up_to_date(&self, path: &str) -> bool {
        path_requested(&self.allowed, path)
    }

    fn subtree_requested(&self, root: &str) -> bool {
        let prefix = format!("{}{}", root, PATH_SEPARATOR);
        self.allowed.iter().any(|p| p.starts_with(&prefix))
    }
}

fn path_requested(allowed: &[String], path: &str) -> bool {
    if allowed.iter().any(|p| p == path) {
        return true;
    }
    let prefix = format!("{}{}", path, PATH_SEPARATOR);
    allowed.iter().any(|p| p.starts_with(&prefix))
}

/// Drops unrequested leaves from a parsed object value.
fn prune_object(parsed: &Value, specs: &[FieldSpec], prefix: &str, allowed: &[String]) -> Value {
    let Value::Object(entries) = parsed else {
        return parsed.clone();
    };
    let mut pruned = BTreeMap::new();
    for spec in specs {
        let path = join_path(prefix, spec.name());
        match spec.field_type() {
            FieldType::Object(nested) => {
                let requested = allowed
                    .iter()
                    .any(|p| p.starts_with(&format!("{}{}", path, PATH_SEPARATOR)));
                if requested {
                    if let Some(value) = entries.get(spec.name()) {
                        pruned.insert(
                            spec.name().to_string(),
                            prune_object(value, nested, &path, allowed),
                        );
                    }
                }
            }
            _ => {
                if allowed.iter().any(|p| p == &path) {
                    if let Some(value) = entries.get(spec.name()) {
                        pruned.insert(spec.name().to_string(), value.clone());
                    }
                }
            }
        }
    }
    Value::Object(pruned)
}

/// A nested guarded view over an object-typed field, enforcing the same
/// flattened-path allow-list recursively.
#[derive(Debug)]
pub struct ObjectView {
    dobj: Rc<RefCell<DataObject>>,
    specs: Vec<FieldSpec>,
    prefix: String,
    allowed: Rc<Vec<String>>,
    query_name: String,
}

impl ObjectView {
    /// Reads a leaf or nested object under this view.
    pub fn get(&self, name: &str) -> Result<Value> {
        let Some(spec) = self.specs.iter().find(|s| s.name() == name) else {
            return Err(Error::invalid_query(format!(
                "Unknown nested property {} under {}",
                name, self.prefix
            )));
        };
        let path = join_path(&self.prefix, name);
        if !path_requested(&self.allowed, &path) {
            return Err(Error::not_up_to_date(&path, &self.query_name));
        }
        if let FieldType::Object(nested) = spec.field_type() {
            let parsed = self
                .dobj
                .borrow()
                .parsed_at_path(&path)
                .unwrap_or(Value::Null);
            return Ok(prune_object(&parsed, nested, &path, &self.allowed));
        }
        Ok(self
            .dobj
            .borrow()
            .parsed_at_path(&path)
            .unwrap_or(Value::Null))
    }

    /// Descends into a nested object field.
    pub fn object(&self, name: &str) -> Result<ObjectView> {
        let Some(spec) = self.specs.iter().find(|s| s.name() == name) else {
            return Err(Error::invalid_query(format!(
                "Unknown nested property {} under {}",
                name, self.prefix
            )));
        };
        let FieldType::Object(nested) = spec.field_type() else {
            return Err(Error::invalid_query(format!(
                "Nested property {} under {} is not an object field",
                name, self.prefix
            )));
        };
        let path = join_path(&self.prefix, name);
        if !path_requested(&self.allowed, &path) {
            return Err(Error::not_up_to_date(&path, &self.query_name));
        }
        Ok(ObjectView {
            dobj: self.dobj.clone(),
            specs: nested.clone(),
            prefix: path,
            allowed: self.allowed.clone(),
            query_name: self.query_name.clone(),
        })
    }

    /// Enumerates the readable leaf and object names at this level.
    pub fn up_to_date_properties(&self) -> Vec<String> {
        self.specs
            .iter()
            .filter(|spec| path_requested(&self.allowed, &join_path(&self.prefix, spec.name())))
            .map(|spec| spec.name().to_string())
            .collect()
    }
}
