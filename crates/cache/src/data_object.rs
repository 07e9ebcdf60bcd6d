//! The per-node versioned cache entity.
//!
//! One `DataObject` exists per (node type, id). It holds the persisted
//! field values keyed by flattened path and a derived parsed view keyed by
//! root field, recomputed on every accepted write so that every declared
//! field (and nested leaf) always has a value.

use hashbrown::HashMap;
use plexus_core::schema::{FieldSpec, FieldType, NodeTypeDef};
use plexus_core::{join_path, split_path, Result, Value, PATH_SEPARATOR};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, warn};

/// Version of a data object that has never received a write.
pub const UNSET_VERSION: i64 = -1;

/// Snapshot of a data object's persisted state, captured before an
/// optimistic write and restored on rollback.
#[derive(Clone, Debug, PartialEq)]
pub struct DataSnapshot {
    pub version: i64,
    pub last_updated_by: Option<String>,
    pub persisted: HashMap<String, Value>,
}

/// The single in-memory cache entry for one node.
#[derive(Debug)]
pub struct DataObject {
    def: Rc<NodeTypeDef>,
    id: String,
    version: i64,
    last_updated_by: Option<String>,
    /// Parsed values keyed by flattened path. Object fields store one entry
    /// per leaf; an explicit null object is a single `Null` at its root.
    persisted: HashMap<String, Value>,
    /// Persisted data overlaid with typed defaults, keyed by root field.
    parsed: HashMap<String, Value>,
}

impl DataObject {
    /// Creates an unset data object. The parsed view starts fully
    /// defaulted; `version` is [`UNSET_VERSION`] until the first write.
    pub fn new(def: Rc<NodeTypeDef>, id: impl Into<String>) -> Self {
        let mut dobj = Self {
            def,
            id: id.into(),
            version: UNSET_VERSION,
            last_updated_by: None,
            persisted: HashMap::new(),
            parsed: HashMap::new(),
        };
        dobj.recompute_parsed();
        dobj
    }

    /// Returns the node type definition.
    #[inline]
    pub fn def(&self) -> &Rc<NodeTypeDef> {
        &self.def
    }

    /// Returns the node id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the current version, [`UNSET_VERSION`] before the first write.
    #[inline]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns the last editor, if known.
    #[inline]
    pub fn last_updated_by(&self) -> Option<&str> {
        self.last_updated_by.as_deref()
    }

    /// Returns the parsed view, keyed by root field name.
    #[inline]
    pub fn parsed(&self) -> &HashMap<String, Value> {
        &self.parsed
    }

    /// Looks up a parsed value by flattened path.
    ///
    /// Every declared leaf resolves to `Some`; unknown paths to `None`.
    pub fn parsed_at_path(&self, path: &str) -> Option<Value> {
        let (root, rest) = split_path(path);
        let mut current = self.parsed.get(root)?.clone();
        let mut remainder = rest;
        while let Some(path) = remainder {
            let (segment, rest) = split_path(path);
            current = match current {
                Value::Object(map) => map.get(segment)?.clone(),
                // A null optional object still resolves its declared leaves
                Value::Null => return Some(Value::Null),
                _ => return None,
            };
            remainder = rest;
        }
        Some(current)
    }

    /// Applies an incoming snapshot.
    ///
    /// Writes older than the current version are accepted no-ops unless
    /// `ignore_version` is set; that bypass is reserved for optimistic
    /// application and rollback. Fields that fail to parse log a warning
    /// and substitute their typed default, leaving sibling fields intact.
    pub fn on_data_received(
        &mut self,
        version: i64,
        last_updated_by: Option<&str>,
        data: &HashMap<String, Value>,
        ignore_version: bool,
    ) -> Result<()> {
        if !ignore_version && version < self.version {
            debug!(
                node_type = self.def.type_name(),
                id = %self.id,
                incoming = version,
                current = self.version,
                "stale write ignored"
            );
            return Ok(());
        }
        self.version = version;
        if let Some(editor) = last_updated_by {
            self.last_updated_by = Some(editor.to_string());
        }

        let def = self.def.clone();
        for (key, value) in data {
            match def.field(key) {
                Some(spec) => self.merge_field(spec, key, value),
                None => {
                    debug!(
                        node_type = def.type_name(),
                        id = %self.id,
                        field = %key,
                        "unknown field skipped"
                    );
                }
            }
        }

        self.recompute_parsed();
        Ok(())
    }

    /// Captures the persisted state for rollback.
    pub fn snapshot(&self) -> DataSnapshot {
        DataSnapshot {
            version: self.version,
            last_updated_by: self.last_updated_by.clone(),
            persisted: self.persisted.clone(),
        }
    }

    /// Restores a snapshot wholesale, bypassing the version gate. This is
    /// the rollback path; the parsed view is recomputed.
    pub fn restore(&mut self, snapshot: DataSnapshot) {
        self.version = snapshot.version;
        self.last_updated_by = snapshot.last_updated_by;
        self.persisted = snapshot.persisted;
        self.recompute_parsed();
    }

    fn merge_field(&mut self, spec: &FieldSpec, path: &str, value: &Value) {
        match spec.field_type() {
            FieldType::Object(nested_specs) => match value {
                Value::Null => {
                    self.clear_subtree(path);
                    self.persisted.insert(path.to_string(), Value::Null);
                }
                Value::Object(map) => {
                    // A previous explicit null no longer applies
                    self.persisted.remove(path);
                    for nested in nested_specs {
                        if let Some(v) = map.get(nested.name()) {
                            self.merge_field(nested, &join_path(path, nested.name()), v);
                        }
                    }
                }
                other => {
                    warn!(
                        field = %path,
                        got = ?other,
                        "object field received non-object; clearing"
                    );
                    self.clear_subtree(path);
                    self.persisted.insert(path.to_string(), Value::Null);
                }
            },
            leaf_type => match leaf_type.parse(value) {
                Ok(parsed) => {
                    self.persisted.insert(path.to_string(), parsed);
                }
                Err(message) => {
                    warn!(
                        field = %path,
                        %message,
                        "field parse failed; substituting default"
                    );
                    self.persisted.insert(
                        path.to_string(),
                        leaf_type.default_value(spec.is_optional()),
                    );
                }
            },
        }
    }

    fn clear_subtree(&mut self, root: &str) {
        let prefix = format!("{}{}", root, PATH_SEPARATOR);
        self.persisted
            .retain(|key, _| key != root && !key.starts_with(&prefix));
    }

    fn recompute_parsed(&mut self) {
        let def = self.def.clone();
        let mut parsed = HashMap::with_capacity(def.fields().len());
        for spec in def.fields() {
            parsed.insert(spec.name().to_string(), self.parsed_field(spec, spec.name()));
        }
        self.parsed = parsed;
    }

    /// Persisted value if present and non-null, else the typed default.
    fn parsed_field(&self, spec: &FieldSpec, path: &str) -> Value {
        match spec.field_type() {
            FieldType::Object(nested_specs) => {
                if matches!(self.persisted.get(path), Some(Value::Null)) {
                    return spec.default_value();
                }
                let prefix = format!("{}{}", path, PATH_SEPARATOR);
                let has_data = self.persisted.keys().any(|key| key.starts_with(&prefix));
                if !has_data {
                    return spec.default_value();
                }
                let mut entries = BTreeMap::new();
                for nested in nested_specs {
                    entries.insert(
                        nested.name().to_string(),
                        self.parsed_field(nested, &join_path(path, nested.name())),
                    );
                }
                Value::Object(entries)
            }
            _ => match self.persisted.get(path) {
                Some(v) if !v.is_null() => v.clone(),
                _ => spec.default_value(),
            },
        }
    }
}
