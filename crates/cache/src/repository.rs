//! Per-node-type repositories.
//!
//! A repository owns the id → data object map for one node type. Every
//! incoming record passes through here: the wire shape is validated, the
//! legacy encodings are decoded, and the write is routed through the
//! optimistic orchestrator so it is subject to in-flight update policy.

use hashbrown::HashMap;
use plexus_core::schema::NodeTypeDef;
use plexus_core::{
    is_identity_property, Error, Result, Value, PROP_ID, PROP_LAST_UPDATED_BY, PROP_TYPE,
    PROP_VERSION,
};
use plexus_wire::{collapse_flattened, decode_value};
use serde_json::Map;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

use crate::data_object::DataObject;
use crate::orchestrator::OptimisticOrchestrator;

/// The id → data object map for one node type.
pub struct Repository {
    def: Rc<NodeTypeDef>,
    orchestrator: Rc<OptimisticOrchestrator>,
    cache: HashMap<String, Rc<RefCell<DataObject>>>,
}

impl Repository {
    /// Creates an empty repository for a node type.
    pub fn new(def: Rc<NodeTypeDef>, orchestrator: Rc<OptimisticOrchestrator>) -> Self {
        Self {
            def,
            orchestrator,
            cache: HashMap::new(),
        }
    }

    /// Returns the owning node type definition.
    #[inline]
    pub fn def(&self) -> &Rc<NodeTypeDef> {
        &self.def
    }

    /// Ingests a raw wire record.
    ///
    /// Fatal on a `type` mismatch, a missing `id`, or a missing `version`.
    /// On first sighting of an id the data object is constructed and
    /// registered with the orchestrator; subsequent records route through
    /// the orchestrator's persisted-data hook instead of writing directly.
    pub fn on_data_received(&mut self, raw: &Map<String, serde_json::Value>) -> Result<()> {
        if let Some(got) = raw.get(PROP_TYPE).and_then(|v| v.as_str()) {
            if got != self.def.type_name() {
                return Err(Error::type_mismatch(self.def.type_name(), got));
            }
        }
        let id = raw
            .get(PROP_ID)
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::malformed_message("record missing id"))?
            .to_string();
        let version = extract_version(raw)
            .ok_or_else(|| Error::missing_version(self.def.type_name(), &id))?;
        let last_updated_by = raw.get(PROP_LAST_UPDATED_BY).and_then(|v| v.as_str());

        let collapsed = collapse_flattened(raw);
        let mut data = HashMap::with_capacity(collapsed.len());
        for (key, value) in &collapsed {
            if is_identity_property(key) {
                continue;
            }
            data.insert(key.clone(), decode_value(value));
        }

        match self.cache.get(&id) {
            None => {
                trace!(node_type = self.def.type_name(), %id, version, "constructing data object");
                let mut dobj = DataObject::new(self.def.clone(), &id);
                dobj.on_data_received(version, last_updated_by, &data, false)?;
                let rc = Rc::new(RefCell::new(dobj));
                self.cache.insert(id, rc.clone());
                self.orchestrator.on_do_constructed(rc);
            }
            Some(dobj) => {
                self.orchestrator
                    .on_persisted_data_received(dobj, version, last_updated_by, &data)?;
            }
        }
        Ok(())
    }

    /// Gets a cached data object.
    ///
    /// Fatal if the id is uncached: result construction has outrun data
    /// arrival, which is a contract violation and never retried.
    pub fn by_id(&self, id: &str) -> Result<Rc<RefCell<DataObject>>> {
        self.cache
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_cached(self.def.type_name(), id))
    }

    /// Returns true if the id is cached.
    pub fn contains(&self, id: &str) -> bool {
        self.cache.contains_key(id)
    }

    /// Evicts a node on an explicit deleted notification.
    pub fn on_node_deleted(&mut self, id: &str) {
        if self.cache.remove(id).is_some() {
            trace!(node_type = self.def.type_name(), %id, "data object evicted");
        }
        self.orchestrator.on_do_deleted(id);
    }

    /// Returns the number of cached nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if no nodes are cached.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Versions may arrive as JSON numbers or numeric strings.
fn extract_version(raw: &Map<String, serde_json::Value>) -> Option<i64> {
    match raw.get(PROP_VERSION)? {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s
            .parse::<i64>()
            .ok()
            .or_else(|| s.parse::<f64>().ok().map(|f| f as i64)),
        _ => None,
    }
}
