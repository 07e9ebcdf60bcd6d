//! The query manager: a live result tree for one query.
//!
//! Per alias the manager holds the result identity (an id or ordered id
//! list) and a proxy cache mirroring the compiled record tree. Initial
//! results build the tree; push notifications patch only the affected
//! node's branch, leaving sibling proxies untouched.

use hashbrown::HashMap;
use plexus_core::schema::Cardinality;
use plexus_core::{Error, Result, PROP_ID, UNION_ALIAS_SEPARATOR};
use plexus_query::{QueryRecord, QueryRecordEntry, RelationalEntry};
use serde_json::Map;
use std::rc::Rc;
use tracing::trace;

use crate::message::{Action, SubscriptionMessage};
use crate::proxy::{Proxy, RelationalResult};
use crate::repositories::RepositorySet;

/// The externally visible result of one alias.
#[derive(Clone)]
pub enum AliasResult {
    /// The alias was defined as null: no entry, no round trip.
    Null,
    /// Single-result alias: the proxy, or `None` when nothing matched.
    One(Option<Rc<Proxy>>),
    /// Multi-result alias: proxies in identity order, pushed nodes first.
    Many(Vec<Rc<Proxy>>),
}

enum ResultIdentity {
    Single(Option<String>),
    Many(Vec<String>),
}

struct ProxyCacheEntry {
    proxy: Rc<Proxy>,
    /// Nested alias states keyed by the stored relational alias (including
    /// union-suffixed siblings).
    relational: HashMap<String, AliasState>,
}

struct AliasState {
    identity: ResultIdentity,
    proxies: HashMap<String, ProxyCacheEntry>,
}

impl AliasState {
    fn empty(single: bool) -> Self {
        Self {
            identity: if single {
                ResultIdentity::Single(None)
            } else {
                ResultIdentity::Many(Vec::new())
            },
            proxies: HashMap::new(),
        }
    }

    fn remove(&mut self, id: &str) {
        match &mut self.identity {
            ResultIdentity::Single(slot) => {
                if slot.as_deref() == Some(id) {
                    *slot = None;
                }
            }
            ResultIdentity::Many(ids) => ids.retain(|existing| existing != id),
        }
        self.proxies.remove(id);
    }
}

/// Holds and incrementally patches the live result tree for one query.
pub struct QueryManager {
    record: QueryRecord,
    query_name: String,
    repositories: Rc<RepositorySet>,
    state: HashMap<String, AliasState>,
    detached: bool,
}

impl QueryManager {
    /// Creates a manager for a compiled record.
    pub fn new(
        record: QueryRecord,
        query_name: impl Into<String>,
        repositories: Rc<RepositorySet>,
    ) -> Self {
        Self {
            record,
            query_name: query_name.into(),
            repositories,
            state: HashMap::new(),
            detached: false,
        }
    }

    /// Returns the compiled record this manager serves.
    #[inline]
    pub fn record(&self) -> &QueryRecord {
        &self.record
    }

    /// Returns the query name used in read-guard errors.
    #[inline]
    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    /// Applies an initial query result.
    ///
    /// Relational sub-results notify their repositories before parents, so
    /// referenced node types are populated before anything references
    /// them; then each alias's proxy tree is built.
    pub fn on_query_result(&mut self, payload: &Map<String, serde_json::Value>) -> Result<()> {
        for (alias, entry) in self.record.entries() {
            let Some(entry) = entry else { continue };
            let raw = payload.get(alias).ok_or_else(|| {
                Error::malformed_message(format!("query result carries no alias {}", alias))
            })?;

            let state = if entry.target.is_single() {
                match raw {
                    serde_json::Value::Null => AliasState::empty(true),
                    serde_json::Value::Object(record) => {
                        ingest_record(&self.repositories, entry, record)?;
                        let (id, cache_entry) =
                            build_cache_entry(&self.repositories, entry, record, &self.query_name)?;
                        let mut state = AliasState::empty(true);
                        state.identity = ResultIdentity::Single(Some(id.clone()));
                        state.proxies.insert(id, cache_entry);
                        state
                    }
                    _ => {
                        return Err(Error::malformed_message(format!(
                            "single-result alias {} is neither a record nor null",
                            alias
                        )));
                    }
                }
            } else {
                let nodes = raw
                    .as_object()
                    .and_then(|envelope| envelope.get("nodes"))
                    .and_then(|nodes| nodes.as_array())
                    .ok_or_else(|| {
                        Error::malformed_message(format!(
                            "multi-result alias {} carries no nodes envelope",
                            alias
                        ))
                    })?;
                let mut state = AliasState::empty(false);
                let mut ids = Vec::with_capacity(nodes.len());
                for node in nodes {
                    let record = node.as_object().ok_or_else(|| {
                        Error::malformed_message(format!("node under {} is not an object", alias))
                    })?;
                    ingest_record(&self.repositories, entry, record)?;
                    let (id, cache_entry) =
                        build_cache_entry(&self.repositories, entry, record, &self.query_name)?;
                    ids.push(id.clone());
                    state.proxies.insert(id, cache_entry);
                }
                state.identity = ResultIdentity::Many(ids);
                state
            };

            self.state.insert(alias.clone(), state);
        }
        Ok(())
    }

    /// Applies one push notification, patching only the affected branch.
    ///
    /// After `unsubscribe`, messages are ignored.
    pub fn on_subscription_message(&mut self, message: &SubscriptionMessage) -> Result<()> {
        if self.detached {
            return Ok(());
        }
        let Some(entry) = self.record.get(&message.alias) else {
            return Err(Error::malformed_message(format!(
                "push for unknown alias {}",
                message.alias
            )));
        };
        let id = message.operation.id.clone();

        match message.operation.action {
            Action::Delete => {
                self.repositories
                    .repository(&entry.def)
                    .borrow_mut()
                    .on_node_deleted(&id);
                if let Some(state) = self.state.get_mut(&message.alias) {
                    state.remove(&id);
                }
                trace!(alias = %message.alias, %id, "push delete applied");
            }
            Action::Create | Action::Update => {
                let node = message.node.as_ref().ok_or_else(|| {
                    Error::malformed_message(format!(
                        "upsert push for {} carries no node",
                        message.alias
                    ))
                })?;
                ingest_record(&self.repositories, entry, node)?;

                let state = self
                    .state
                    .entry(message.alias.clone())
                    .or_insert_with(|| AliasState::empty(entry.target.is_single()));

                if let Some(cache_entry) = state.proxies.get_mut(&id) {
                    reconcile_cache_entry(
                        &self.repositories,
                        entry,
                        cache_entry,
                        node,
                        &self.query_name,
                    )?;
                    trace!(alias = %message.alias, %id, "push update reconciled");
                } else {
                    // A newly matching node: build a full cache entry and
                    // surface it first in the identity order.
                    let (new_id, cache_entry) =
                        build_cache_entry(&self.repositories, entry, node, &self.query_name)?;
                    match &mut state.identity {
                        ResultIdentity::Single(slot) => {
                            if let Some(previous) = slot.take() {
                                state.proxies.remove(&previous);
                            }
                            *slot = Some(new_id.clone());
                        }
                        ResultIdentity::Many(ids) => {
                            if !ids.contains(&new_id) {
                                ids.insert(0, new_id.clone());
                            }
                        }
                    }
                    state.proxies.insert(new_id, cache_entry);
                    trace!(alias = %message.alias, %id, "push insert applied");
                }
            }
        }
        Ok(())
    }

    /// Derives the external result shape from the current identity and
    /// proxy cache.
    pub fn get_results(&self) -> HashMap<String, AliasResult> {
        let mut results = HashMap::with_capacity(self.record.entries().len());
        for (alias, entry) in self.record.entries() {
            let result = match entry {
                None => AliasResult::Null,
                Some(entry) => match self.state.get(alias) {
                    None => {
                        if entry.target.is_single() {
                            AliasResult::One(None)
                        } else {
                            AliasResult::Many(Vec::new())
                        }
                    }
                    Some(state) => alias_result(state),
                },
            };
            results.insert(alias.clone(), result);
        }
        results
    }

    /// Stops future push delivery. Nothing is rolled back and underlying
    /// data objects stay cached for other live queries.
    pub fn unsubscribe(&mut self) {
        self.detached = true;
    }

    /// Returns true once the manager is unsubscribed.
    #[inline]
    pub fn is_detached(&self) -> bool {
        self.detached
    }
}

fn alias_result(state: &AliasState) -> AliasResult {
    match &state.identity {
        ResultIdentity::Single(slot) => AliasResult::One(
            slot.as_ref()
                .and_then(|id| state.proxies.get(id))
                .map(|entry| entry.proxy.clone()),
        ),
        ResultIdentity::Many(ids) => AliasResult::Many(
            ids.iter()
                .filter_map(|id| state.proxies.get(id))
                .map(|entry| entry.proxy.clone())
                .collect(),
        ),
    }
}

/// Notifies repositories for one raw record, relational children first,
/// with relational keys stripped from the record its own repository sees.
fn ingest_record(
    repositories: &Rc<RepositorySet>,
    entry: &QueryRecordEntry,
    record: &Map<String, serde_json::Value>,
) -> Result<()> {
    for (rel_alias, rel) in &entry.relational {
        let Some(child_raw) = record.get(rel_alias) else {
            continue;
        };
        for child in relational_records(rel, child_raw, rel_alias)? {
            ingest_record(repositories, &rel.entry, child)?;
        }
    }

    let mut stripped = record.clone();
    for (rel_alias, _) in &entry.relational {
        stripped.remove(rel_alias);
    }
    repositories
        .repository(&entry.def)
        .borrow_mut()
        .on_data_received(&stripped)
}

/// Extracts the child records of a relational result by cardinality:
/// to-one results are a record or null, to-many results an array.
fn relational_records<'a>(
    rel: &RelationalEntry,
    raw: &'a serde_json::Value,
    alias: &str,
) -> Result<Vec<&'a Map<String, serde_json::Value>>> {
    match (rel.cardinality, raw) {
        (_, serde_json::Value::Null) => Ok(Vec::new()),
        (Cardinality::One, serde_json::Value::Object(record)) => Ok(vec![record]),
        (Cardinality::Many, serde_json::Value::Array(items)) => {
            let mut records = Vec::with_capacity(items.len());
            for item in items {
                records.push(item.as_object().ok_or_else(|| {
                    Error::malformed_message(format!("node under {} is not an object", alias))
                })?);
            }
            Ok(records)
        }
        _ => Err(Error::malformed_message(format!(
            "relational result {} does not match its cardinality",
            alias
        ))),
    }
}

/// Builds the proxy cache entry for one record, recursing into relational
/// sub-results.
fn build_cache_entry(
    repositories: &Rc<RepositorySet>,
    entry: &QueryRecordEntry,
    record: &Map<String, serde_json::Value>,
    query_name: &str,
) -> Result<(String, ProxyCacheEntry)> {
    let id = record
        .get(PROP_ID)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::malformed_message("record missing id"))?
        .to_string();
    let dobj = repositories.repository(&entry.def).borrow().by_id(&id)?;

    let mut relational = HashMap::with_capacity(entry.relational.len());
    for (rel_alias, rel) in &entry.relational {
        let state = match record.get(rel_alias) {
            None => AliasState::empty(rel.cardinality == Cardinality::One),
            Some(raw) => build_relational_state(repositories, rel, raw, rel_alias, query_name)?,
        };
        relational.insert(rel_alias.clone(), state);
    }

    let results = proxy_relational_results(entry, &relational);
    let proxy = Rc::new(Proxy::new(
        entry.def.clone(),
        dobj,
        entry.properties.clone(),
        query_name,
        results,
    ));
    Ok((id, ProxyCacheEntry { proxy, relational }))
}

fn build_relational_state(
    repositories: &Rc<RepositorySet>,
    rel: &RelationalEntry,
    raw: &serde_json::Value,
    alias: &str,
    query_name: &str,
) -> Result<AliasState> {
    let records = relational_records(rel, raw, alias)?;
    let mut state = AliasState::empty(rel.cardinality == Cardinality::One);
    let mut ids = Vec::with_capacity(records.len());
    for record in records {
        let (id, cache_entry) = build_cache_entry(repositories, &rel.entry, record, query_name)?;
        ids.push(id.clone());
        state.proxies.insert(id, cache_entry);
    }
    state.identity = match rel.cardinality {
        Cardinality::One => ResultIdentity::Single(ids.into_iter().next()),
        Cardinality::Many => ResultIdentity::Many(ids),
    };
    Ok(state)
}

/// Reconciles an existing cache entry against a pushed node.
///
/// Each relational alias present in the push is diffed: new child ids get
/// fresh cache entries, existing ones recurse, dropped ones are simply
/// unreferenced. The recomputed result enters the proxy through its single
/// mutation point exactly once per push.
fn reconcile_cache_entry(
    repositories: &Rc<RepositorySet>,
    entry: &QueryRecordEntry,
    cache_entry: &mut ProxyCacheEntry,
    record: &Map<String, serde_json::Value>,
    query_name: &str,
) -> Result<()> {
    let mut touched = false;
    for (rel_alias, rel) in &entry.relational {
        let Some(raw) = record.get(rel_alias) else {
            continue;
        };
        touched = true;
        let state = cache_entry
            .relational
            .entry(rel_alias.clone())
            .or_insert_with(|| AliasState::empty(rel.cardinality == Cardinality::One));
        reconcile_relational_state(repositories, rel, state, raw, rel_alias, query_name)?;
    }

    if touched {
        let results = proxy_relational_results(entry, &cache_entry.relational);
        cache_entry.proxy.update_relational_results(results);
    }
    Ok(())
}

fn reconcile_relational_state(
    repositories: &Rc<RepositorySet>,
    rel: &RelationalEntry,
    state: &mut AliasState,
    raw: &serde_json::Value,
    alias: &str,
    query_name: &str,
) -> Result<()> {
    let records = relational_records(rel, raw, alias)?;
    let mut proxies = HashMap::with_capacity(records.len());
    let mut ids = Vec::with_capacity(records.len());
    for record in records {
        let id = record
            .get(PROP_ID)
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::malformed_message("record missing id"))?
            .to_string();
        ids.push(id.clone());
        match state.proxies.remove(&id) {
            Some(mut existing) => {
                reconcile_cache_entry(repositories, &rel.entry, &mut existing, record, query_name)?;
                proxies.insert(id, existing);
            }
            None => {
                let (new_id, built) =
                    build_cache_entry(repositories, &rel.entry, record, query_name)?;
                proxies.insert(new_id, built);
            }
        }
    }
    state.identity = match rel.cardinality {
        Cardinality::One => ResultIdentity::Single(ids.into_iter().next()),
        Cardinality::Many => ResultIdentity::Many(ids),
    };
    state.proxies = proxies;
    Ok(())
}

/// Folds nested alias states into the proxy's relation view, keyed by base
/// alias. Union-suffixed siblings merge back into their base alias with
/// whichever member type actually returned.
fn proxy_relational_results(
    entry: &QueryRecordEntry,
    relational: &HashMap<String, AliasState>,
) -> HashMap<String, RelationalResult> {
    let mut results: HashMap<String, RelationalResult> = HashMap::new();
    for (stored_alias, rel) in &entry.relational {
        let base = stored_alias
            .split(UNION_ALIAS_SEPARATOR)
            .next()
            .unwrap_or(stored_alias)
            .to_string();
        let state = relational.get(stored_alias);
        let result = match rel.cardinality {
            Cardinality::One => RelationalResult::One(state.and_then(|s| match &s.identity {
                ResultIdentity::Single(Some(id)) => {
                    s.proxies.get(id).map(|entry| entry.proxy.clone())
                }
                _ => None,
            })),
            Cardinality::Many => RelationalResult::Many(match state {
                Some(s) => match &s.identity {
                    ResultIdentity::Many(ids) => ids
                        .iter()
                        .filter_map(|id| s.proxies.get(id))
                        .map(|entry| entry.proxy.clone())
                        .collect(),
                    ResultIdentity::Single(_) => Vec::new(),
                },
                None => Vec::new(),
            }),
        };
        match results.get_mut(&base) {
            None => {
                results.insert(base, result);
            }
            Some(RelationalResult::One(slot)) => {
                if slot.is_none() {
                    if let RelationalResult::One(Some(proxy)) = result {
                        *slot = Some(proxy);
                    }
                }
            }
            Some(RelationalResult::Many(list)) => {
                if let RelationalResult::Many(mut more) = result {
                    list.append(&mut more);
                }
            }
        }
    }
    results
}
