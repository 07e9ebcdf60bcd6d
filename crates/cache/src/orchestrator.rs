//! The optimistic updates orchestrator.
//!
//! A process-wide coordinator sitting between repositories and data
//! objects. Local writes apply immediately through the version bypass and
//! are tracked as a per-node FIFO of rollback snapshots; server snapshots
//! arriving while writes are in flight are withheld (folded into the
//! rollback baseline) so they cannot visibly fight an in-progress edit.
//! Once every in-flight write for a node settles, the cache converges to
//! the last known server state.

use hashbrown::HashMap;
use plexus_core::{Error, Result, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, trace};

use crate::data_object::{DataObject, DataSnapshot};

/// A locally-issued write to one node.
#[derive(Clone, Debug)]
pub struct UpdateRequest {
    /// Node type name, checked against the cached data object.
    pub type_name: String,
    /// Target node id.
    pub id: String,
    /// Field values to apply, keyed by root field name.
    pub payload: HashMap<String, Value>,
}

impl UpdateRequest {
    /// Creates an empty update for the given node.
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
            payload: HashMap::new(),
        }
    }

    /// Adds a field value to the payload.
    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.payload.insert(field.into(), value);
        self
    }
}

struct InFlightRecord {
    seq: u64,
    /// Snapshot taken just before this write applied; reflects any prior
    /// pending writes.
    rollback: DataSnapshot,
}

struct NodeInFlight {
    records: Vec<InFlightRecord>,
    /// Last persisted state known before any of these writes began,
    /// updated by withheld server snapshots.
    baseline: DataSnapshot,
}

/// Process-wide coordinator for optimistic updates.
///
/// Shared as `Rc` between repositories (which route every server write
/// through it) and the client facade (which issues update requests).
#[derive(Default)]
pub struct OptimisticOrchestrator {
    dos: RefCell<HashMap<String, Rc<RefCell<DataObject>>>>,
    in_flight: RefCell<HashMap<String, NodeInFlight>>,
    next_seq: Cell<u64>,
}

impl OptimisticOrchestrator {
    /// Creates a new orchestrator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly constructed data object.
    pub fn on_do_constructed(&self, dobj: Rc<RefCell<DataObject>>) {
        let id = dobj.borrow().id().to_string();
        self.dos.borrow_mut().insert(id, dobj);
    }

    /// Forgets a deleted node, dropping any in-flight state with it.
    pub fn on_do_deleted(&self, id: &str) {
        self.dos.borrow_mut().remove(id);
        self.in_flight.borrow_mut().remove(id);
    }

    /// Returns true if the node has unsettled local writes.
    pub fn has_in_flight(&self, id: &str) -> bool {
        self.in_flight
            .borrow()
            .get(id)
            .is_some_and(|state| !state.records.is_empty())
    }

    /// Applies a local write immediately and tracks it for settlement.
    ///
    /// The rollback snapshot is captured from the data object's *current*
    /// state, which may already reflect a prior pending write. The
    /// returned handle settles the write later through
    /// [`OptimisticOrchestrator::on_update_successful`] or
    /// [`OptimisticOrchestrator::on_update_failed`].
    pub fn on_update_requested(&self, update: UpdateRequest) -> Result<UpdateHandle> {
        let dobj = self
            .dos
            .borrow()
            .get(&update.id)
            .cloned()
            .ok_or_else(|| Error::not_cached(&update.type_name, &update.id))?;

        let type_name = dobj.borrow().def().type_name().to_string();
        if type_name != update.type_name {
            return Err(Error::type_mismatch(update.type_name, type_name));
        }

        let rollback = dobj.borrow().snapshot();
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);

        {
            let mut in_flight = self.in_flight.borrow_mut();
            let state = in_flight.entry(update.id.clone()).or_insert_with(|| {
                NodeInFlight {
                    records: Vec::new(),
                    baseline: rollback.clone(),
                }
            });
            state.records.push(InFlightRecord {
                seq,
                rollback: rollback.clone(),
            });
        }

        let next_version = rollback.version + 1;
        dobj.borrow_mut()
            .on_data_received(next_version, None, &update.payload, true)?;
        trace!(id = %update.id, seq, version = next_version, "optimistic write applied");

        Ok(UpdateHandle { id: update.id, seq })
    }

    /// Routes a server-confirmed snapshot for an already-cached node.
    ///
    /// While the node has in-flight writes the snapshot is withheld: it
    /// becomes the new rollback baseline instead of touching the visible
    /// cache. Otherwise it applies normally.
    pub fn on_persisted_data_received(
        &self,
        dobj: &Rc<RefCell<DataObject>>,
        version: i64,
        last_updated_by: Option<&str>,
        data: &HashMap<String, Value>,
    ) -> Result<()> {
        let id = dobj.borrow().id().to_string();
        {
            let mut in_flight = self.in_flight.borrow_mut();
            if let Some(state) = in_flight
                .get_mut(&id)
                .filter(|state| !state.records.is_empty())
            {
                // Fold the snapshot into the baseline by replaying it onto
                // a scratch object, so merge semantics match a normal
                // apply.
                let def = dobj.borrow().def().clone();
                let mut scratch = DataObject::new(def, &id);
                scratch.restore(state.baseline.clone());
                scratch.on_data_received(version, last_updated_by, data, false)?;
                state.baseline = scratch.snapshot();
                debug!(%id, version, "server snapshot withheld as rollback baseline");
                return Ok(());
            }
        }
        dobj.borrow_mut()
            .on_data_received(version, last_updated_by, data, false)
    }

    /// Marks a write confirmed: pop its record, the optimistic value
    /// stands.
    pub fn on_update_successful(&self, handle: UpdateHandle) {
        self.settle(&handle.id, handle.seq, true);
    }

    /// Marks a write failed, rolling the cache back if it was the most
    /// recently triggered write for its node.
    pub fn on_update_failed(&self, handle: UpdateHandle) {
        self.settle(&handle.id, handle.seq, false);
    }

    fn settle(&self, id: &str, seq: u64, success: bool) {
        let mut in_flight = self.in_flight.borrow_mut();
        let Some(state) = in_flight.get_mut(id) else {
            debug!(%id, seq, "settlement for unknown node ignored");
            return;
        };
        let Some(pos) = state.records.iter().position(|r| r.seq == seq) else {
            debug!(%id, seq, "settlement for unknown record ignored");
            return;
        };

        if !success && pos == state.records.len() - 1 {
            // The most recently triggered write failed: restore the nearest
            // preceding state, normally the snapshot captured just before
            // this write (it still carries earlier writes, settled or
            // pending). A withheld server snapshot that advanced the
            // baseline past that point wins instead. Earlier failures need
            // no rollback, since later pending writes already overwrote
            // them.
            let rollback = &state.records[pos].rollback;
            let target = if state.baseline.version > rollback.version {
                state.baseline.clone()
            } else {
                rollback.clone()
            };
            if let Some(dobj) = self.dos.borrow().get(id) {
                trace!(%id, seq, version = target.version, "rolling back failed write");
                dobj.borrow_mut().restore(target);
            }
        }

        state.records.remove(pos);
        if state.records.is_empty() {
            in_flight.remove(id);
        }
    }
}

/// Settlement handle for one in-flight write.
///
/// Consumed by the orchestrator's settlement hooks, so a write settles
/// exactly once.
#[derive(Debug)]
pub struct UpdateHandle {
    id: String,
    seq: u64,
}

impl UpdateHandle {
    /// Returns the id of the node this write targets.
    #[inline]
    pub fn node_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_core::schema::{FieldSpec, FieldType, NodeTypeDefBuilder};

    fn todo_def() -> Rc<plexus_core::schema::NodeTypeDef> {
        Rc::new(
            NodeTypeDefBuilder::new("todo")
                .unwrap()
                .field(FieldSpec::new("task", FieldType::String))
                .unwrap()
                .field(FieldSpec::new("done", FieldType::Boolean))
                .unwrap()
                .build(),
        )
    }

    fn seeded(orchestrator: &Rc<OptimisticOrchestrator>, id: &str) -> Rc<RefCell<DataObject>> {
        let mut dobj = DataObject::new(todo_def(), id);
        let mut data = HashMap::new();
        data.insert("task".to_string(), Value::String("initial".into()));
        dobj.on_data_received(1, Some("server"), &data, false).unwrap();
        let rc = Rc::new(RefCell::new(dobj));
        orchestrator.on_do_constructed(rc.clone());
        rc
    }

    fn task_of(dobj: &Rc<RefCell<DataObject>>) -> String {
        dobj.borrow()
            .parsed()
            .get("task")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap()
    }

    fn update(id: &str, task: &str) -> UpdateRequest {
        UpdateRequest::new("todo", id).set("task", Value::String(task.into()))
    }

    #[test]
    fn test_update_applies_immediately_and_bumps_version() {
        let orchestrator = Rc::new(OptimisticOrchestrator::new());
        let dobj = seeded(&orchestrator, "t-1");

        let handle = orchestrator.on_update_requested(update("t-1", "edited")).unwrap();

        assert_eq!(task_of(&dobj), "edited");
        assert_eq!(dobj.borrow().version(), 2);
        assert!(orchestrator.has_in_flight("t-1"));

        orchestrator.on_update_successful(handle);
        assert!(!orchestrator.has_in_flight("t-1"));
        assert_eq!(task_of(&dobj), "edited");
    }

    #[test]
    fn test_update_for_uncached_node_fails() {
        let orchestrator = Rc::new(OptimisticOrchestrator::new());
        let err = orchestrator.on_update_requested(update("ghost", "x")).unwrap_err();
        assert!(matches!(err, Error::NotCached { .. }));
    }

    #[test]
    fn test_update_type_mismatch_fails() {
        let orchestrator = Rc::new(OptimisticOrchestrator::new());
        seeded(&orchestrator, "t-1");
        let err = orchestrator
            .on_update_requested(
                UpdateRequest::new("user", "t-1").set("task", Value::String("x".into())),
            )
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_single_failed_update_rolls_back_to_prior_state() {
        let orchestrator = Rc::new(OptimisticOrchestrator::new());
        let dobj = seeded(&orchestrator, "t-1");

        let handle = orchestrator.on_update_requested(update("t-1", "doomed")).unwrap();
        assert_eq!(task_of(&dobj), "doomed");

        orchestrator.on_update_failed(handle);
        assert_eq!(task_of(&dobj), "initial");
        assert_eq!(dobj.borrow().version(), 1);
        assert!(!orchestrator.has_in_flight("t-1"));
    }

    #[test]
    fn test_fail_first_succeed_second_keeps_second_value() {
        let orchestrator = Rc::new(OptimisticOrchestrator::new());
        let dobj = seeded(&orchestrator, "t-1");

        let first = orchestrator.on_update_requested(update("t-1", "x")).unwrap();
        let second = orchestrator.on_update_requested(update("t-1", "y")).unwrap();

        // First write fails while the second is still pending: no rollback,
        // the second write already overwrote it.
        orchestrator.on_update_failed(first);
        assert_eq!(task_of(&dobj), "y");

        orchestrator.on_update_successful(second);
        assert_eq!(task_of(&dobj), "y");
        assert!(!orchestrator.has_in_flight("t-1"));
    }

    #[test]
    fn test_succeed_first_then_fail_second_restores_first_write() {
        let orchestrator = Rc::new(OptimisticOrchestrator::new());
        let dobj = seeded(&orchestrator, "t-1");

        let first = orchestrator.on_update_requested(update("t-1", "x")).unwrap();
        let second = orchestrator.on_update_requested(update("t-1", "y")).unwrap();

        orchestrator.on_update_successful(first);
        assert_eq!(task_of(&dobj), "y");

        // The second write fails last: restore the snapshot captured just
        // before it, which still carries the confirmed first write.
        orchestrator.on_update_failed(second);
        assert_eq!(task_of(&dobj), "x");
        assert_eq!(dobj.borrow().version(), 2);
        assert!(!orchestrator.has_in_flight("t-1"));
    }

    #[test]
    fn test_latest_failure_restores_nearest_preceding_state() {
        let orchestrator = Rc::new(OptimisticOrchestrator::new());
        let dobj = seeded(&orchestrator, "t-1");

        let first = orchestrator.on_update_requested(update("t-1", "x")).unwrap();
        let second = orchestrator.on_update_requested(update("t-1", "y")).unwrap();

        // The most recent write fails first: roll back to the state just
        // before it, preserving the first write still expected to succeed.
        orchestrator.on_update_failed(second);
        assert_eq!(task_of(&dobj), "x");

        orchestrator.on_update_successful(first);
        assert_eq!(task_of(&dobj), "x");
    }

    #[test]
    fn test_pushes_withheld_while_in_flight() {
        let orchestrator = Rc::new(OptimisticOrchestrator::new());
        let dobj = seeded(&orchestrator, "t-1");

        let handle = orchestrator.on_update_requested(update("t-1", "local")).unwrap();

        let mut pushed = HashMap::new();
        pushed.insert("task".to_string(), Value::String("server".into()));
        orchestrator
            .on_persisted_data_received(&dobj, 7, Some("server"), &pushed)
            .unwrap();

        // The visible cache keeps the optimistic value
        assert_eq!(task_of(&dobj), "local");

        // ...but a failure now converges to the withheld server state
        orchestrator.on_update_failed(handle);
        assert_eq!(task_of(&dobj), "server");
        assert_eq!(dobj.borrow().version(), 7);
    }

    #[test]
    fn test_pushes_apply_normally_after_settlement() {
        let orchestrator = Rc::new(OptimisticOrchestrator::new());
        let dobj = seeded(&orchestrator, "t-1");

        let handle = orchestrator.on_update_requested(update("t-1", "local")).unwrap();
        orchestrator.on_update_successful(handle);

        let mut pushed = HashMap::new();
        pushed.insert("task".to_string(), Value::String("server".into()));
        orchestrator
            .on_persisted_data_received(&dobj, 9, Some("server"), &pushed)
            .unwrap();

        assert_eq!(task_of(&dobj), "server");
        assert_eq!(dobj.borrow().version(), 9);
    }

    #[test]
    fn test_do_deleted_drops_in_flight_state() {
        let orchestrator = Rc::new(OptimisticOrchestrator::new());
        seeded(&orchestrator, "t-1");
        let handle = orchestrator.on_update_requested(update("t-1", "x")).unwrap();

        orchestrator.on_do_deleted("t-1");
        assert!(!orchestrator.has_in_flight("t-1"));

        // Settlement after deletion is a quiet no-op
        orchestrator.on_update_failed(handle);
    }

    #[test]
    fn test_concurrent_updates_to_distinct_nodes_are_independent() {
        let orchestrator = Rc::new(OptimisticOrchestrator::new());
        let first = seeded(&orchestrator, "t-1");
        let second = seeded(&orchestrator, "t-2");

        let h1 = orchestrator.on_update_requested(update("t-1", "a")).unwrap();
        let h2 = orchestrator.on_update_requested(update("t-2", "b")).unwrap();

        orchestrator.on_update_failed(h1);
        assert_eq!(task_of(&first), "initial");
        assert_eq!(task_of(&second), "b");

        orchestrator.on_update_successful(h2);
        assert_eq!(task_of(&second), "b");
    }
}
