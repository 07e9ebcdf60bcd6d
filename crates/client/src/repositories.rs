//! The shared repository set.
//!
//! One repository per node type, created on demand and shared between the
//! client facade and every live query manager. All writes route through
//! the single process-wide orchestrator.

use hashbrown::HashMap;
use plexus_cache::{OptimisticOrchestrator, Repository};
use plexus_core::schema::NodeTypeDef;
use std::cell::RefCell;
use std::rc::Rc;

/// Per-type repositories plus the orchestrator they all write through.
pub struct RepositorySet {
    orchestrator: Rc<OptimisticOrchestrator>,
    repositories: RefCell<HashMap<String, Rc<RefCell<Repository>>>>,
}

impl Default for RepositorySet {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositorySet {
    /// Creates an empty set with a fresh orchestrator.
    pub fn new() -> Self {
        Self {
            orchestrator: Rc::new(OptimisticOrchestrator::new()),
            repositories: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the shared orchestrator.
    pub fn orchestrator(&self) -> Rc<OptimisticOrchestrator> {
        self.orchestrator.clone()
    }

    /// Gets or creates the repository for a node type.
    pub fn repository(&self, def: &Rc<NodeTypeDef>) -> Rc<RefCell<Repository>> {
        let mut repositories = self.repositories.borrow_mut();
        repositories
            .entry(def.type_name().to_string())
            .or_insert_with(|| {
                Rc::new(RefCell::new(Repository::new(
                    def.clone(),
                    self.orchestrator.clone(),
                )))
            })
            .clone()
    }

    /// Gets an existing repository by type name.
    pub fn get(&self, type_name: &str) -> Option<Rc<RefCell<Repository>>> {
        self.repositories.borrow().get(type_name).cloned()
    }
}
