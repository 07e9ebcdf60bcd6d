//! The client facade.
//!
//! Owns the schema registry, the shared repository set, and the
//! process-wide orchestrator; hands out compiled queries, query managers,
//! and repositories. Configuration is an explicit object passed to the
//! constructor, never global state.

use plexus_cache::{Repository, UpdateHandle, UpdateRequest};
use plexus_core::schema::TypeRegistry;
use plexus_core::Result;
use plexus_query::{compile, CompiledQuery, QueryDefinitions};
use std::cell::RefCell;
use std::rc::Rc;

use crate::manager::QueryManager;
use crate::repositories::RepositorySet;
use crate::transport::Transport;

/// Explicit configuration for a client instance.
pub struct ClientConfig {
    /// The registered node type definitions.
    pub schema: TypeRegistry,
}

/// Entry point to the sync layer.
pub struct Client {
    schema: TypeRegistry,
    repositories: Rc<RepositorySet>,
}

impl Client {
    /// Creates a client from its configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            schema: config.schema,
            repositories: Rc::new(RepositorySet::new()),
        }
    }

    /// Returns the schema registry.
    #[inline]
    pub fn schema(&self) -> &TypeRegistry {
        &self.schema
    }

    /// Returns the shared repository set.
    #[inline]
    pub fn repositories(&self) -> &Rc<RepositorySet> {
        &self.repositories
    }

    /// Compiles query definitions against this client's schema.
    pub fn compile(&self, definitions: &QueryDefinitions) -> Result<CompiledQuery> {
        compile(&self.schema, definitions)
    }

    /// Creates a query manager for a compiled query.
    pub fn query_manager(
        &self,
        compiled: &CompiledQuery,
        query_name: impl Into<String>,
    ) -> QueryManager {
        QueryManager::new(
            compiled.record.clone(),
            query_name,
            self.repositories.clone(),
        )
    }

    /// Gets or creates the repository for a registered node type.
    pub fn repository(&self, type_name: &str) -> Result<Rc<RefCell<Repository>>> {
        let def = self.schema.require(type_name)?;
        Ok(self.repositories.repository(&def))
    }

    /// Issues an optimistic local write; the cache reflects it
    /// immediately. Settle the returned handle through the orchestrator
    /// once the transport reports the mutation's outcome.
    pub fn update_node(&self, update: UpdateRequest) -> Result<UpdateHandle> {
        self.repositories.orchestrator().on_update_requested(update)
    }

    /// Reports a confirmed write; the optimistic value stands.
    pub fn on_update_successful(&self, handle: UpdateHandle) {
        self.repositories.orchestrator().on_update_successful(handle);
    }

    /// Reports a failed write; the cache rolls back per orchestrator
    /// policy.
    pub fn on_update_failed(&self, handle: UpdateHandle) {
        self.repositories.orchestrator().on_update_failed(handle);
    }

    /// Compiles, executes against a transport, and builds the result tree.
    ///
    /// Aliases defined as null trigger no round trip; a query consisting
    /// only of null aliases never touches the transport.
    pub fn execute<T: Transport>(
        &self,
        transport: &T,
        definitions: &QueryDefinitions,
        query_name: impl Into<String>,
    ) -> Result<QueryManager> {
        let compiled = self.compile(definitions)?;
        let mut manager = self.query_manager(&compiled, query_name);
        if compiled.record.has_live_entries() {
            let payload = transport.query(&compiled.document)?;
            manager.on_query_result(&payload)?;
        }
        Ok(manager)
    }
}
