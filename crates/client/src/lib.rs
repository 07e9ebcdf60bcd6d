//! Plexus Client - Query managers, read-guarded proxies, and the client
//! facade for the plexus sync layer.
//!
//! This crate assembles the reconciliation engine's read side:
//!
//! - `Client`: the facade owning schema, repositories, and orchestrator
//! - `QueryManager`: the live result tree for one query, patched
//!   incrementally by push notifications
//! - `Proxy` / `ObjectView`: per-query read-guarded views over data
//!   objects
//! - `SubscriptionMessage`: decoded push envelopes
//! - `Transport`: the upstream execution interface
//!
//! # Example
//!
//! ```rust
//! use plexus_client::{Client, ClientConfig};
//! use plexus_core::schema::{FieldSpec, FieldType, NodeTypeDefBuilder, TypeRegistry};
//! use plexus_query::{QueryDefinition, QueryDefinitions, Selection};
//!
//! let mut schema = TypeRegistry::new();
//! let todo = schema
//!     .register(
//!         NodeTypeDefBuilder::new("todo")
//!             .unwrap()
//!             .field(FieldSpec::new("task", FieldType::String))
//!             .unwrap()
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let client = Client::new(ClientConfig { schema });
//! let compiled = client
//!     .compile(&QueryDefinitions::new().query(
//!         "todos",
//!         QueryDefinition::new(todo).select(Selection::new().field("task")),
//!     ))
//!     .unwrap();
//!
//! let manager = client.query_manager(&compiled, "todos-query");
//! assert!(manager.get_results().contains_key("todos"));
//! ```

mod client;
mod manager;
mod message;
mod proxy;
mod repositories;
mod transport;

pub use client::{Client, ClientConfig};
pub use manager::{AliasResult, QueryManager};
pub use message::{Action, Operation, SubscriptionMessage};
pub use proxy::{ObjectView, Proxy, RelationalResult};
pub use repositories::RepositorySet;
pub use transport::Transport;
