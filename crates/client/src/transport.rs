//! The upstream transport interface.
//!
//! Query and mutation execution, batching, and auth live outside the core.
//! The core sees a synchronous trait: the embedding layer bridges its own
//! async runtime and owns the push channel, forwarding each decoded
//! envelope into [`crate::QueryManager::on_subscription_message`] and
//! holding the canceller returned by its subscription machinery.

use plexus_core::Result;
use serde_json::Map;

/// Executes a wire document and returns the raw result keyed by alias.
///
/// Each alias value is a single record, null, or a `{"nodes": [...]}`
/// envelope, exactly as produced by the backend.
pub trait Transport {
    fn query(&self, document: &str) -> Result<Map<String, serde_json::Value>>;
}
