use std::sync::Arc;

use crate::{HttpResponse, RequestOpts, Schema, SteveResult, WatchDescriptor};

/// The connection-side services a type store and its resources call back into.
///
/// Implemented by the connection manager; stores hold it weakly through
/// `TypeStore::configure` so there is no global registry.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Execute a request; non-2xx statuses are returned as errors.
    async fn request(&self, opts: RequestOpts) -> SteveResult<HttpResponse>;

    /// Subscribe (or resubscribe) to changes. Never blocks on the network.
    fn watch(&self, desc: WatchDescriptor) -> SteveResult<()>;

    fn schema_for(&self, ty: &str) -> Option<Arc<Schema>>;
}
