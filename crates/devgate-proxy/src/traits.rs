use std::sync::Arc;

use crate::routes::Route;

/// Trait for resolving the proxy route of a request path
pub trait UpstreamResolver: Send + Sync {
    /// Route for the path, or `None` when the request is not proxied
    fn resolve_route(&self, path: &str) -> Option<Arc<Route>>;
}
