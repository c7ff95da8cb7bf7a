//! Tower Layer requiring a permission

use std::sync::Arc;
use tower::Layer;

use crate::gate::AuthGate;

use super::service::RequirePermissionService;

/// Tower Layer that requires a permission on every request
///
/// # Example
///
/// ```rust,ignore
/// use tower::ServiceBuilder;
/// use tokengate::middleware::RequirePermissionLayer;
///
/// let service = ServiceBuilder::new()
///     .layer(RequirePermissionLayer::new(gate, "delete:drink"))
///     .service(delete_drink);
/// ```
#[derive(Debug, Clone)]
pub struct RequirePermissionLayer {
    gate: AuthGate,
    permission: Arc<str>,
}

impl RequirePermissionLayer {
    /// Create a layer requiring `permission`
    pub fn new(gate: AuthGate, permission: impl Into<String>) -> Self {
        Self {
            gate,
            permission: Arc::from(permission.into()),
        }
    }

    /// Permission this layer requires
    pub fn permission(&self) -> &str {
        &self.permission
    }
}

impl<S> Layer<S> for RequirePermissionLayer {
    type Service = RequirePermissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePermissionService::new(inner, self.gate.clone(), Arc::clone(&self.permission))
    }
}
