//! Tower Service enforcing a permission on `http::Request`s

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tower_service::Service;

use crate::error::GateError;
use crate::gate::AuthGate;

/// Tower Service that authorizes requests before forwarding them
///
/// On success the verified [`ClaimSet`](crate::ClaimSet) is inserted into the
/// request's extensions and the inner service is called.
#[derive(Debug, Clone)]
pub struct RequirePermissionService<S> {
    inner: S,
    gate: AuthGate,
    permission: Arc<str>,
}

impl<S> RequirePermissionService<S> {
    /// Create a new service
    pub fn new(inner: S, gate: AuthGate, permission: Arc<str>) -> Self {
        Self {
            inner,
            gate,
            permission,
        }
    }

    /// Permission every request needs
    pub fn permission(&self) -> &str {
        &self.permission
    }

    /// Get a reference to the inner service
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the inner service
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

/// Future returned by [`RequirePermissionService`]
pub type RequirePermissionFuture<T> = BoxFuture<'static, Result<T, GateError>>;

impl<S, B, ResBody> Service<http::Request<B>> for RequirePermissionService<S>
where
    S: Service<http::Request<B>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<GateError>,
    B: Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = GateError;
    type Future = RequirePermissionFuture<Self::Response>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let gate = self.gate.clone();
        let permission = Arc::clone(&self.permission);
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);

        let (mut parts, body) = req.into_parts();

        Box::pin(async move {
            let claims = gate.authorize(&parts.headers, &permission).await?;
            parts.extensions.insert(claims);

            let req = http::Request::from_parts(parts, body);
            inner.call(req).await.map_err(Into::into)
        })
    }
}
