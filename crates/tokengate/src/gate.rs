//! The authorization gate: header → key → verified claims → permission
//!
//! ```text
//! Start ─► HeaderExtracted ─► KeyResolved ─► TokenVerified ─► PermissionChecked
//!   │            │                 │               │
//!   └────────────┴─────────────────┴───────────────┴──► failed (first error wins)
//! ```
//!
//! Every call walks the chain from the start; nothing is retried and no state
//! is carried between calls apart from the key-set cache.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
use tracing::{debug, error, info, warn};

use crate::claims::ClaimSet;
use crate::config::GateConfig;
use crate::error::{GateError, GateResult};
use crate::header::extract_bearer_token;
use crate::jwks::KeySetResolver;
use crate::permissions::check_permission;
use crate::verifier::TokenVerifier;

/// Last step a gate call completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    /// Nothing done yet
    Start,
    /// Bearer token read from the request
    HeaderExtracted,
    /// Signing key resolved from the key set
    KeyResolved,
    /// Signature and claims verified
    TokenVerified,
    /// Required permission present
    PermissionChecked,
}

impl fmt::Display for GateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GateStage::Start => "start",
            GateStage::HeaderExtracted => "header_extracted",
            GateStage::KeyResolved => "key_resolved",
            GateStage::TokenVerified => "token_verified",
            GateStage::PermissionChecked => "permission_checked",
        })
    }
}

/// Guards protected operations behind token verification and a required permission
///
/// Cloning is cheap; clones share the key-set cache.
///
/// # Example
///
/// ```rust,no_run
/// use http::HeaderMap;
/// use tokengate::{AuthGate, GateConfig};
///
/// # tokio_test::block_on(async {
/// let gate = AuthGate::new(GateConfig::new("tenant.auth.example.com", "stock"))?;
///
/// # let headers = HeaderMap::new();
/// let created = gate
///     .guard(&headers, "post:drink", |claims| async move {
///         format!("drink created by {:?}", claims.subject())
///     })
///     .await?;
/// println!("{created}");
/// # Ok::<(), tokengate::GateError>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct AuthGate {
    resolver: Arc<KeySetResolver>,
    verifier: Arc<TokenVerifier>,
}

impl AuthGate {
    /// Build a gate from configuration
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Configuration`] if the configuration is invalid.
    pub fn new(config: GateConfig) -> GateResult<Self> {
        config.validate()?;

        let resolver = KeySetResolver::new(&config)?;
        let verifier = TokenVerifier::new(&config);

        info!(
            issuer = %verifier.expected_issuer(),
            audience = %verifier.expected_audience(),
            jwks_uri = %resolver.jwks_uri(),
            cache = resolver.caching_enabled(),
            "Token gate configured"
        );

        Ok(Self::from_parts(Arc::new(resolver), verifier))
    }

    /// Build a gate from an existing resolver and verifier
    ///
    /// Use this to share one resolver (and its cache) between gates.
    pub fn from_parts(resolver: Arc<KeySetResolver>, verifier: TokenVerifier) -> Self {
        Self {
            resolver,
            verifier: Arc::new(verifier),
        }
    }

    /// The key-set resolver
    pub fn resolver(&self) -> &Arc<KeySetResolver> {
        &self.resolver
    }

    /// The token verifier
    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Resolve the signing key for a raw token and verify it
    ///
    /// # Errors
    ///
    /// Any failure from key resolution or verification.
    pub async fn verify_token(&self, token: &str) -> GateResult<ClaimSet> {
        let key = self.resolver.resolve_key(token).await?;
        Ok(self.verifier.verify(token, &key)?)
    }

    /// Authenticate a request and check it grants `permission`
    ///
    /// # Errors
    ///
    /// The first failure of the chain: header extraction, key resolution,
    /// verification, then the permission check.
    pub async fn authorize(&self, headers: &HeaderMap, permission: &str) -> GateResult<ClaimSet> {
        let mut stage = GateStage::Start;
        let result = self.run(headers, permission, &mut stage).await;

        match &result {
            Ok(claims) => debug!(
                permission = %permission,
                subject = ?claims.subject(),
                "Request authorized"
            ),
            Err(GateError::Auth(failure)) => warn!(
                permission = %permission,
                stage = %stage,
                code = %failure.code,
                description = %failure.description,
                "Request rejected"
            ),
            Err(e) => error!(
                permission = %permission,
                stage = %stage,
                error = %e,
                "Authorization could not complete"
            ),
        }

        result
    }

    /// [`authorize`](Self::authorize) bounded by a caller deadline
    ///
    /// Only the key-set fetch can block, so an elapsed deadline is reported as
    /// [`GateError::KeySetUnavailable`].
    ///
    /// # Errors
    ///
    /// Same as [`authorize`](Self::authorize), plus the deadline error.
    pub async fn authorize_within(
        &self,
        headers: &HeaderMap,
        permission: &str,
        deadline: Duration,
    ) -> GateResult<ClaimSet> {
        tokio::time::timeout(deadline, self.authorize(headers, permission))
            .await
            .map_err(|_| {
                error!(
                    permission = %permission,
                    deadline_ms = deadline.as_millis(),
                    "Authorization deadline exceeded"
                );
                GateError::KeySetUnavailable {
                    uri: self.resolver.jwks_uri().to_string(),
                    reason: format!("deadline of {}ms exceeded", deadline.as_millis()),
                }
            })?
    }

    /// Authorize the request, then run `op` with the verified claims
    ///
    /// `op` is never invoked when authorization fails; its output is returned
    /// unchanged otherwise.
    ///
    /// # Errors
    ///
    /// Same as [`authorize`](Self::authorize).
    pub async fn guard<F, Fut>(
        &self,
        headers: &HeaderMap,
        permission: &str,
        op: F,
    ) -> GateResult<Fut::Output>
    where
        F: FnOnce(ClaimSet) -> Fut,
        Fut: Future,
    {
        let claims = self.authorize(headers, permission).await?;
        Ok(op(claims).await)
    }

    /// Wrap a protected operation so every call requires `permission`
    pub fn requires<F>(&self, permission: impl Into<String>, op: F) -> Guarded<F> {
        Guarded {
            gate: self.clone(),
            permission: Arc::from(permission.into()),
            op,
        }
    }

    async fn run(
        &self,
        headers: &HeaderMap,
        permission: &str,
        stage: &mut GateStage,
    ) -> GateResult<ClaimSet> {
        let token = extract_bearer_token(headers)?;
        *stage = GateStage::HeaderExtracted;

        let key = self.resolver.resolve_key(&token).await?;
        *stage = GateStage::KeyResolved;

        let claims = self.verifier.verify(&token, &key)?;
        *stage = GateStage::TokenVerified;

        check_permission(permission, &claims)?;
        *stage = GateStage::PermissionChecked;

        Ok(claims)
    }
}

/// A protected operation wrapped by [`AuthGate::requires`]
///
/// The operation receives the verified claims first and the request second.
#[derive(Clone)]
pub struct Guarded<F> {
    gate: AuthGate,
    permission: Arc<str>,
    op: F,
}

impl<F> fmt::Debug for Guarded<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guarded")
            .field("gate", &self.gate)
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

impl<F> Guarded<F> {
    /// Permission every call requires
    pub fn permission(&self) -> &str {
        &self.permission
    }

    /// Authorize `request` and, on success, run the wrapped operation
    ///
    /// # Errors
    ///
    /// Same as [`AuthGate::authorize`]; the operation is not invoked then.
    pub async fn call<B, Fut>(&self, request: http::Request<B>) -> GateResult<Fut::Output>
    where
        F: Fn(ClaimSet, http::Request<B>) -> Fut,
        Fut: Future,
    {
        let claims = self
            .gate
            .authorize(request.headers(), &self.permission)
            .await?;
        Ok((self.op)(claims, request).await)
    }
}
