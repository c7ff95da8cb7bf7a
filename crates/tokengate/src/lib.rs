//! # tokengate - Bearer Token Gate for HTTP APIs
//!
//! Verifies RS256 bearer tokens issued by an external identity provider and
//! checks that they grant the permission a protected operation requires.
//!
//! ## Key Features
//!
//! - **JWKS resolution** - Signing keys fetched from the provider's
//!   `/.well-known/jwks.json`, cached with a TTL and refreshed on key rotation
//! - **Token verification** - Signature, `exp`, `iss` and `aud` checked via `jsonwebtoken`
//! - **RBAC** - Exact-match checks against the token's `permissions` claim
//! - **Typed failures** - Every rejection carries a stable code, a description
//!   and an HTTP status
//!
//! ## Architecture
//!
//! - [`header`] - Bearer token extraction from the `Authorization` header
//! - [`jwks`] - Key set model and the caching [`KeySetResolver`]
//! - [`verifier`] - Signature and registered claims verification
//! - [`permissions`] - Permission checks against verified claims
//! - [`gate`] - [`AuthGate`], composing all of the above around protected operations
//! - [`config`] - [`GateConfig`] with environment loading
//! - [`error`] - [`AuthFailure`] taxonomy and [`GateError`]
//! - `middleware` - Tower layer requiring a permission (feature `middleware`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use http::HeaderMap;
//! use tokengate::{AuthGate, GateConfig};
//!
//! # tokio_test::block_on(async {
//! let gate = AuthGate::new(GateConfig::new("tenant.auth.example.com", "stock"))?;
//!
//! # let headers = HeaderMap::new();
//! match gate.authorize(&headers, "delete:drink").await {
//!     Ok(claims) => println!("deleting for {:?}", claims.subject()),
//!     Err(e) => println!("{} -> {}", e.status_code(), e.body()),
//! }
//! # Ok::<(), tokengate::GateError>(())
//! # });
//! ```
//!
//! ## Failure Taxonomy
//!
//! | code | status | raised when |
//! |---|---|---|
//! | `invalid_header` | 401 | header missing or malformed, token has no `kid`, no key matches |
//! | `token_expired` | 401 | signature valid but `exp` passed |
//! | `invalid_claims` | 401 | wrong audience or issuer |
//! | `invalid_token` | 400 | anything else the verifier rejects |
//! | `invalid_permission` | 400 | no `permissions` claim |
//! | `unauthorized_permission` | 401 | permission not granted |
//!
//! Infrastructure failures (the key set cannot be fetched) surface as
//! [`GateError::KeySetUnavailable`] with status 500 and are never reported as
//! an authentication failure.
//!
//! ## Feature Flags
//!
//! - `middleware` (default) - Tower `Layer`/`Service` integration
//! - `tower` - Alias for `middleware`

pub mod claims;
pub mod config;
pub mod error;
pub mod gate;
pub mod header;
pub mod jwks;
pub mod permissions;
pub mod verifier;

#[cfg(feature = "middleware")]
pub mod middleware;

pub use claims::{ClaimSet, PERMISSIONS_CLAIM};
pub use config::GateConfig;
pub use error::{AuthErrorCode, AuthFailure, GateError, GateResult};
pub use gate::{AuthGate, GateStage, Guarded};
pub use header::{extract_bearer_token, parse_authorization};
pub use jwks::{KeySet, KeySetResolver, SigningKey};
pub use permissions::check_permission;
pub use verifier::TokenVerifier;

#[cfg(feature = "middleware")]
pub use middleware::{RequirePermissionLayer, RequirePermissionService};
