//! # Tower middleware
//!
//! [`RequirePermissionLayer`] wraps any `http::Request` service so that each
//! request must carry a bearer token granting one permission. It is the layer
//! form of [`AuthGate::guard`](crate::AuthGate::guard).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use tokengate::middleware::RequirePermissionLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(RequirePermissionLayer::new(gate.clone(), "post:drink"))
//!     .service(create_drink);
//! ```
//!
//! ## Request Extensions
//!
//! Authorized requests reach the inner service with the verified
//! [`ClaimSet`](crate::ClaimSet) in their extensions:
//!
//! ```rust,ignore
//! if let Some(claims) = req.extensions().get::<ClaimSet>() {
//!     println!("caller: {:?}", claims.subject());
//! }
//! ```
//!
//! Rejected requests never reach the inner service; the call resolves to the
//! [`GateError`](crate::GateError), which carries the status and JSON body to
//! send back.

mod layer;
mod service;

pub use layer::RequirePermissionLayer;
pub use service::{RequirePermissionFuture, RequirePermissionService};
