//! Error types for the token gate
//!
//! Authorization failures ([`AuthFailure`]) are terminal, classified values that
//! the calling layer renders as an HTTP response. Infrastructure failures (the
//! identity provider's key set could not be fetched) are kept apart in
//! [`GateError::KeySetUnavailable`] so they are never confused with a client
//! presenting a bad token.

use std::convert::Infallible;
use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for gate operations
pub type GateResult<T> = Result<T, GateError>;

/// Machine-readable authorization failure code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorCode {
    /// Missing or malformed `Authorization` header, missing key id, or no matching key
    InvalidHeader,
    /// Signature valid but the token has expired
    TokenExpired,
    /// Audience, issuer or another registered claim failed validation
    InvalidClaims,
    /// Signature invalid or token otherwise undecodable
    InvalidToken,
    /// Token carries no permissions claim at all
    InvalidPermission,
    /// Permissions claim lacks the required permission
    UnauthorizedPermission,
}

impl AuthErrorCode {
    /// Wire representation of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorCode::InvalidHeader => "invalid_header",
            AuthErrorCode::TokenExpired => "token_expired",
            AuthErrorCode::InvalidClaims => "invalid_claims",
            AuthErrorCode::InvalidToken => "invalid_token",
            AuthErrorCode::InvalidPermission => "invalid_permission",
            AuthErrorCode::UnauthorizedPermission => "unauthorized_permission",
        }
    }

    /// HTTP status associated with the code
    pub fn status(&self) -> StatusCode {
        match self {
            AuthErrorCode::InvalidToken | AuthErrorCode::InvalidPermission => {
                StatusCode::BAD_REQUEST
            }
            AuthErrorCode::InvalidHeader
            | AuthErrorCode::TokenExpired
            | AuthErrorCode::InvalidClaims
            | AuthErrorCode::UnauthorizedPermission => StatusCode::UNAUTHORIZED,
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified authorization failure
///
/// Serializes to the response body `{"code": "...", "description": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {description}")]
pub struct AuthFailure {
    /// Machine-readable code
    pub code: AuthErrorCode,
    /// Human-readable description
    pub description: String,
}

impl AuthFailure {
    /// Create a failure with a custom description
    pub fn new(code: AuthErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    /// No `Authorization` header on the request
    pub fn missing_header() -> Self {
        Self::new(
            AuthErrorCode::InvalidHeader,
            "Authorization header is missing.",
        )
    }

    /// `Authorization` header is not of the form `Bearer <token>`
    pub fn malformed_header() -> Self {
        Self::new(
            AuthErrorCode::InvalidHeader,
            "Authorization header is malformed.",
        )
    }

    /// Token header carries no `kid`
    pub fn missing_key_id() -> Self {
        Self::new(
            AuthErrorCode::InvalidHeader,
            "key id missing in token header",
        )
    }

    /// No key in the identity provider's key set matches the token's `kid`
    pub fn no_matching_key() -> Self {
        Self::new(AuthErrorCode::InvalidHeader, "Token header is malformed.")
    }

    pub fn token_expired() -> Self {
        Self::new(AuthErrorCode::TokenExpired, "Token expired.")
    }

    pub fn invalid_claims() -> Self {
        Self::new(
            AuthErrorCode::InvalidClaims,
            "Incorrect claims. Please, check the audience and issuer.",
        )
    }

    pub fn invalid_token() -> Self {
        Self::new(
            AuthErrorCode::InvalidToken,
            "Unable to decode authentication token.",
        )
    }

    /// Token has no permissions claim (RBAC not enabled for the API)
    pub fn missing_permissions() -> Self {
        Self::new(
            AuthErrorCode::InvalidPermission,
            "Permissions not included in payload",
        )
    }

    /// Token's permissions claim lacks the required permission
    pub fn permission_denied() -> Self {
        Self::new(
            AuthErrorCode::UnauthorizedPermission,
            "Permission string not in the payload permissions array",
        )
    }

    /// HTTP status to respond with
    pub fn status_code(&self) -> StatusCode {
        self.code.status()
    }
}

/// Error returned by every gate operation
#[derive(Debug, Error)]
pub enum GateError {
    /// The request failed authentication or authorization
    #[error(transparent)]
    Auth(#[from] AuthFailure),

    /// The identity provider's key set could not be retrieved
    #[error("JWKS unavailable from {uri}: {reason}")]
    KeySetUnavailable {
        /// JWKS endpoint that was queried
        uri: String,
        /// What went wrong
        reason: String,
    },

    /// Gate configuration is invalid
    #[error("Invalid gate configuration: {0}")]
    Configuration(String),
}

impl GateError {
    /// Machine-readable code for the response body
    pub fn code(&self) -> &'static str {
        match self {
            GateError::Auth(failure) => failure.code.as_str(),
            GateError::KeySetUnavailable { .. } => "key_set_unavailable",
            GateError::Configuration(_) => "configuration_error",
        }
    }

    /// HTTP status to respond with
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Auth(failure) => failure.status_code(),
            GateError::KeySetUnavailable { .. } | GateError::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// JSON body `{"code", "description"}` for the response
    ///
    /// Infrastructure errors are described generically; the detailed reason is
    /// only logged.
    pub fn body(&self) -> serde_json::Value {
        let description = match self {
            GateError::Auth(failure) => failure.description.clone(),
            GateError::KeySetUnavailable { .. } => {
                "Unable to retrieve token signing keys.".to_string()
            }
            GateError::Configuration(_) => "Authorization is misconfigured.".to_string(),
        };
        serde_json::json!({
            "code": self.code(),
            "description": description,
        })
    }

    /// The authorization failure, if this is one
    pub fn as_auth_failure(&self) -> Option<&AuthFailure> {
        match self {
            GateError::Auth(failure) => Some(failure),
            _ => None,
        }
    }

    /// Check if this error is an infrastructure failure rather than a client error
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            GateError::KeySetUnavailable { .. } | GateError::Configuration(_)
        )
    }
}

impl From<Infallible> for GateError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
