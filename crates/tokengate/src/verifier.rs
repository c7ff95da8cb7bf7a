//! Token signature and claims verification
//!
//! Verification is delegated to `jsonwebtoken`, which checks the signature
//! before any claim. Failures are then classified:
//!
//! | `jsonwebtoken` error | failure |
//! |---|---|
//! | `ExpiredSignature` | `token_expired` (401) |
//! | `InvalidAudience`, `InvalidIssuer`, `MissingRequiredClaim`, `ImmatureSignature`, `InvalidSubject` | `invalid_claims` (401) |
//! | anything else | `invalid_token` (400) |

use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{Algorithm, Validation, decode};
use tracing::{debug, warn};

use crate::claims::ClaimSet;
use crate::config::GateConfig;
use crate::error::AuthFailure;
use crate::jwks::SigningKey;

/// Claims every accepted token must carry
const REQUIRED_CLAIMS: [&str; 3] = ["exp", "iss", "aud"];

/// Verifies token signatures and registered claims
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    /// Expected audience (aud claim)
    expected_audience: String,
    /// Expected issuer (iss claim)
    expected_issuer: String,
    /// Accepted algorithms
    allowed_algorithms: Vec<Algorithm>,
    /// Clock skew tolerance in seconds
    leeway_secs: u64,
}

impl TokenVerifier {
    /// Create a verifier from gate configuration
    pub fn new(config: &GateConfig) -> Self {
        Self {
            expected_audience: config.audience.clone(),
            expected_issuer: config.issuer(),
            allowed_algorithms: config.algorithms.clone(),
            leeway_secs: config.leeway_secs,
        }
    }

    /// Verify a token against a resolved signing key
    ///
    /// Returns the decoded claims unmodified.
    ///
    /// # Errors
    ///
    /// - `token_expired` if the signature is valid but `exp` has passed
    /// - `invalid_claims` on audience/issuer mismatch or a missing required claim
    /// - `invalid_token` for a malformed token, disallowed algorithm, bad
    ///   signature or unusable key
    pub fn verify(&self, token: &str, key: &SigningKey) -> Result<ClaimSet, AuthFailure> {
        let decoding_key = key.to_decoding_key().map_err(|e| {
            warn!(kid = ?key.kid, kty = %key.kty, error = %e, "Signing key is not a usable RSA key");
            AuthFailure::invalid_token()
        })?;

        let token_data = decode::<ClaimSet>(token, &decoding_key, &self.validation())
            .map_err(|e| {
                let failure = classify(&e);
                warn!(
                    error = %e,
                    code = %failure.code,
                    issuer = %self.expected_issuer,
                    audience = %self.expected_audience,
                    "JWT validation failed"
                );
                failure
            })?;

        debug!(
            subject = ?token_data.claims.subject(),
            algorithm = ?token_data.header.alg,
            kid = ?token_data.header.kid,
            "JWT validation successful"
        );

        Ok(token_data.claims)
    }

    /// Get the expected issuer
    pub fn expected_issuer(&self) -> &str {
        &self.expected_issuer
    }

    /// Get the expected audience
    pub fn expected_audience(&self) -> &str {
        &self.expected_audience
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = self.allowed_algorithms.clone();
        validation.set_audience(&[&self.expected_audience]);
        validation.set_issuer(&[&self.expected_issuer]);
        validation.set_required_spec_claims(&REQUIRED_CLAIMS);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = self.leeway_secs;
        validation
    }
}

/// Map a `jsonwebtoken` failure onto the authorization taxonomy
fn classify(err: &JwtError) -> AuthFailure {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthFailure::token_expired(),
        ErrorKind::InvalidAudience
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => AuthFailure::invalid_claims(),
        _ => AuthFailure::invalid_token(),
    }
}
