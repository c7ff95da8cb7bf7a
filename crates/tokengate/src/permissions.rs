//! RBAC permission checks against a verified claim set

use tracing::debug;

use crate::claims::ClaimSet;
use crate::error::AuthFailure;

/// Check that a verified claim set grants `required`
///
/// Matching is exact and case-sensitive; there are no wildcards or
/// hierarchies.
///
/// # Errors
///
/// - `invalid_permission` (400) if the token has no permissions claim at all,
///   which means RBAC is not enabled for the API at the identity provider
/// - `unauthorized_permission` (401) if the claim does not contain `required`
pub fn check_permission(required: &str, claims: &ClaimSet) -> Result<(), AuthFailure> {
    let Some(granted) = claims.permissions() else {
        debug!(permission = %required, "Token has no permissions claim");
        return Err(AuthFailure::missing_permissions());
    };

    if granted.contains(&required) {
        Ok(())
    } else {
        debug!(
            permission = %required,
            granted = granted.len(),
            "Required permission not granted"
        );
        Err(AuthFailure::permission_denied())
    }
}
