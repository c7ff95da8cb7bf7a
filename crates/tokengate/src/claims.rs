//! Decoded token claims

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim carrying the token's granted permissions (RBAC)
pub const PERMISSIONS_CLAIM: &str = "permissions";

/// Decoded payload of a verified token
///
/// The mapping is kept exactly as the identity provider issued it: no claim is
/// stripped or normalized. Ownership passes to the protected operation; the
/// gate keeps no copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    /// Wrap an existing claim mapping
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// Look up a claim by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Check whether a claim is present (even if `null`)
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Issuer (`iss`)
    pub fn issuer(&self) -> Option<&str> {
        self.get("iss").and_then(Value::as_str)
    }

    /// Subject (`sub`)
    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(Value::as_str)
    }

    /// Audience (`aud`), which may be a single string or an array
    pub fn audience(&self) -> Vec<&str> {
        match self.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(auds)) => auds.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Expiration time (`exp`) as a Unix timestamp
    pub fn expires_at(&self) -> Option<u64> {
        self.get("exp").and_then(Value::as_u64)
    }

    /// Granted permissions
    ///
    /// `None` when the token has no permissions claim. A claim that is not an
    /// array yields an empty list; non-string entries are skipped.
    pub fn permissions(&self) -> Option<Vec<&str>> {
        self.get(PERMISSIONS_CLAIM).map(|value| match value {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        })
    }

    /// Exact, case-sensitive permission membership
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions()
            .is_some_and(|granted| granted.contains(&permission))
    }

    /// Borrow the raw mapping
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Take the raw mapping
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(claims: Map<String, Value>) -> Self {
        Self(claims)
    }
}
