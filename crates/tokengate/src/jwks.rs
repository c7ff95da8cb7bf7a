//! JWKS (JSON Web Key Set) resolution and caching
//!
//! The resolver fetches the identity provider's published key set and selects
//! the key matching a token's `kid`:
//!
//! - **Single attempt**: a fetch is never retried; transport errors surface as
//!   [`GateError::KeySetUnavailable`]
//! - **Bounded**: every fetch is limited by the configured timeout, and
//!   dropping the future cancels it
//! - **TTL cache**: many concurrent readers, refreshes serialized behind one lock
//! - **Refresh on miss**: an unknown `kid` forces one (rate limited) refresh
//!   before the token is rejected, which covers key rotation
//!
//! A zero TTL disables the cache and fetches the key set on every call.

use std::time::{Duration, Instant};

use jsonwebtoken::errors::{ErrorKind, Result as JwtResult};
use jsonwebtoken::{DecodingKey, decode_header};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::GateConfig;
use crate::error::{AuthFailure, GateError, GateResult};

/// One entry of the identity provider's key set
///
/// Fields are optional on the wire so a key set containing entries of other
/// key types still deserializes; only the entry actually selected must be a
/// usable RSA key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    /// Key type (`RSA`)
    #[serde(default)]
    pub kty: String,

    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Public key use (`sig`)
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Intended algorithm, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// RSA modulus (base64url)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent (base64url)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl SigningKey {
    /// Build an RSA signing key from its components
    pub fn rsa(kid: impl Into<String>, n: impl Into<String>, e: impl Into<String>) -> Self {
        Self {
            kty: "RSA".to_string(),
            kid: Some(kid.into()),
            key_use: Some("sig".to_string()),
            alg: None,
            n: Some(n.into()),
            e: Some(e.into()),
        }
    }

    /// Key ID, if the entry has one
    pub fn key_id(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Convert to a `jsonwebtoken` decoding key
    ///
    /// # Errors
    ///
    /// Fails with `InvalidKeyFormat` if the entry is not an RSA key with both
    /// modulus and exponent, or if the components are not valid base64url.
    pub fn to_decoding_key(&self) -> JwtResult<DecodingKey> {
        if self.kty != "RSA" {
            return Err(ErrorKind::InvalidKeyFormat.into());
        }
        match (self.n.as_deref(), self.e.as_deref()) {
            (Some(n), Some(e)) => DecodingKey::from_rsa_components(n, e),
            _ => Err(ErrorKind::InvalidKeyFormat.into()),
        }
    }
}

/// The identity provider's published key set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    /// Keys in publication order
    #[serde(default)]
    pub keys: Vec<SigningKey>,
}

impl KeySet {
    /// Create a key set
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }

    /// First key whose `kid` matches
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|key| key.key_id() == Some(kid))
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Read the `kid` from a token's header without verifying anything
///
/// # Errors
///
/// - `invalid_token` if the header segment cannot be decoded
/// - `invalid_header` if the header has no `kid`
pub fn peek_key_id(token: &str) -> Result<String, AuthFailure> {
    let header = decode_header(token).map_err(|e| {
        debug!(error = %e, "Failed to decode JWT header");
        AuthFailure::invalid_token()
    })?;

    header.kid.ok_or_else(|| {
        debug!("JWT missing kid (key ID) in header");
        AuthFailure::missing_key_id()
    })
}

/// Key set cache entry
#[derive(Debug, Clone)]
struct CachedKeySet {
    keys: KeySet,
    fetched_at: Instant,
    ttl: Duration,
}

impl CachedKeySet {
    fn is_valid(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }
}

/// Resolves signing keys from the identity provider's JWKS endpoint
///
/// # Example
///
/// ```rust,no_run
/// # use tokengate::{GateConfig, KeySetResolver};
/// # tokio_test::block_on(async {
/// let config = GateConfig::new("tenant.auth.example.com", "stock");
/// let resolver = KeySetResolver::new(&config)?;
///
/// # let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6ImsxIn0.e30.sig";
/// let key = resolver.resolve_key(token).await?;
/// println!("verifying with key {:?}", key.kid);
/// # Ok::<(), tokengate::GateError>(())
/// # });
/// ```
#[derive(Debug)]
pub struct KeySetResolver {
    /// JWKS endpoint URL
    jwks_uri: String,
    /// HTTP client (timeout applied per request)
    http_client: reqwest::Client,
    /// Cached key set
    cache: RwLock<Option<CachedKeySet>>,
    /// Serializes fetches; holds the time of the last successful fetch
    refresh_state: Mutex<Option<Instant>>,
    /// Cache TTL (zero disables caching)
    cache_ttl: Duration,
    /// Minimum interval between forced refreshes
    min_refresh_interval: Duration,
}

impl KeySetResolver {
    /// Create a resolver for the configured JWKS endpoint
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: &GateConfig) -> GateResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| GateError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            jwks_uri: config.jwks_uri(),
            http_client,
            cache: RwLock::new(None),
            refresh_state: Mutex::new(None),
            cache_ttl: config.jwks_cache_ttl,
            min_refresh_interval: config.min_refresh_interval,
        })
    }

    /// Resolve the signing key for a token
    ///
    /// # Errors
    ///
    /// - `invalid_token` if the token header is undecodable
    /// - `invalid_header` if the header has no `kid`, or no published key matches it
    /// - [`GateError::KeySetUnavailable`] if the key set cannot be fetched
    pub async fn resolve_key(&self, token: &str) -> GateResult<SigningKey> {
        let kid = peek_key_id(token)?;

        let keys = self.key_set().await?;
        if let Some(key) = keys.find(&kid) {
            debug!(kid = %kid, "Resolved signing key");
            return Ok(key.clone());
        }

        if self.caching_enabled() {
            debug!(kid = %kid, "Key ID not in cached JWKS, refreshing");
            let keys = self.refresh().await?;
            if let Some(key) = keys.find(&kid) {
                info!(kid = %kid, "Resolved signing key after JWKS refresh");
                return Ok(key.clone());
            }
        }

        warn!(kid = %kid, jwks_uri = %self.jwks_uri, "Key ID not found in JWKS");
        Err(AuthFailure::no_matching_key().into())
    }

    /// Get the key set (from cache or fetch if needed)
    ///
    /// # Errors
    ///
    /// Returns [`GateError::KeySetUnavailable`] if a fetch is needed and fails.
    pub async fn key_set(&self) -> GateResult<KeySet> {
        if !self.caching_enabled() {
            return self.fetch().await;
        }

        if let Some(keys) = self.cached().await {
            debug!(jwks_uri = %self.jwks_uri, "Using cached JWKS");
            return Ok(keys);
        }

        let mut last_fetch = self.refresh_state.lock().await;
        // Another task may have fetched while we waited for the lock
        if let Some(keys) = self.cached().await {
            debug!(jwks_uri = %self.jwks_uri, "Using JWKS fetched by concurrent request");
            return Ok(keys);
        }

        let keys = self.fetch().await?;
        self.store(&keys).await;
        *last_fetch = Some(Instant::now());
        Ok(keys)
    }

    /// Force a key set refresh, ignoring the cache TTL
    ///
    /// Refreshes closer together than the minimum refresh interval return the
    /// cached set instead of hitting the endpoint again.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::KeySetUnavailable`] if the fetch fails.
    pub async fn refresh(&self) -> GateResult<KeySet> {
        let mut last_fetch = self.refresh_state.lock().await;

        if let Some(last) = *last_fetch
            && last.elapsed() < self.min_refresh_interval
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                warn!(
                    jwks_uri = %self.jwks_uri,
                    since_last_ms = last.elapsed().as_millis(),
                    "JWKS refresh rate limited, using cache"
                );
                return Ok(cached.keys.clone());
            }
        }

        let keys = self.fetch().await?;
        self.store(&keys).await;
        *last_fetch = Some(Instant::now());
        Ok(keys)
    }

    /// Get the JWKS endpoint URI
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Whether key sets are cached between calls
    pub fn caching_enabled(&self) -> bool {
        !self.cache_ttl.is_zero()
    }

    /// Clear the cache
    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
        debug!(jwks_uri = %self.jwks_uri, "JWKS cache cleared");
    }

    async fn cached(&self) -> Option<KeySet> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.is_valid())
            .map(|cached| cached.keys.clone())
    }

    async fn store(&self, keys: &KeySet) {
        *self.cache.write().await = Some(CachedKeySet {
            keys: keys.clone(),
            fetched_at: Instant::now(),
            ttl: self.cache_ttl,
        });
    }

    /// Fetch the key set from the endpoint
    async fn fetch(&self) -> GateResult<KeySet> {
        info!(jwks_uri = %self.jwks_uri, "Fetching JWKS from endpoint");

        let response = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| {
                error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                self.unavailable(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                jwks_uri = %self.jwks_uri,
                status = %status,
                "JWKS endpoint returned error status"
            );
            return Err(self.unavailable(format!("endpoint returned status {status}")));
        }

        let keys: KeySet = response.json().await.map_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to parse JWKS JSON");
            self.unavailable(format!("invalid JWKS format: {e}"))
        })?;

        info!(
            jwks_uri = %self.jwks_uri,
            key_count = keys.len(),
            "Successfully fetched JWKS"
        );
        Ok(keys)
    }

    fn unavailable(&self, reason: String) -> GateError {
        GateError::KeySetUnavailable {
            uri: self.jwks_uri.clone(),
            reason,
        }
    }
}
