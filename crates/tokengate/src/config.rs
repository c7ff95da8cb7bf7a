//! Gate configuration
//!
//! Configuration is static for the life of the process: it is built once at
//! startup and handed to [`AuthGate::new`](crate::AuthGate::new). Nothing here
//! is re-specified per call.

use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{GateError, GateResult};

/// Path of the identity provider's published key set
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Environment variable names read by [`GateConfig::from_env`]
pub mod env {
    /// Identity-provider domain (required)
    pub const DOMAIN: &str = "TOKENGATE_DOMAIN";
    /// Expected `aud` claim (required)
    pub const AUDIENCE: &str = "TOKENGATE_AUDIENCE";
    /// Expected `iss` claim
    pub const ISSUER: &str = "TOKENGATE_ISSUER";
    /// JWKS endpoint override
    pub const JWKS_URI: &str = "TOKENGATE_JWKS_URI";
    /// Comma-separated accepted algorithms
    pub const ALGORITHMS: &str = "TOKENGATE_ALGORITHMS";
    /// Key-set cache TTL in seconds (0 disables caching)
    pub const JWKS_CACHE_TTL_SECS: &str = "TOKENGATE_JWKS_CACHE_TTL_SECS";
    /// JWKS fetch timeout in seconds
    pub const JWKS_TIMEOUT_SECS: &str = "TOKENGATE_JWKS_TIMEOUT_SECS";
    /// Expiry leeway in seconds
    pub const LEEWAY_SECS: &str = "TOKENGATE_LEEWAY_SECS";
}

fn default_algorithms() -> Vec<Algorithm> {
    vec![Algorithm::RS256]
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(600)
}

fn default_min_refresh_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Static configuration of the token gate
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tokengate::GateConfig;
///
/// let config = GateConfig::new("tenant.auth.example.com", "stock")
///     .with_cache_ttl(Duration::from_secs(300));
///
/// assert_eq!(config.issuer(), "https://tenant.auth.example.com/");
/// assert_eq!(
///     config.jwks_uri(),
///     "https://tenant.auth.example.com/.well-known/jwks.json"
/// );
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Identity-provider domain, e.g. `tenant.auth.example.com`
    pub domain: String,
    /// Expected `aud` claim
    pub audience: String,
    /// Expected `iss` claim (default: `https://<domain>/`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// JWKS endpoint (default: `https://<domain>/.well-known/jwks.json`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
    /// Accepted signature algorithms (RSA family only)
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<Algorithm>,
    /// Clock skew tolerated on `exp`/`nbf`, in seconds
    #[serde(default)]
    pub leeway_secs: u64,
    /// Key-set cache TTL; zero fetches the key set on every verification
    #[serde(default = "default_cache_ttl")]
    pub jwks_cache_ttl: Duration,
    /// Minimum time between forced key-set refreshes
    #[serde(default = "default_min_refresh_interval")]
    pub min_refresh_interval: Duration,
    /// Upper bound on a single key-set fetch
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: Duration,
}

impl GateConfig {
    /// Create a configuration for an identity-provider domain and API audience
    pub fn new(domain: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            audience: audience.into(),
            issuer: None,
            jwks_uri: None,
            algorithms: default_algorithms(),
            leeway_secs: 0,
            jwks_cache_ttl: default_cache_ttl(),
            min_refresh_interval: default_min_refresh_interval(),
            fetch_timeout: default_fetch_timeout(),
        }
    }

    /// Load configuration from `TOKENGATE_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Configuration`] if a required variable is missing or
    /// a value cannot be parsed.
    pub fn from_env() -> GateResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Same as [`GateConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> GateResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| GateError::Configuration(format!("{name} is not set")))
        };
        let seconds = |name: &str| -> GateResult<Option<u64>> {
            lookup(name)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|e| {
                        GateError::Configuration(format!("{name}={raw:?} is not a number: {e}"))
                    })
                })
                .transpose()
        };

        let mut config = Self::new(required(env::DOMAIN)?, required(env::AUDIENCE)?);
        config.issuer = lookup(env::ISSUER);
        config.jwks_uri = lookup(env::JWKS_URI);

        if let Some(raw) = lookup(env::ALGORITHMS) {
            config.algorithms = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|name| {
                    Algorithm::from_str(name).map_err(|e| {
                        GateError::Configuration(format!("unknown algorithm {name:?}: {e}"))
                    })
                })
                .collect::<GateResult<Vec<_>>>()?;
        }
        if let Some(ttl) = seconds(env::JWKS_CACHE_TTL_SECS)? {
            config.jwks_cache_ttl = Duration::from_secs(ttl);
        }
        if let Some(timeout) = seconds(env::JWKS_TIMEOUT_SECS)? {
            config.fetch_timeout = Duration::from_secs(timeout);
        }
        if let Some(leeway) = seconds(env::LEEWAY_SECS)? {
            config.leeway_secs = leeway;
        }

        Ok(config)
    }

    /// Override the expected issuer
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Override the JWKS endpoint
    #[must_use]
    pub fn with_jwks_uri(mut self, jwks_uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(jwks_uri.into());
        self
    }

    /// Set accepted algorithms
    #[must_use]
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// Set clock skew leeway
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway_secs = leeway.as_secs();
        self
    }

    /// Set key-set cache TTL
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl = ttl;
        self
    }

    /// Fetch the key set on every verification
    #[must_use]
    pub fn without_cache(self) -> Self {
        self.with_cache_ttl(Duration::ZERO)
    }

    /// Set minimum interval between forced refreshes
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Set key-set fetch timeout
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Expected `iss` claim
    pub fn issuer(&self) -> String {
        self.issuer
            .clone()
            .unwrap_or_else(|| format!("https://{}/", self.domain))
    }

    /// JWKS endpoint
    pub fn jwks_uri(&self) -> String {
        self.jwks_uri
            .clone()
            .unwrap_or_else(|| format!("https://{}{}", self.domain, JWKS_PATH))
    }

    /// Whether the key set is cached between verifications
    pub fn caching_enabled(&self) -> bool {
        !self.jwks_cache_ttl.is_zero()
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Configuration`] when:
    /// - domain, audience or issuer is empty, or the domain is not a bare host
    /// - no algorithm is configured, or one is outside the RSA family
    /// - the JWKS URI is not HTTPS (plain HTTP is only accepted for loopback hosts)
    /// - the fetch timeout is zero
    pub fn validate(&self) -> GateResult<()> {
        let domain = self.domain.trim();
        if domain.is_empty() {
            return Err(GateError::Configuration("domain must not be empty".into()));
        }
        if domain.contains("://") || domain.contains('/') || domain.contains(char::is_whitespace)
        {
            return Err(GateError::Configuration(format!(
                "domain must be a bare host name, got {:?}",
                self.domain
            )));
        }
        if self.audience.trim().is_empty() {
            return Err(GateError::Configuration("audience must not be empty".into()));
        }
        if self.issuer().trim().is_empty() {
            return Err(GateError::Configuration("issuer must not be empty".into()));
        }

        if self.algorithms.is_empty() {
            return Err(GateError::Configuration(
                "at least one algorithm must be accepted".into(),
            ));
        }
        if let Some(alg) = self.algorithms.iter().find(|alg| !is_rsa_family(**alg)) {
            return Err(GateError::Configuration(format!(
                "algorithm {alg:?} cannot verify RSA signing keys"
            )));
        }

        if self.fetch_timeout.is_zero() {
            return Err(GateError::Configuration(
                "fetch timeout must be greater than zero".into(),
            ));
        }

        validate_jwks_uri(&self.jwks_uri())
    }
}

fn is_rsa_family(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

fn validate_jwks_uri(jwks_uri: &str) -> GateResult<()> {
    let url = Url::parse(jwks_uri)
        .map_err(|e| GateError::Configuration(format!("invalid JWKS URI {jwks_uri:?}: {e}")))?;

    match url.scheme() {
        "https" => Ok(()),
        "http" if is_loopback(&url) => Ok(()),
        _ => Err(GateError::Configuration(format!(
            "JWKS URI must use HTTPS (HTTP only allowed for loopback hosts), got {jwks_uri:?}"
        ))),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(host)) => host.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
