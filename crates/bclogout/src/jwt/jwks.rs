//! JWKS (JSON Web Key Set) fetching and caching
//!
//! - **TTL-based caching**: 10 minutes by default
//! - **Refresh on unknown key**: a missing `kid` triggers one refresh
//! - **Rate limiting**: refreshes closer than the minimum interval reuse the cache
//!
//! Endpoints must use HTTPS; plain HTTP is accepted only for loopback hosts.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::JwtError;

/// Default cache lifetime of a fetched key set
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Default minimum interval between forced refreshes
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    cached_at: SystemTime,
    ttl: Duration,
}

impl CachedJwks {
    fn is_valid(&self) -> bool {
        match SystemTime::now().duration_since(self.cached_at) {
            Ok(age) => age < self.ttl,
            // Clock went backwards
            Err(_) => false,
        }
    }
}

/// Fetches and caches the key set of one JWKS endpoint
#[derive(Debug, Clone)]
pub struct JwksClient {
    jwks_uri: String,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    http_client: reqwest::Client,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    last_refresh: Arc<RwLock<Option<SystemTime>>>,
}

impl JwksClient {
    /// Create a client for `jwks_uri` sharing `http_client`
    pub fn new(jwks_uri: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            cache: Arc::new(RwLock::new(None)),
            http_client,
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            last_refresh: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the cache lifetime
    pub fn with_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Set the minimum interval between forced refreshes
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// The endpoint this client reads from
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// The key set, from cache when still fresh
    ///
    /// # Errors
    ///
    /// Returns [`JwtError`] if the endpoint is insecure, unreachable, answers
    /// with an error status, or does not return a key set.
    pub async fn get_jwks(&self) -> Result<JwkSet, JwtError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.is_valid()
            {
                debug!(jwks_uri = %self.jwks_uri, "Using cached JWKS");
                return Ok(cached.jwks.clone());
            }
        }

        self.fetch_and_cache().await
    }

    /// Fetch the key set again, unless the last fetch was too recent
    ///
    /// # Errors
    ///
    /// See [`Self::get_jwks`].
    pub async fn refresh(&self) -> Result<JwkSet, JwtError> {
        {
            let last_refresh = self.last_refresh.read().await;
            if let Some(last) = *last_refresh
                && let Ok(since_last) = SystemTime::now().duration_since(last)
                && since_last < self.min_refresh_interval
            {
                warn!(
                    jwks_uri = %self.jwks_uri,
                    since_last_ms = since_last.as_millis(),
                    "JWKS refresh rate limited, using cache"
                );
                return self.get_jwks().await;
            }
        }

        self.fetch_and_cache().await
    }

    /// Drop the cached key set
    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
        debug!(jwks_uri = %self.jwks_uri, "JWKS cache cleared");
    }

    async fn fetch_and_cache(&self) -> Result<JwkSet, JwtError> {
        if !is_allowed_endpoint(&self.jwks_uri) {
            return Err(JwtError::InsecureJwksUri(self.jwks_uri.clone()));
        }

        info!(jwks_uri = %self.jwks_uri, "Fetching JWKS from endpoint");

        let response = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| {
                error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                JwtError::Fetch(e.to_string())
            })?;

        if !response.status().is_success() {
            error!(
                jwks_uri = %self.jwks_uri,
                status = %response.status(),
                "JWKS endpoint returned error status"
            );
            return Err(JwtError::Status(response.status().as_u16()));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to parse JWKS JSON");
            JwtError::InvalidJwks(e.to_string())
        })?;

        info!(
            jwks_uri = %self.jwks_uri,
            key_count = jwks.keys.len(),
            "Fetched JWKS"
        );

        let now = SystemTime::now();
        *self.cache.write().await = Some(CachedJwks {
            jwks: jwks.clone(),
            cached_at: now,
            ttl: self.cache_ttl,
        });
        *self.last_refresh.write().await = Some(now);

        Ok(jwks)
    }
}

fn is_allowed_endpoint(uri: &str) -> bool {
    let Ok(url) = reqwest::Url::parse(uri) else {
        return false;
    };
    match url.scheme() {
        "https" => true,
        "http" => matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]")),
        _ => false,
    }
}

/// JWKS clients keyed by endpoint, sharing one HTTP client
#[derive(Debug, Clone)]
pub struct JwksCache {
    clients: Arc<DashMap<String, Arc<JwksClient>>>,
    http_client: reqwest::Client,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
}

impl JwksCache {
    /// Create a cache with a default HTTP client
    ///
    /// # Errors
    ///
    /// [`JwtError::HttpClient`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, JwtError> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| JwtError::HttpClient(e.to_string()))?;
        Ok(Self::with_http_client(http_client))
    }

    /// Create a cache around an existing HTTP client
    pub fn with_http_client(http_client: reqwest::Client) -> Self {
        Self {
            clients: Arc::new(DashMap::new()),
            http_client,
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    /// Set the lifetime of key sets fetched by new clients
    pub fn with_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Set the minimum refresh interval of new clients
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// The client for `jwks_uri`, created on first use
    pub fn client(&self, jwks_uri: &str) -> Arc<JwksClient> {
        let client = self
            .clients
            .entry(jwks_uri.to_string())
            .or_insert_with(|| {
                Arc::new(
                    JwksClient::new(jwks_uri, self.http_client.clone())
                        .with_ttl(self.cache_ttl)
                        .with_min_refresh_interval(self.min_refresh_interval),
                )
            });
        Arc::clone(client.value())
    }

    /// Number of endpoints seen so far
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no endpoint has been seen yet
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(uri: &str) -> JwksClient {
        JwksClient::new(uri, reqwest::Client::new())
    }

    #[test]
    fn test_jwks_client_defaults() {
        let client = client("https://idp.example.com/jwks");
        assert_eq!(client.jwks_uri(), "https://idp.example.com/jwks");
        assert_eq!(client.cache_ttl, DEFAULT_CACHE_TTL);
        assert_eq!(client.min_refresh_interval, DEFAULT_MIN_REFRESH_INTERVAL);
    }

    #[test]
    fn test_cached_jwks_expiry() {
        let fresh = CachedJwks {
            jwks: JwkSet { keys: vec![] },
            cached_at: SystemTime::now(),
            ttl: Duration::from_secs(600),
        };
        assert!(fresh.is_valid());

        let stale = CachedJwks {
            cached_at: SystemTime::now() - Duration::from_secs(700),
            ..fresh
        };
        assert!(!stale.is_valid());
    }

    #[test]
    fn test_allowed_endpoints() {
        assert!(is_allowed_endpoint("https://idp.example.com/jwks"));
        assert!(is_allowed_endpoint("http://localhost:8080/jwks"));
        assert!(is_allowed_endpoint("http://127.0.0.1:8080/jwks"));
        assert!(!is_allowed_endpoint("http://idp.example.com/jwks"));
        assert!(!is_allowed_endpoint("ftp://idp.example.com/jwks"));
    }

    #[test]
    fn test_loopback_lookalike_hosts_rejected() {
        assert!(is_allowed_endpoint("http://[::1]:8080/jwks"));
        assert!(is_allowed_endpoint("http://localhost/jwks"));
        assert!(!is_allowed_endpoint("http://localhost.attacker.example/jwks"));
        assert!(!is_allowed_endpoint("http://127.0.0.1.nip.io/jwks"));
        assert!(!is_allowed_endpoint("http://localhostevil.com/jwks"));
        assert!(!is_allowed_endpoint("http://user@localhost.attacker.example/jwks"));
        assert!(!is_allowed_endpoint("not a uri"));
    }

    #[tokio::test]
    async fn test_insecure_endpoint_rejected() {
        let err = client("http://idp.example.com/jwks").get_jwks().await.unwrap_err();
        assert!(matches!(err, JwtError::InsecureJwksUri(_)));
    }

    #[tokio::test]
    async fn test_cache_reuses_clients_per_endpoint() {
        let cache = JwksCache::with_http_client(reqwest::Client::new());
        let a = cache.client("https://a.example.com/jwks");
        let b = cache.client("https://a.example.com/jwks");
        let c = cache.client("https://c.example.com/jwks");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let client = client("https://idp.example.com/jwks");
        client.clear_cache().await;
        assert!(client.cache.read().await.is_none());
    }
}
