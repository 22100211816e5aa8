use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::SecurityConfig;
use crate::error::AuthError;

/// Raw JWK structure as returned by a JWKS endpoint.
/// Unknown fields are ignored; only the members needed to build a key are captured.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,
    /// Key type ("RSA" or "EC")
    pub kty: String,
    /// Algorithm (e.g. "RS256")
    #[serde(default)]
    pub alg: Option<String>,
    /// Public key use ("sig" or "enc")
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    /// RSA modulus (base64url)
    #[serde(default)]
    pub n: Option<String>,
    /// RSA exponent (base64url)
    #[serde(default)]
    pub e: Option<String>,
    /// EC curve name
    #[serde(default)]
    pub crv: Option<String>,
    /// EC x coordinate (base64url)
    #[serde(default)]
    pub x: Option<String>,
    /// EC y coordinate (base64url)
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<Jwk>,
}

/// A public verification key published by the identity provider.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    algorithm: Option<Algorithm>,
    key: DecodingKey,
}

impl SigningKey {
    pub fn new(kid: impl Into<String>, algorithm: Option<Algorithm>, key: DecodingKey) -> Self {
        Self {
            kid: kid.into(),
            algorithm,
            key,
        }
    }

    /// Build a key from a JWK entry.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, String> {
        let kid = jwk.kid.as_deref().ok_or("JWK missing 'kid'")?;
        let algorithm = jwk
            .alg
            .as_deref()
            .map(|alg| Algorithm::from_str(alg).map_err(|_| format!("unsupported alg '{alg}'")))
            .transpose()?;

        let key = match jwk.kty.as_str() {
            "RSA" => {
                let n = jwk.n.as_deref().ok_or("RSA key missing 'n' component")?;
                let e = jwk.e.as_deref().ok_or("RSA key missing 'e' component")?;
                DecodingKey::from_rsa_components(n, e)
                    .map_err(|err| format!("Failed to construct RSA decoding key: {err}"))?
            }
            "EC" => {
                let x = jwk.x.as_deref().ok_or("EC key missing 'x' coordinate")?;
                let y = jwk.y.as_deref().ok_or("EC key missing 'y' coordinate")?;
                DecodingKey::from_ec_components(x, y)
                    .map_err(|err| format!("Failed to construct EC decoding key: {err}"))?
            }
            other => return Err(format!("Unsupported key type: {other}")),
        };

        Ok(Self::new(kid, algorithm, key))
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Algorithm the key is published for, when the JWK declares one.
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// One generation of the provider's keys, in publication order.
///
/// A key set is immutable; refreshing the cache swaps in a new one.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: Vec<Arc<SigningKey>>,
    by_kid: HashMap<String, Arc<SigningKey>>,
}

impl KeySet {
    /// Build a key set, keeping the first key for any duplicated kid.
    pub fn new(keys: impl IntoIterator<Item = SigningKey>) -> Self {
        let mut set = KeySet::default();
        for key in keys {
            if set.by_kid.contains_key(key.kid()) {
                warn!(kid = %key.kid(), "Duplicate kid in JWKS, keeping first entry");
                continue;
            }
            let key = Arc::new(key);
            set.by_kid.insert(key.kid().to_string(), key.clone());
            set.keys.push(key);
        }
        set
    }

    /// Build a key set from a JWKS document. Encryption keys, keys without a
    /// kid, and unsupported key types are skipped.
    pub fn from_document(document: &JwksDocument) -> Self {
        let keys = document.keys.iter().filter_map(|jwk| {
            if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
                debug!(kid = ?jwk.kid, "Skipping non-signature JWK");
                return None;
            }
            match SigningKey::from_jwk(jwk) {
                Ok(key) => Some(key),
                Err(err) => {
                    warn!(kid = ?jwk.kid, error = %err, "Skipping unusable JWK");
                    None
                }
            }
        });
        Self::new(keys)
    }

    pub fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.by_kid.get(kid).cloned()
    }

    pub fn keys(&self) -> &[Arc<SigningKey>] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Cached state behind the lock.
#[derive(Default)]
struct CacheState {
    keys: Option<Arc<KeySet>>,
    last_refresh: Option<Instant>,
    last_attempt: Option<Instant>,
    /// Completed refresh attempts, successful or not.
    attempts: u64,
    /// Successful refreshes.
    generation: u64,
    last_error: Option<String>,
}

/// What a single lookup saw under the read lock.
struct Snapshot {
    key: Option<Arc<SigningKey>>,
    has_set: bool,
    observed: u64,
    last_refresh: Option<Instant>,
    last_attempt: Option<Instant>,
}

/// JWKS cache that stores the provider's public keys.
///
/// Keys are indexed by `kid`. When a requested `kid` is not found, the cache
/// refreshes from the JWKS endpoint once before failing. Concurrent misses
/// share a single outbound fetch: callers that queued behind an in-flight
/// refresh observe its outcome instead of fetching again.
///
/// When a refresh fails and a key set is already cached, known keys keep
/// being served.
pub struct JwksCache {
    state: RwLock<CacheState>,
    config: SecurityConfig,
    client: reqwest::Client,
    refresh_lock: Mutex<()>,
}

impl JwksCache {
    /// Create an empty cache. Keys are fetched on first use or by [`JwksCache::prefetch`].
    pub fn new(config: SecurityConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.jwks_fetch_timeout_secs))
            .build()
            .map_err(|e| AuthError::KeyFetchFailure(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            state: RwLock::new(CacheState::default()),
            config,
            client,
            refresh_lock: Mutex::new(()),
        })
    }

    /// Create a cache seeded with a key set, as if it had just been fetched.
    pub fn with_key_set(config: SecurityConfig, keys: KeySet) -> Result<Self, AuthError> {
        let cache = Self::new(config)?;
        let now = Instant::now();
        let state = CacheState {
            keys: Some(Arc::new(keys)),
            last_refresh: Some(now),
            last_attempt: Some(now),
            attempts: 1,
            generation: 1,
            last_error: None,
        };
        Ok(Self {
            state: RwLock::new(state),
            ..cache
        })
    }

    /// Fetch the key set now. Returns the number of usable keys.
    pub async fn prefetch(&self) -> Result<usize, AuthError> {
        let observed = self.state.read().await.attempts;
        let keys = self.refresh(observed).await?;
        Ok(keys.len())
    }

    /// Number of successful refreshes so far.
    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// The key set currently served, if any.
    pub async fn current(&self) -> Option<Arc<KeySet>> {
        self.state.read().await.keys.clone()
    }

    /// Retrieve the signing key for the given `kid`.
    ///
    /// A fresh hit is served directly. A stale hit triggers a refresh and falls
    /// back to the stale key if that refresh fails. A miss triggers one refresh
    /// (unless a successful refresh happened within the minimum interval) and
    /// returns `UnknownKeyId` if the kid is still absent. If no key set has ever
    /// been fetched and the fetch fails, returns `KeyFetchFailure`.
    pub async fn get(&self, kid: &str) -> Result<Arc<SigningKey>, AuthError> {
        let ttl = Duration::from_secs(self.config.jwks_cache_ttl_secs);
        let min_interval = Duration::from_secs(self.config.jwks_min_refresh_interval_secs);

        let snapshot = {
            let state = self.state.read().await;
            Snapshot {
                key: state.keys.as_ref().and_then(|set| set.get(kid)),
                has_set: state.keys.is_some(),
                observed: state.attempts,
                last_refresh: state.last_refresh,
                last_attempt: state.last_attempt,
            }
        };
        let observed = snapshot.observed;

        match snapshot.key {
            Some(key) if !is_stale(snapshot.last_refresh, ttl) => Ok(key),
            Some(stale_key) => {
                if has_recent(snapshot.last_attempt, min_interval) {
                    return Ok(stale_key);
                }
                match self.refresh(observed).await {
                    Ok(set) => set.get(kid).ok_or_else(|| {
                        warn!(kid = %kid, "Signing key was removed from the JWKS");
                        AuthError::UnknownKeyId(kid.to_string())
                    }),
                    Err(err) => {
                        warn!(kid = %kid, error = %err, "JWKS refresh failed, serving stale key");
                        Ok(stale_key)
                    }
                }
            }
            None => {
                if snapshot.has_set && has_recent(snapshot.last_refresh, min_interval) {
                    debug!(kid = %kid, "Unknown kid, refresh throttled");
                    return Err(AuthError::UnknownKeyId(kid.to_string()));
                }
                match self.refresh(observed).await {
                    Ok(set) => set
                        .get(kid)
                        .ok_or_else(|| AuthError::UnknownKeyId(kid.to_string())),
                    Err(err) => {
                        if self.state.read().await.keys.is_none() {
                            return Err(err);
                        }
                        warn!(kid = %kid, error = %err, "JWKS refresh failed for unknown kid");
                        Err(AuthError::UnknownKeyId(kid.to_string()))
                    }
                }
            }
        }
    }

    /// Refresh the key set unless another caller completed an attempt after
    /// `observed`, in which case that attempt's outcome is returned.
    async fn refresh(&self, observed: u64) -> Result<Arc<KeySet>, AuthError> {
        let _guard = self.refresh_lock.lock().await;

        {
            let state = self.state.read().await;
            if state.attempts != observed {
                debug!("Sharing result of concurrent JWKS refresh");
                return match &state.last_error {
                    Some(err) => Err(AuthError::KeyFetchFailure(err.clone())),
                    None => state
                        .keys
                        .clone()
                        .ok_or_else(|| AuthError::KeyFetchFailure("no key set available".into())),
                };
            }
        }

        let outcome = self.fetch().await;

        let now = Instant::now();
        let mut state = self.state.write().await;
        state.attempts += 1;
        state.last_attempt = Some(now);
        match outcome {
            Ok(set) => {
                let set = Arc::new(set);
                state.keys = Some(set.clone());
                state.last_refresh = Some(now);
                state.generation += 1;
                state.last_error = None;
                info!(keys = set.len(), generation = state.generation, "JWKS refreshed");
                Ok(set)
            }
            Err(err) => {
                warn!(url = %self.config.jwks_url, error = %err, "JWKS fetch failed");
                state.last_error = Some(match &err {
                    AuthError::KeyFetchFailure(msg) => msg.clone(),
                    other => other.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn fetch(&self) -> Result<KeySet, AuthError> {
        let response = self
            .client
            .get(&self.config.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::KeyFetchFailure(e.to_string()))?;

        let response = response
            .error_for_status()
            .map_err(|e| AuthError::KeyFetchFailure(e.to_string()))?;

        let document: JwksDocument = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetchFailure(format!("Failed to parse JWKS: {e}")))?;

        let set = KeySet::from_document(&document);
        if set.is_empty() {
            return Err(AuthError::KeyFetchFailure(
                "JWKS contains no usable signing keys".into(),
            ));
        }
        Ok(set)
    }
}

fn is_stale(last_refresh: Option<Instant>, ttl: Duration) -> bool {
    match last_refresh {
        None => true,
        Some(ts) => ts.elapsed() >= ttl,
    }
}

fn has_recent(last: Option<Instant>, min_interval: Duration) -> bool {
    match last {
        None => false,
        Some(ts) => ts.elapsed() < min_interval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa_jwk(kid: Option<&str>, key_use: Option<&str>) -> Jwk {
        Jwk {
            kid: kid.map(String::from),
            kty: "RSA".into(),
            alg: Some("RS256".into()),
            key_use: key_use.map(String::from),
            n: Some("AQAB".into()),
            e: Some("AQAB".into()),
            crv: None,
            x: None,
            y: None,
        }
    }

    #[test]
    fn stale_when_never_refreshed() {
        assert!(is_stale(None, Duration::from_secs(60)));
    }

    #[test]
    fn stale_when_ttl_elapsed() {
        let ts = Instant::now() - Duration::from_secs(61);
        assert!(is_stale(Some(ts), Duration::from_secs(60)));
    }

    #[test]
    fn not_stale_before_ttl() {
        let ts = Instant::now() - Duration::from_secs(10);
        assert!(!is_stale(Some(ts), Duration::from_secs(60)));
    }

    #[test]
    fn recent_only_within_interval() {
        assert!(!has_recent(None, Duration::from_secs(10)));
        assert!(has_recent(Some(Instant::now() - Duration::from_secs(3)), Duration::from_secs(10)));
        assert!(!has_recent(Some(Instant::now() - Duration::from_secs(11)), Duration::from_secs(10)));
    }

    #[test]
    fn zero_interval_never_recent() {
        assert!(!has_recent(Some(Instant::now()), Duration::ZERO));
    }

    #[test]
    fn key_set_skips_unusable_entries() {
        let mut unsupported = rsa_jwk(Some("oct"), None);
        unsupported.kty = "oct".into();
        let document = JwksDocument {
            keys: vec![
                rsa_jwk(Some("k1"), Some("sig")),
                rsa_jwk(None, Some("sig")),
                rsa_jwk(Some("enc"), Some("enc")),
                unsupported,
                rsa_jwk(Some("k2"), None),
            ],
        };
        let set = KeySet::from_document(&document);
        let kids: Vec<_> = set.keys().iter().map(|k| k.kid().to_string()).collect();
        assert_eq!(kids, vec!["k1", "k2"]);
        assert_eq!(set.get("k1").unwrap().algorithm(), Some(Algorithm::RS256));
        assert!(set.get("enc").is_none());
    }

    #[test]
    fn key_set_keeps_first_duplicate() {
        let mut second = rsa_jwk(Some("k1"), None);
        second.alg = Some("RS512".into());
        let document = JwksDocument {
            keys: vec![rsa_jwk(Some("k1"), None), second],
        };
        let set = KeySet::from_document(&document);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("k1").unwrap().algorithm(), Some(Algorithm::RS256));
    }

    #[test]
    fn jwks_document_parses_provider_json() {
        let json = r#"{"keys":[{"alg":"RS256","kty":"RSA","use":"sig","n":"AQAB","e":"AQAB","kid":"abc","x5t":"ignored","x5c":["ignored"]}]}"#;
        let document: JwksDocument = serde_json::from_str(json).unwrap();
        let set = KeySet::from_document(&document);
        assert_eq!(set.len(), 1);
        assert!(set.get("abc").is_some());
    }

    #[tokio::test]
    async fn seeded_cache_serves_known_kid_without_fetching() {
        let config = SecurityConfig::new("http://127.0.0.1:9/jwks.json", "iss", "aud");
        let set = KeySet::from_document(&JwksDocument {
            keys: vec![rsa_jwk(Some("k1"), None)],
        });
        let cache = JwksCache::with_key_set(config, set).unwrap();
        assert_eq!(cache.get("k1").await.unwrap().kid(), "k1");
        assert_eq!(cache.generation().await, 1);
    }

    #[tokio::test]
    async fn throttled_miss_is_unknown_kid() {
        let config = SecurityConfig::new("http://127.0.0.1:9/jwks.json", "iss", "aud");
        let set = KeySet::from_document(&JwksDocument {
            keys: vec![rsa_jwk(Some("k1"), None)],
        });
        let cache = JwksCache::with_key_set(config, set).unwrap();
        let err = cache.get("other").await.unwrap_err();
        assert_eq!(err, AuthError::UnknownKeyId("other".into()));
    }
}
