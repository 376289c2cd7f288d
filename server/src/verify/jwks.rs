//! JWKS cache with rate-limited refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::VerifyError;

/// Minimum interval between unforced JWKS refreshes (5 minutes).
const JWKS_REFRESH_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Deserialize)]
struct JwkEntry {
    kid: Option<String>,
    kty: String,
    #[serde(default)]
    alg: Option<String>,
    // RSA fields
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
    // EC fields
    #[serde(default)]
    crv: Option<String>,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<JwkEntry>,
}

/// Caches signing keys fetched from the provider's JWKS endpoint.
///
/// Lookups refresh the cache when the requested `kid` is missing, rate-limited
/// so a flood of bad tokens cannot hammer the provider. A forced refresh
/// bypasses the rate limit; the verifier uses it once after a signature
/// failure so key rotation never rejects a valid token.
pub struct JwksCache {
    keys: RwLock<HashMap<String, (Algorithm, DecodingKey)>>,
    jwks_url: String,
    http: reqwest::Client,
    last_refresh: RwLock<Instant>,
}

impl JwksCache {
    pub fn new(jwks_url: String, http: reqwest::Client) -> Arc<Self> {
        Arc::new(Self {
            keys: RwLock::new(HashMap::new()),
            jwks_url,
            http,
            // Backdated so the first lookup triggers a refresh.
            last_refresh: RwLock::new(
                Instant::now() - std::time::Duration::from_secs(JWKS_REFRESH_INTERVAL_SECS + 1),
            ),
        })
    }

    /// Test-only cache with pre-loaded keys and no HTTP fetching.
    #[cfg(test)]
    pub(crate) fn with_keys(keys: HashMap<String, (Algorithm, DecodingKey)>) -> Arc<Self> {
        Self::with_keys_at(keys, String::new())
    }

    /// Test-only cache with pre-loaded keys, treated as freshly refreshed,
    /// backed by the given JWKS endpoint.
    #[cfg(test)]
    pub(crate) fn with_keys_at(
        keys: HashMap<String, (Algorithm, DecodingKey)>,
        jwks_url: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            keys: RwLock::new(keys),
            jwks_url,
            http: reqwest::Client::new(),
            last_refresh: RwLock::new(Instant::now()),
        })
    }

    /// Get the decoding key for a `kid`, refreshing the cache on a miss.
    ///
    /// A miss goes through the rate-limited refresh first; when the rate
    /// limit suppressed that fetch the key may have rotated inside the
    /// window, so one forced fetch runs before giving up. A key still absent
    /// after a genuine fetch was signed by a key the provider no longer
    /// publishes, which is a signature failure, not a fetch failure.
    pub async fn get_key(&self, kid: &str) -> Result<(Algorithm, DecodingKey), VerifyError> {
        {
            let keys = self.keys.read().await;
            if let Some((alg, key)) = keys.get(kid) {
                return Ok((*alg, key.clone()));
            }
        }

        let fetched = self.refresh(false).await?;

        {
            let keys = self.keys.read().await;
            if let Some((alg, key)) = keys.get(kid) {
                return Ok((*alg, key.clone()));
            }
        }

        if !fetched && self.refresh(true).await.is_err() {
            return Err(VerifyError::InvalidSignature);
        }

        let keys = self.keys.read().await;
        keys.get(kid)
            .map(|(alg, key)| (*alg, key.clone()))
            .ok_or(VerifyError::InvalidSignature)
    }

    /// Fetch the JWKS document and replace the cache. Unforced refreshes are
    /// rate-limited to once per interval; `Ok(false)` means the rate limit
    /// suppressed the fetch.
    pub async fn refresh(&self, force: bool) -> Result<bool, VerifyError> {
        if !force {
            let last = self.last_refresh.read().await;
            if last.elapsed().as_secs() < JWKS_REFRESH_INTERVAL_SECS {
                return Ok(false);
            }
        }

        let resp = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| VerifyError::KeyFetchFailure(format!("JWKS fetch failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(VerifyError::KeyFetchFailure(format!(
                "JWKS fetch returned HTTP {status}"
            )));
        }

        let doc: JwksDocument = resp
            .json()
            .await
            .map_err(|e| VerifyError::KeyFetchFailure(format!("failed to parse JWKS: {e}")))?;

        let mut new_keys = HashMap::new();
        for jwk in &doc.keys {
            let kid = match &jwk.kid {
                Some(k) => k.clone(),
                None => continue,
            };

            let alg = jwk_algorithm(jwk);

            let decoding_key = match jwk.kty.as_str() {
                "RSA" => {
                    let n = jwk.n.as_deref().unwrap_or_default();
                    let e = jwk.e.as_deref().unwrap_or_default();
                    if n.is_empty() || e.is_empty() {
                        continue;
                    }
                    DecodingKey::from_rsa_components(n, e)
                        .map_err(|e| VerifyError::KeyFetchFailure(format!("invalid RSA JWK: {e}")))?
                }
                "EC" => {
                    let x = jwk.x.as_deref().unwrap_or_default();
                    let y = jwk.y.as_deref().unwrap_or_default();
                    if x.is_empty() || y.is_empty() {
                        continue;
                    }
                    DecodingKey::from_ec_components(x, y)
                        .map_err(|e| VerifyError::KeyFetchFailure(format!("invalid EC JWK: {e}")))?
                }
                _ => continue,
            };

            new_keys.insert(kid, (alg, decoding_key));
        }

        *self.keys.write().await = new_keys;
        *self.last_refresh.write().await = Instant::now();

        tracing::debug!(
            event = "jwks_refreshed",
            forced = force,
            "JWKS cache refreshed"
        );
        Ok(true)
    }
}

/// Determine the JWT algorithm for a JWK entry.
fn jwk_algorithm(jwk: &JwkEntry) -> Algorithm {
    if let Some(alg) = &jwk.alg {
        match alg.as_str() {
            "RS384" => return Algorithm::RS384,
            "RS512" => return Algorithm::RS512,
            "ES256" => return Algorithm::ES256,
            "ES384" => return Algorithm::ES384,
            "RS256" => return Algorithm::RS256,
            _ if jwk.kty == "RSA" => return Algorithm::RS256,
            _ => {}
        }
    }
    match jwk.kty.as_str() {
        "EC" => match jwk.crv.as_deref() {
            Some("P-384") => Algorithm::ES384,
            _ => Algorithm::ES256,
        },
        _ => Algorithm::RS256,
    }
}
