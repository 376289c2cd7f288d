//! Credential verification against the identity provider.
//!
//! Two modes for two credential shapes: JWT access tokens are verified
//! locally against the provider's JWKS, opaque OAuth/session tokens are
//! verified online via the provider's authenticate endpoint. The split is
//! dispatch over credential kind, not two unrelated features.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::Value;

use prism_core::profile::VerifiedIdentity;

use crate::config::ProviderConfig;

pub mod jwks;

use jwks::JwksCache;

/// Bounded timeout for provider round-trips.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token issuer mismatch")]
    IssuerMismatch,
    #[error("token audience mismatch")]
    AudienceMismatch,
    #[error("failed to fetch signing keys: {0}")]
    KeyFetchFailure(String),
    #[error("malformed credential: {0}")]
    MalformedCredential(String),
    #[error("provider configuration incomplete: {0}")]
    Misconfigured(&'static str),
    #[error("provider rejected credential: HTTP {status}")]
    ProviderRejected { status: u16, body: String },
    #[error("transport failure contacting provider: {0}")]
    Transport(String),
}

#[derive(Clone)]
pub struct TokenVerifier {
    config: Arc<ProviderConfig>,
    jwks: Arc<JwksCache>,
    http: reqwest::Client,
}

impl TokenVerifier {
    pub fn new(config: Arc<ProviderConfig>) -> Self {
        let http = reqwest::Client::new();
        let jwks = JwksCache::new(config.jwks_url.clone(), http.clone());
        Self { config, jwks, http }
    }

    #[cfg(test)]
    pub(crate) fn with_jwks(config: Arc<ProviderConfig>, jwks: Arc<JwksCache>) -> Self {
        Self {
            config,
            jwks,
            http: reqwest::Client::new(),
        }
    }

    /// Verify a JWT access token: signature via JWKS, issuer == authorization
    /// server, audience == project id, `exp` and `iat` enforced.
    ///
    /// A signature failure triggers one forced JWKS refresh and a retry, so a
    /// stale cache never rejects a token signed with a freshly rotated key.
    pub async fn verify_jwt(&self, token: &str) -> Result<VerifiedIdentity, VerifyError> {
        let header =
            decode_header(token).map_err(|e| VerifyError::MalformedCredential(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| VerifyError::MalformedCredential("missing kid in header".into()))?;

        let (alg, key) = self.jwks.get_key(&kid).await?;

        match self.decode_claims(token, alg, &key) {
            Ok(claims) => identity_from_claims(claims),
            Err(err) if matches!(err.kind(), jsonwebtoken::errors::ErrorKind::InvalidSignature) => {
                tracing::debug!(
                    event = "jwt_signature_retry",
                    kid = %kid,
                    "signature failed against cached key, forcing JWKS refresh"
                );
                if self.jwks.refresh(true).await.is_err() {
                    return Err(VerifyError::InvalidSignature);
                }
                let (alg, key) = self.jwks.get_key(&kid).await?;
                let claims = self
                    .decode_claims(token, alg, &key)
                    .map_err(map_jwt_error)?;
                identity_from_claims(claims)
            }
            Err(err) => Err(map_jwt_error(err)),
        }
    }

    fn decode_claims(
        &self,
        token: &str,
        alg: Algorithm,
        key: &DecodingKey,
    ) -> Result<Value, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(alg);
        validation.set_audience(&[self.config.project_id.as_str()]);
        validation.set_issuer(&[self.config.authorization_server.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.validate_exp = true;

        decode::<Value>(token, key, &validation).map(|data| data.claims)
    }

    /// Verify an opaque OAuth/session token online via the provider's
    /// authenticate endpoint, returning the raw provider payload.
    ///
    /// A non-200 status is a rejected credential; network failures are a
    /// distinct transport error, never conflated with "invalid credential".
    pub async fn verify_opaque(&self, token: &str) -> Result<Value, VerifyError> {
        let auth_header = if let Some(secret) = &self.config.secret {
            use base64::Engine;
            let credentials = format!("{}:{}", self.config.project_id, secret);
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
            format!("Basic {encoded}")
        } else if let Some(public_token) = &self.config.public_token {
            format!("Bearer {public_token}")
        } else {
            return Err(VerifyError::Misconfigured(
                "STYTCH_SECRET or STYTCH_PUBLIC_TOKEN",
            ));
        };

        tracing::debug!(
            event = "opaque_verify_request",
            authenticate_url = %self.config.authenticate_url,
            auth_method = if self.config.secret.is_some() { "basic" } else { "bearer" },
            credential_prefix = credential_prefix(token),
            "calling provider authenticate endpoint"
        );

        let response = self
            .http
            .post(&self.config.authenticate_url)
            .timeout(PROVIDER_TIMEOUT)
            .header(reqwest::header::AUTHORIZATION, auth_header)
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .map_err(|e| VerifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                event = "opaque_verify_rejected",
                status = status.as_u16(),
                credential_prefix = credential_prefix(token),
                body = %body.chars().take(256).collect::<String>(),
                "provider rejected credential"
            );
            return Err(VerifyError::ProviderRejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| VerifyError::Transport(format!("invalid JSON from provider: {e}")))
    }
}

/// Build the per-request identity from verified JWT claims.
///
/// `client_id` comes from `azp` with `client_id` as fallback (the provider
/// emits either depending on grant type); scopes are the whitespace-split
/// `scope` claim, empty when absent.
fn identity_from_claims(claims: Value) -> Result<VerifiedIdentity, VerifyError> {
    // jsonwebtoken does not check iat presence; the provider always stamps it
    // and its absence means the token did not come from the provider.
    if claims.get("iat").is_none() {
        return Err(VerifyError::MalformedCredential("missing iat claim".into()));
    }

    let subject = claims
        .get("sub")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| VerifyError::MalformedCredential("missing sub claim".into()))?
        .to_string();

    let client_id = claims
        .get("azp")
        .or_else(|| claims.get("client_id"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let scopes = claims
        .get("scope")
        .and_then(Value::as_str)
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    Ok(VerifiedIdentity {
        subject,
        client_id,
        scopes,
        claims,
    })
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> VerifyError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => VerifyError::Expired,
        ErrorKind::InvalidIssuer => VerifyError::IssuerMismatch,
        ErrorKind::InvalidAudience => VerifyError::AudienceMismatch,
        ErrorKind::InvalidSignature => VerifyError::InvalidSignature,
        _ => VerifyError::MalformedCredential(err.to_string()),
    }
}

/// First few characters of a credential, for log context. Never log the
/// full credential.
pub(crate) fn credential_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, encode};
    use serde_json::json;

    use super::*;

    const ISSUER: &str = "https://example-authorization-server.test";
    const PROJECT_ID: &str = "project-test-123";

    fn test_config() -> Arc<ProviderConfig> {
        Arc::new(ProviderConfig {
            project_id: PROJECT_ID.to_string(),
            secret: Some("secret-key".to_string()),
            public_token: None,
            authorization_server: ISSUER.to_string(),
            authenticate_url: "https://example.test/v1/oauth/authenticate".to_string(),
            jwks_url: String::new(),
            server_url: "http://localhost:3000".to_string(),
        })
    }

    fn test_rsa_keypair() -> (EncodingKey, DecodingKey) {
        use rsa::RsaPrivateKey;
        use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};

        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let priv_pem = private_key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .unwrap();
        let encoding = EncodingKey::from_rsa_pem(priv_pem.as_bytes()).unwrap();

        let pub_pem = private_key
            .to_public_key()
            .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
            .unwrap();
        let decoding = DecodingKey::from_rsa_pem(pub_pem.as_bytes()).unwrap();

        (encoding, decoding)
    }

    fn verifier_with_key(kid: &str, decoding: DecodingKey) -> TokenVerifier {
        let mut keys = HashMap::new();
        keys.insert(kid.to_string(), (Algorithm::RS256, decoding));
        TokenVerifier::with_jwks(test_config(), JwksCache::with_keys(keys))
    }

    fn sign(encoding: &EncodingKey, kid: &str, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, claims, encoding).unwrap()
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn base_claims() -> Value {
        json!({
            "sub": "user-test-0001",
            "azp": "client-abc",
            "scope": "openid profile",
            "iss": ISSUER,
            "aud": PROJECT_ID,
            "iat": now() - 60,
            "exp": now() + 3600,
        })
    }

    #[tokio::test]
    async fn valid_jwt_yields_identity_with_sub_as_subject() {
        let (enc, dec) = test_rsa_keypair();
        let verifier = verifier_with_key("kid-1", dec);
        let token = sign(&enc, "kid-1", &base_claims());

        let identity = verifier.verify_jwt(&token).await.unwrap();
        assert_eq!(identity.subject, "user-test-0001");
        assert_eq!(identity.client_id, "client-abc");
        assert_eq!(identity.scopes, vec!["openid", "profile"]);
        assert_eq!(
            identity.claims.get("aud").and_then(Value::as_str),
            Some(PROJECT_ID)
        );
    }

    #[tokio::test]
    async fn client_id_claim_is_azp_fallback() {
        let (enc, dec) = test_rsa_keypair();
        let verifier = verifier_with_key("kid-1", dec);
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("azp");
        claims["client_id"] = json!("client-fallback");
        let token = sign(&enc, "kid-1", &claims);

        let identity = verifier.verify_jwt(&token).await.unwrap();
        assert_eq!(identity.client_id, "client-fallback");
    }

    #[tokio::test]
    async fn missing_scope_claim_yields_empty_scopes() {
        let (enc, dec) = test_rsa_keypair();
        let verifier = verifier_with_key("kid-1", dec);
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("scope");
        let token = sign(&enc, "kid-1", &claims);

        let identity = verifier.verify_jwt(&token).await.unwrap();
        assert!(identity.scopes.is_empty());
    }

    #[tokio::test]
    async fn expired_jwt_is_rejected_as_expired() {
        let (enc, dec) = test_rsa_keypair();
        let verifier = verifier_with_key("kid-1", dec);
        let mut claims = base_claims();
        claims["exp"] = json!(now() - 3600);
        let token = sign(&enc, "kid-1", &claims);

        let err = verifier.verify_jwt(&token).await.unwrap_err();
        assert!(matches!(err, VerifyError::Expired), "got {err:?}");
    }

    #[tokio::test]
    async fn wrong_issuer_is_rejected_as_issuer_mismatch() {
        let (enc, dec) = test_rsa_keypair();
        let verifier = verifier_with_key("kid-1", dec);
        let mut claims = base_claims();
        claims["iss"] = json!("https://wrong-issuer.test");
        let token = sign(&enc, "kid-1", &claims);

        let err = verifier.verify_jwt(&token).await.unwrap_err();
        assert!(matches!(err, VerifyError::IssuerMismatch), "got {err:?}");
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected_as_audience_mismatch() {
        let (enc, dec) = test_rsa_keypair();
        let verifier = verifier_with_key("kid-1", dec);
        let mut claims = base_claims();
        claims["aud"] = json!("someone-else");
        let token = sign(&enc, "kid-1", &claims);

        let err = verifier.verify_jwt(&token).await.unwrap_err();
        assert!(matches!(err, VerifyError::AudienceMismatch), "got {err:?}");
    }

    #[tokio::test]
    async fn token_signed_by_unknown_key_is_invalid_signature() {
        let (enc, _dec) = test_rsa_keypair();
        let (_other_enc, other_dec) = test_rsa_keypair();
        // Cache holds a different key under a different kid.
        let verifier = verifier_with_key("kid-other", other_dec);
        let token = sign(&enc, "kid-unknown", &base_claims());

        let err = verifier.verify_jwt(&token).await.unwrap_err();
        assert!(matches!(err, VerifyError::InvalidSignature), "got {err:?}");
    }

    #[tokio::test]
    async fn token_signed_by_wrong_key_under_known_kid_is_invalid_signature() {
        let (enc, _dec) = test_rsa_keypair();
        let (_other_enc, other_dec) = test_rsa_keypair();
        // Same kid, different key: exercises the forced-refresh retry path.
        let verifier = verifier_with_key("kid-1", other_dec);
        let token = sign(&enc, "kid-1", &base_claims());

        let err = verifier.verify_jwt(&token).await.unwrap_err();
        assert!(matches!(err, VerifyError::InvalidSignature), "got {err:?}");
    }

    #[tokio::test]
    async fn garbage_credential_is_malformed() {
        let (_enc, dec) = test_rsa_keypair();
        let verifier = verifier_with_key("kid-1", dec);

        let err = verifier.verify_jwt("not-a-jwt").await.unwrap_err();
        assert!(
            matches!(err, VerifyError::MalformedCredential(_)),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn missing_iat_claim_is_malformed() {
        let (enc, dec) = test_rsa_keypair();
        let verifier = verifier_with_key("kid-1", dec);
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("iat");
        let token = sign(&enc, "kid-1", &claims);

        let err = verifier.verify_jwt(&token).await.unwrap_err();
        assert!(
            matches!(err, VerifyError::MalformedCredential(_)),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn missing_sub_claim_is_malformed() {
        let (enc, dec) = test_rsa_keypair();
        let verifier = verifier_with_key("kid-1", dec);
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("sub");
        let token = sign(&enc, "kid-1", &claims);

        let err = verifier.verify_jwt(&token).await.unwrap_err();
        assert!(
            matches!(err, VerifyError::MalformedCredential(_)),
            "got {err:?}"
        );
    }

    #[test]
    fn credential_prefix_never_exposes_full_token() {
        assert_eq!(credential_prefix("abcdefghijkl"), "abcdefgh");
        assert_eq!(credential_prefix("short"), "short");
    }

    fn rsa_keypair_with_jwks_doc(kid: &str) -> (EncodingKey, String) {
        use base64::Engine;
        use rsa::RsaPrivateKey;
        use rsa::pkcs8::EncodePrivateKey;
        use rsa::traits::PublicKeyParts;

        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let priv_pem = private_key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .unwrap();
        let encoding = EncodingKey::from_rsa_pem(priv_pem.as_bytes()).unwrap();

        let public = private_key.to_public_key();
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let doc = json!({
            "keys": [{
                "kid": kid,
                "kty": "RSA",
                "alg": "RS256",
                "n": engine.encode(public.n().to_bytes_be()),
                "e": engine.encode(public.e().to_bytes_be()),
            }]
        });
        (encoding, doc.to_string())
    }

    #[tokio::test]
    async fn key_rotated_inside_rate_limit_window_still_verifies() {
        let (_old_enc, old_dec) = test_rsa_keypair();
        let (enc, jwks_doc) = rsa_keypair_with_jwks_doc("kid-rotated");
        let jwks_url = testing::spawn_provider("200 OK", jwks_doc).await;

        // Cache refreshed moments ago and only knows the old key; the token
        // is signed with the rotated key the endpoint now publishes.
        let mut keys = HashMap::new();
        keys.insert("kid-old".to_string(), (Algorithm::RS256, old_dec));
        let verifier =
            TokenVerifier::with_jwks(test_config(), JwksCache::with_keys_at(keys, jwks_url));

        let token = sign(&enc, "kid-rotated", &base_claims());
        let identity = verifier.verify_jwt(&token).await.unwrap();
        assert_eq!(identity.subject, "user-test-0001");
    }

    #[tokio::test]
    async fn non_success_from_provider_is_provider_rejected() {
        let url = testing::spawn_provider(
            "401 Unauthorized",
            json!({ "error_type": "invalid_token" }).to_string(),
        )
        .await;
        let mut config = (*test_config()).clone();
        config.authenticate_url = format!("{url}/v1/oauth/authenticate");
        let verifier =
            TokenVerifier::with_jwks(Arc::new(config), JwksCache::with_keys(HashMap::new()));

        let err = verifier.verify_opaque("opaque-123").await.unwrap_err();
        match err {
            VerifyError::ProviderRejected { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid_token"));
            }
            other => panic!("got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_authenticate_returns_provider_payload() {
        let payload = json!({ "user": { "user_id": "user-test-0001" } });
        let url = testing::spawn_provider("200 OK", payload.to_string()).await;
        let mut config = (*test_config()).clone();
        config.authenticate_url = format!("{url}/v1/oauth/authenticate");
        let verifier =
            TokenVerifier::with_jwks(Arc::new(config), JwksCache::with_keys(HashMap::new()));

        let result = verifier.verify_opaque("opaque-123").await.unwrap();
        assert_eq!(result, payload);
    }
}
