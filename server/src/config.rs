//! Provider configuration, read once at startup.
//!
//! Missing required configuration aborts startup. Tool calls never see a
//! half-configured verifier.

const DEFAULT_AUTHENTICATE_URL: &str = "https://test.stytch.com/v1/oauth/authenticate";
const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("no provider credentials configured (set STYTCH_SECRET or STYTCH_PUBLIC_TOKEN)")]
    NoProviderCredentials,
}

/// Immutable Stytch + deployment settings shared by the verifier and routes.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Stytch project id; doubles as the expected JWT audience.
    pub project_id: String,
    /// Server-to-server secret for the authenticate endpoint (preferred).
    pub secret: Option<String>,
    /// Public token fallback when no secret is issued.
    pub public_token: Option<String>,
    /// Expected JWT issuer; the provider-hosted authorization server.
    pub authorization_server: String,
    pub authenticate_url: String,
    pub jwks_url: String,
    /// Public base URL of this deployment, for resource metadata.
    pub server_url: String,
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let project_id = required("STYTCH_PROJECT_ID")?;
        let secret = optional("STYTCH_SECRET");
        let public_token = optional("STYTCH_PUBLIC_TOKEN");
        if secret.is_none() && public_token.is_none() {
            return Err(ConfigError::NoProviderCredentials);
        }

        let authorization_server = required("STYTCH_AUTHORIZATION_SERVER")?;
        let authenticate_url = optional("STYTCH_AUTHENTICATE_URL")
            .unwrap_or_else(|| DEFAULT_AUTHENTICATE_URL.to_string());
        let jwks_url = optional("STYTCH_JWKS_URL")
            .unwrap_or_else(|| format!("https://test.stytch.com/v1/sessions/jwks/{project_id}"));
        let server_url = optional("PRISM_SERVER_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        Ok(Self {
            project_id,
            secret,
            public_token,
            authorization_server,
            authenticate_url,
            jwks_url,
            server_url,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::MissingVar(name))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
