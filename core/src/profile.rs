use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Persisted social profile, keyed by the identity provider's durable user id.
///
/// Rows are created on first successful reconciliation and only mutated after
/// that — never deleted. `updated_at` advances only when `handle`,
/// `display_name`, or `avatar_url` actually changes value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SocialProfile {
    /// Identity provider user id (stable across sessions)
    pub subject_id: String,
    /// Native id at the social provider (set at insert, not rewritten)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A freshly observed profile, extracted from a provider payload and not yet
/// reconciled with the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCandidate {
    pub external_id: Option<String>,
    pub handle: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Verified caller identity, produced per-request by token verification.
/// Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedIdentity {
    /// `sub` claim — the provider's durable user id
    pub subject: String,
    /// `azp` claim, falling back to `client_id`
    pub client_id: String,
    /// Whitespace-split `scope` claim (empty when absent)
    pub scopes: Vec<String>,
    /// Full decoded claims, kept for diagnostics and the profile tool
    pub claims: serde_json::Value,
}

/// Fixed profile used when a tweet is rendered without a resolvable identity.
pub fn placeholder_profile() -> ProfileCandidate {
    ProfileCandidate {
        external_id: None,
        handle: Some("twitter_user".to_string()),
        display_name: Some("Twitter User".to_string()),
        avatar_url: Some(
            "https://abs.twimg.com/sticky/default_profile_images/default_profile_400x400.png"
                .to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_profile_is_fully_populated() {
        let profile = placeholder_profile();
        assert_eq!(profile.handle.as_deref(), Some("twitter_user"));
        assert_eq!(profile.display_name.as_deref(), Some("Twitter User"));
        assert!(profile.avatar_url.unwrap().ends_with("_400x400.png"));
        assert!(profile.external_id.is_none());
    }
}
