//! REST read surface for the authenticated caller's profile.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use prism_core::error::ApiError;
use prism_core::profile::SocialProfile;

use crate::error::AppError;
use crate::state::AppState;
use crate::verify::credential_prefix;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/profile", get(get_profile))
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    /// Identity provider's durable user id
    pub subject: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    /// Last reconciled social profile, absent when the user has never
    /// linked a social account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<SocialProfile>,
}

/// The authenticated caller's identity plus their last reconciled social
/// profile. Same verification path as the `get-profile` tool, exposed over
/// plain REST.
#[utoipa::path(
    get,
    path = "/v1/profile",
    responses(
        (status = 200, description = "Verified identity and stored profile", body = ProfileResponse),
        (status = 401, description = "Missing or invalid credential", body = ApiError),
        (status = 500, description = "Store failure", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "profile"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>, AppError> {
    let token = super::bearer_token(&headers).ok_or_else(|| AppError::Unauthorized {
        message: "Missing bearer credential".to_string(),
        docs_hint: Some("Send the OAuth access token as 'Authorization: Bearer <token>'.".to_string()),
    })?;

    let identity = state
        .gateway
        .verifier
        .verify_jwt(&token)
        .await
        .map_err(|err| {
            tracing::warn!(
                event = "rest_profile_auth_failed",
                credential_prefix = credential_prefix(&token),
                error = %err,
                "credential verification failed"
            );
            AppError::Unauthorized {
                message: format!("Authentication failed: {err}"),
                docs_hint: None,
            }
        })?;

    let profile = state.gateway.store.get_by_subject(&identity.subject).await?;

    Ok(Json(ProfileResponse {
        subject: identity.subject,
        client_id: identity.client_id,
        scopes: identity.scopes,
        profile,
    }))
}
