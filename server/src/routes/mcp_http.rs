//! HTTP transport for the MCP runtime plus OAuth resource discovery.
//!
//! `/mcp` accepts JSON-RPC with an optional bearer credential; whether a
//! missing credential is an error is the tool's call, not the transport's.
//! Discovery metadata points clients at the provider-hosted authorization
//! server; this service is only the protected resource.

use axum::body::Bytes;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::state::AppState;

const MCP_PATH: &str = "/mcp";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(MCP_PATH, post(mcp_post).get(mcp_get))
        .route(
            "/.well-known/oauth-protected-resource",
            get(oauth_protected_resource_metadata),
        )
        .route(
            "/.well-known/oauth-protected-resource/",
            get(oauth_protected_resource_metadata),
        )
        .route(
            "/.well-known/oauth-protected-resource/mcp",
            get(oauth_protected_resource_metadata),
        )
        // Compatibility alias for clients that resolve well-known from the
        // MCP path.
        .route(
            "/mcp/.well-known/oauth-protected-resource",
            get(oauth_protected_resource_metadata),
        )
}

async fn mcp_get() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

async fn mcp_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let credential = super::bearer_token(&headers);

    let incoming: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(_) => {
            return (StatusCode::OK, Json(prism_mcp_runtime::parse_error_response()))
                .into_response();
        }
    };

    let responses =
        prism_mcp_runtime::handle_http_jsonrpc(state.gateway.clone(), credential, incoming).await;

    if responses.is_empty() {
        return StatusCode::ACCEPTED.into_response();
    }

    if responses.len() == 1 {
        return (
            StatusCode::OK,
            Json(responses.into_iter().next().unwrap_or(Value::Null)),
        )
            .into_response();
    }

    (StatusCode::OK, Json(Value::Array(responses))).into_response()
}

async fn oauth_protected_resource_metadata(
    State(state): State<AppState>,
    headers: HeaderMap,
    original_uri: OriginalUri,
) -> Json<Value> {
    tracing::info!(
        event = "oauth_discovery_request",
        path = %original_uri.0.path(),
        origin = ?headers.get("origin").and_then(|v| v.to_str().ok()),
        user_agent = ?headers.get("user-agent").and_then(|v| v.to_str().ok()),
        "OAuth protected resource metadata served"
    );

    Json(json!({
        "resource": format!("{}{MCP_PATH}", state.config.server_url),
        "authorization_servers": [state.config.authorization_server],
        "scopes_supported": [],
    }))
}
