use std::future::Future;

use serde_json::{Map, Value, json};
use uuid::Uuid;

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const MCP_SERVER_NAME: &str = "prism-mcp";

pub const GET_PROFILE_TOOL: &str = "get-profile";
pub const CREATE_GRADIENT_TWEET_TOOL: &str = "create-gradient-tweet";

/// Successful tool invocation: readable text plus structured content for
/// widget-capable clients.
#[derive(Debug, Clone)]
pub struct ToolResponse {
    pub text: String,
    pub structured: Value,
}

/// Caller-visible tool failure. Rendered as an `isError` result, never as a
/// JSON-RPC protocol error — the call itself succeeded.
#[derive(Debug, Clone)]
pub struct ToolFailure {
    pub code: &'static str,
    pub message: String,
}

impl ToolFailure {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Seam between the protocol runtime and the host's verifier/store stack.
/// The host constructs one gateway at startup and hands it to each request's
/// server; the runtime never touches credentials or storage itself.
pub trait ToolGateway: Send + Sync {
    fn get_profile(
        &self,
        credential: Option<&str>,
        request_id: &str,
    ) -> impl Future<Output = Result<ToolResponse, ToolFailure>> + Send;

    fn create_gradient_tweet(
        &self,
        credential: Option<&str>,
        content: &str,
        gradient_index: i64,
        request_id: &str,
    ) -> impl Future<Output = Result<ToolResponse, ToolFailure>> + Send;
}

/// One MCP server per incoming HTTP request (stateless transport): the
/// credential rides with the server, not with individual calls.
pub struct McpServer<G> {
    gateway: G,
    credential: Option<String>,
}

/// Handle one JSON-RPC payload (single message or batch) against the gateway.
/// Returns zero responses for notification-only payloads.
pub async fn handle_http_jsonrpc<G: ToolGateway>(
    gateway: G,
    credential: Option<String>,
    incoming: Value,
) -> Vec<Value> {
    McpServer::new(gateway, credential)
        .handle_incoming_message(incoming)
        .await
}

impl<G: ToolGateway> McpServer<G> {
    pub fn new(gateway: G, credential: Option<String>) -> Self {
        Self {
            gateway,
            credential,
        }
    }

    pub async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // Most likely a client response; server does not issue outbound requests.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        if let Some(id) = obj.get("id").cloned() {
            let result = self.handle_request(method, params).await;
            Some(match result {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            })
        } else {
            self.handle_notification(method).await;
            None
        }
    }

    async fn handle_notification(&self, method: &str) {
        if matches!(
            method,
            "notifications/initialized" | "notifications/cancelled"
        ) {
            return;
        }
        // Unknown notifications are intentionally ignored.
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let request_id = Uuid::now_v7().simple().to_string()[..8].to_string();
        let credential = self.credential.as_deref();

        tracing::info!(
            event = "mcp_tool_call",
            tool = name,
            request_id = %request_id,
            credential_present = credential.is_some(),
            "MCP tool call received"
        );

        let outcome = match name {
            GET_PROFILE_TOOL => self.gateway.get_profile(credential, &request_id).await,
            CREATE_GRADIENT_TWEET_TOOL => {
                let content = match args.get("content").and_then(Value::as_str) {
                    Some(content) if !content.trim().is_empty() => content,
                    _ => {
                        return Ok(tool_error_envelope(&ToolFailure::new(
                            "validation_failed",
                            "Field 'content' is required and must be a non-empty string.",
                        )));
                    }
                };
                let gradient_index = args
                    .get("gradientIndex")
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                self.gateway
                    .create_gradient_tweet(credential, content, gradient_index, &request_id)
                    .await
            }
            _ => {
                tracing::warn!(
                    event = "mcp_tool_unknown",
                    tool = name,
                    request_id = %request_id,
                    "Unknown MCP tool requested"
                );
                return Ok(tool_error_envelope(&ToolFailure::new(
                    "unknown_tool",
                    format!("Unknown tool: {name}"),
                )));
            }
        };

        match outcome {
            Ok(response) => {
                tracing::info!(
                    event = "mcp_tool_success",
                    tool = name,
                    request_id = %request_id,
                    "MCP tool call succeeded"
                );
                Ok(tool_success_envelope(&response))
            }
            Err(failure) => {
                tracing::warn!(
                    event = "mcp_tool_failed",
                    tool = name,
                    request_id = %request_id,
                    code = failure.code,
                    message = %failure.message,
                    "MCP tool call failed"
                );
                Ok(tool_error_envelope(&failure))
            }
        }
    }
}

fn initialize_payload() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {
            "tools": {
                "listChanged": false
            },
            "prompts": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": MCP_SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        },
        "instructions": "Call create-gradient-tweet to render a tweet mockup on one of 25 gradient presets (gradientIndex 0-24). Call get-profile to inspect the authenticated user's OAuth identity; it requires a connected account, while create-gradient-tweet falls back to a placeholder profile when no account is linked."
    })
}

fn tools_list_payload() -> Value {
    let tools: Vec<Value> = tool_definitions()
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": tool.input_schema,
            })
        })
        .collect();
    json!({ "tools": tools })
}

#[derive(Debug)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: GET_PROFILE_TOOL,
            description: "Get the authenticated user's profile information from OAuth.",
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: CREATE_GRADIENT_TWEET_TOOL,
            description: "Generate a tweet mockup with a vibrant gradient background.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "The content of the tweet to render"
                    },
                    "gradientIndex": {
                        "type": "integer",
                        "description": "Gradient preset index (0-24); out-of-range values use preset 0",
                        "default": 0,
                        "minimum": 0,
                        "maximum": 24
                    }
                },
                "required": ["content"],
                "additionalProperties": false
            }),
        },
    ]
}

fn tool_success_envelope(response: &ToolResponse) -> Value {
    json!({
        "content": [{ "type": "text", "text": response.text }],
        "structuredContent": response.structured
    })
}

fn tool_error_envelope(failure: &ToolFailure) -> Value {
    json!({
        "isError": true,
        "content": [{ "type": "text", "text": failure.message }],
        "structuredContent": {
            "error": failure.code,
            "message": failure.message
        }
    })
}

#[derive(Debug)]
pub struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

/// JSON-RPC parse-error envelope for transports that receive unparseable
/// bodies before dispatch.
pub fn parse_error_response() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": {
            "code": -32700,
            "message": "Parse error"
        }
    })
}
