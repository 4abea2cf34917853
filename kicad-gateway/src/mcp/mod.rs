//! MCP Server Implementation
//!
//! Serves the gateway's tools and resources over stdio as newline-delimited
//! JSON-RPC 2.0. Requests are handled one at a time, in arrival order.

pub mod tools;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::catalog::ResourceCatalog;
use crate::error::{GatewayError, GatewayResult, PARSE_ERROR};
use crate::reporter::Report;

pub use tools::{build_server, register_gateway_tools};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Type alias for async tool handler functions
pub type ToolHandler = Box<
    dyn Fn(Value) -> Pin<Box<dyn Future<Output = GatewayResult<Report>> + Send>> + Send + Sync,
>;

/// MCP JSON-RPC Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// MCP JSON-RPC Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn from_error(id: Option<Value>, error: &GatewayError) -> Self {
        Self::failure(id, error.rpc_code(), error.to_string())
    }

    fn failure(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(McpError {
                code,
                message,
                data: None,
            }),
        }
    }
}

/// MCP JSON-RPC Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Tool definition for MCP
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// MCP Server
pub struct McpServer {
    name: String,
    version: String,
    tools: IndexMap<String, (ToolDefinition, Arc<ToolHandler>)>,
    catalog: Arc<ResourceCatalog>,
}

impl McpServer {
    pub fn new(name: &str, version: &str, catalog: Arc<ResourceCatalog>) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            tools: IndexMap::new(),
            catalog,
        }
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Get all tool definitions, in registration order
    pub fn get_tools(&self) -> Vec<&ToolDefinition> {
        self.tools.values().map(|(def, _)| def).collect()
    }

    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    /// Register a tool with its handler
    pub fn register_tool(
        &mut self,
        name: &str,
        description: &str,
        input_schema: Value,
        handler: ToolHandler,
    ) {
        let definition = ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        };
        self.tools
            .insert(name.to_string(), (definition, Arc::new(handler)));
    }

    /// Call a tool by name with arguments
    pub async fn call_tool(&self, name: &str, arguments: Value) -> GatewayResult<Report> {
        let (_, handler) = self
            .tools
            .get(name)
            .ok_or_else(|| GatewayError::UnknownTool(name.to_string()))?;

        handler(arguments).await
    }

    /// Run the MCP server over stdio
    pub async fn run_stdio(&self) -> GatewayResult<()> {
        info!("MCP server '{}' listening on stdio", self.name);
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve requests from `reader` until EOF, writing one response line
    /// per request to `writer`.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> GatewayResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader
                .read_line(&mut line)
                .await
                .map_err(|e| GatewayError::Internal(format!("IO error: {}", e)))?;

            if bytes_read == 0 {
                // EOF - client disconnected
                debug!("stdin closed, stopping");
                break;
            }

            let Some(response) = self.handle_line(&line).await else {
                continue;
            };

            let response_json = serde_json::to_string(&response)
                .map_err(|e| GatewayError::Internal(format!("Serialize error: {}", e)))?;

            writer
                .write_all(response_json.as_bytes())
                .await
                .map_err(|e| GatewayError::Internal(format!("IO error: {}", e)))?;
            writer
                .write_all(b"\n")
                .await
                .map_err(|e| GatewayError::Internal(format!("IO error: {}", e)))?;
            writer
                .flush()
                .await
                .map_err(|e| GatewayError::Internal(format!("IO error: {}", e)))?;
        }

        Ok(())
    }

    /// Handle one line of input. Blank lines and notifications produce no
    /// response.
    pub async fn handle_line(&self, line: &str) -> Option<McpResponse> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let raw: Value = match serde_json::from_str(trimmed) {
            Ok(raw) => raw,
            Err(e) => {
                return Some(McpResponse::failure(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        };
        let id = raw.get("id").cloned();
        let request = match serde_json::from_value::<McpRequest>(raw) {
            Ok(request) if request.jsonrpc == "2.0" => request,
            Ok(request) => {
                let error = GatewayError::InvalidRequest(format!(
                    "unsupported jsonrpc '{}'",
                    request.jsonrpc
                ));
                return Some(McpResponse::from_error(id, &error));
            }
            Err(e) => {
                let error = GatewayError::InvalidRequest(e.to_string());
                return Some(McpResponse::from_error(id, &error));
            }
        };

        if request.id.is_none() {
            self.handle_notification(&request);
            return None;
        }
        Some(self.handle_request(request).await)
    }

    fn handle_notification(&self, request: &McpRequest) {
        match request.method.as_str() {
            "notifications/initialized" => info!("Client initialized"),
            "notifications/cancelled" => {
                debug!("Ignoring cancellation; requests are handled in order")
            }
            other => debug!("Ignoring notification {}", other),
        }
    }

    /// Handle a single MCP request
    async fn handle_request(&self, request: McpRequest) -> McpResponse {
        debug!("Handling {}", request.method);
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(&request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&request.params).await,
            "resources/list" => self.handle_resources_list(),
            "resources/read" => self.handle_resources_read(&request.params),
            "resources/templates/list" => self.handle_templates_list(),
            _ => Err(GatewayError::MethodNotFound(request.method.clone())),
        };

        match result {
            Ok(result) => McpResponse::success(request.id, result),
            Err(e) => {
                warn!("{} failed: {}", request.method, e);
                McpResponse::from_error(request.id, &e)
            }
        }
    }

    fn handle_initialize(&self, params: &Value) -> GatewayResult<Value> {
        if let Some(client) = params.get("clientInfo").and_then(|c| c.get("name")) {
            info!("Initializing session for client {}", client);
        }
        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": {}
            },
            "serverInfo": {
                "name": self.name,
                "version": self.version
            },
            "instructions": "Read kicad-api://overview (or call read_kicad_api_docs) before writing KiScript for execute_kicad_code."
        }))
    }

    fn handle_tools_list(&self) -> GatewayResult<Value> {
        Ok(json!({
            "tools": self.get_tools()
        }))
    }

    async fn handle_tools_call(&self, params: &Value) -> GatewayResult<Value> {
        let tool_name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::InvalidParams("Missing tool name".to_string()))?;

        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let report = self.call_tool(tool_name, arguments).await?;

        Ok(json!({
            "content": [{
                "type": "text",
                "text": report.text
            }],
            "isError": report.is_error
        }))
    }

    fn handle_resources_list(&self) -> GatewayResult<Value> {
        let resources: Vec<_> = self.catalog.entries().collect();
        Ok(json!({ "resources": resources }))
    }

    fn handle_resources_read(&self, params: &Value) -> GatewayResult<Value> {
        let uri = params
            .get("uri")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::InvalidParams("Missing resource uri".to_string()))?;
        let entry = self.catalog.get(uri)?;

        Ok(json!({
            "contents": [{
                "uri": entry.uri,
                "mimeType": entry.mime_type,
                "text": entry.content
            }]
        }))
    }

    fn handle_templates_list(&self) -> GatewayResult<Value> {
        Ok(json!({ "resourceTemplates": self.catalog.templates() }))
    }
}
