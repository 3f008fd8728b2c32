//! MCP server over line-delimited JSON-RPC
//!
//! Reads one request per line and writes one response per line. Notifications
//! get no response. Logging goes through `tracing`, never stdout.

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::Result;
use crate::mcp::tools::ToolHandler;
use crate::mcp::types::{
    methods, CallToolParams, Implementation, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, RequestId, ServerCapabilities, ToolsCapability, MCP_VERSION,
};

pub const SERVER_NAME: &str = "auto_advisor";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const INSTRUCTIONS: &str = "You can call the provided tools (filter_cars, recommend, average_price, \
top_cars, estimate_price) to explore and analyze the vehicle sales dataset.";

pub struct McpServer {
    tool_handler: ToolHandler,

    /// Set once the client sends `notifications/initialized`
    initialized: bool,
}

impl McpServer {
    pub fn new(tool_handler: ToolHandler) -> Self {
        Self {
            tool_handler,
            initialized: false,
        }
    }

    pub fn tool_handler(&self) -> &ToolHandler {
        &self.tool_handler
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Serve on the process's stdin and stdout until stdin closes
    pub async fn run_stdio(&mut self) -> Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        self.serve(reader, tokio::io::stdout()).await
    }

    /// Serve requests from `reader`, writing responses to `writer`, until EOF
    pub async fn serve<R, W>(&mut self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            match self.handle_message(&line).await {
                Ok(Some(response)) => {
                    let mut frame = serde_json::to_vec(&response)?;
                    frame.push(b'\n');
                    writer.write_all(&frame).await?;
                    writer.flush().await?;
                }
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "Failed to handle message"),
            }
        }

        tracing::info!("Input closed, shutting down");
        Ok(())
    }

    /// Handle one JSON-RPC message, returning the response if one is due
    pub async fn handle_message(&mut self, message: &str) -> Result<Option<JsonRpcResponse>> {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable message");
                return Ok(Some(JsonRpcResponse::reply(
                    None,
                    Err(JsonRpcError::parse_error(e.to_string())),
                )));
            }
        };

        let Some(id) = request.id.clone() else {
            self.handle_notification(&request.method);
            return Ok(None);
        };

        tracing::debug!(method = %request.method, "Request received");
        let outcome = self.dispatch(&request).await;
        Ok(Some(JsonRpcResponse::reply(Some(id), outcome)))
    }

    fn handle_notification(&mut self, method: &str) {
        if method == methods::INITIALIZED {
            self.initialized = true;
        } else {
            tracing::debug!(method, "Ignoring notification");
        }
    }

    async fn dispatch(&mut self, request: &JsonRpcRequest) -> std::result::Result<Value, JsonRpcError> {
        match request.method.as_str() {
            methods::INITIALIZE => to_result(&self.initialize_result()),
            methods::PING => Ok(json!({})),
            methods::LIST_TOOLS => {
                let tools = self
                    .tool_handler
                    .list_tools()
                    .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;
                to_result(&ListToolsResult { tools })
            }
            methods::CALL_TOOL => self.call_tool(request.params.as_ref()).await,
            methods::INITIALIZED => {
                self.initialized = true;
                Ok(json!({}))
            }
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    /// Tool failures come back inside the result; only a context that cannot
    /// be built surfaces as a JSON-RPC internal error.
    async fn call_tool(&self, params: Option<&Value>) -> std::result::Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .cloned()
            .ok_or_else(|| JsonRpcError::invalid_params("Missing tool parameters"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tool parameters: {}", e)))
            })?;

        let result = self
            .tool_handler
            .call_tool(&params.name, params.arguments)
            .await
            .map_err(|e| {
                tracing::error!(tool = %params.name, error = %e, "Tool call could not be served");
                JsonRpcError::internal_error(e.to_string())
            })?;

        to_result(&result)
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}
