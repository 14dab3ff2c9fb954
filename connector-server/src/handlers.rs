// MCP request handlers
//
// Handles initialize, list tools, and connector tool execution

use crate::config::ServerConfig;
use crate::protocol::*;
use crate::session::TcpConnectionManager;
use crate::tools;
use connector_model::{ConnectorContainer, LaunchArgs, RemoteConnector, TargetPath};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct RequestHandler {
    container: Arc<ConnectorContainer>,
    sessions: Arc<TcpConnectionManager>,
}

#[derive(Debug, Serialize)]
struct ConnectorView {
    name: String,
    path: String,
    state: String,
    default: bool,
}

impl RequestHandler {
    pub fn new(config: &ServerConfig) -> Self {
        let sessions = Arc::new(TcpConnectionManager::new(config.connect_timeout));
        let container = ConnectorContainer::new(
            &TargetPath::root(),
            sessions.clone(),
            config.connector_names.iter().cloned(),
        );

        Self {
            container,
            sessions,
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(request.params).await,
            _ => Err(JsonRpcError {
                code: METHOD_NOT_FOUND,
                message: format!("Method not found: {}", request.method),
                data: None,
            }),
        };

        match result {
            Ok(value) => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: Some(value),
                error: None,
            },
            Err(error) => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: None,
                error: Some(error),
            },
        }
    }

    pub async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" => {
                info!("Client initialized");
            }
            "notifications/cancelled" => {
                debug!("Request cancelled");
            }
            _ => {
                warn!("Unknown notification: {}", notification.method);
            }
        }
    }

    fn handle_initialize(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let _params: InitializeParams = serde_json::from_value(params.unwrap_or(json!({})))
            .map_err(|e| JsonRpcError {
                code: INVALID_PARAMS,
                message: format!("Invalid initialize params: {}", e),
                data: None,
            })?;

        let result = InitializeResult {
            protocol_version: "2024-11-05".to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {},
            },
            server_info: ServerInfo {
                name: "connector-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Remote debug connector server. \
                Use connectors.parameters to see what a connector needs, \
                then connectors.launch to connect to a debug stub."
                    .to_string(),
            ),
        };

        to_result(result)
    }

    fn handle_list_tools(&self) -> Result<serde_json::Value, JsonRpcError> {
        let result = ListToolsResult {
            tools: tools::get_tools(&self.container),
        };

        to_result(result)
    }

    async fn handle_call_tool(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let call_params: CallToolParams = serde_json::from_value(params.unwrap_or(json!({})))
            .map_err(|e| JsonRpcError {
                code: INVALID_PARAMS,
                message: format!("Invalid tool call params: {}", e),
                data: None,
            })?;

        let result = match call_params.name.as_str() {
            "connectors.list" => self.handle_list_connectors(),
            "connectors.parameters" => self.handle_parameters(call_params.arguments),
            "connectors.launch" => self.handle_launch(call_params.arguments).await,
            "connectors.set_active" => self.handle_set_active(call_params.arguments).await,
            "sessions.list" => self.handle_list_sessions().await,
            "sessions.close" => self.handle_close_session(call_params.arguments).await,
            _ => Err(format!("Unknown tool: {}", call_params.name)),
        };

        let call_result = match result {
            Ok(content) => CallToolResult {
                content: vec![ContentBlock::Text { text: content }],
                is_error: None,
            },
            Err(error) => CallToolResult {
                content: vec![ContentBlock::Text { text: error }],
                is_error: Some(true),
            },
        };

        to_result(call_result)
    }

    /// Named connector, or the default when no name is given
    fn resolve_connector(&self, args: &serde_json::Value) -> Result<Arc<RemoteConnector>, String> {
        match args.get("connector").and_then(|v| v.as_str()) {
            Some(name) => self
                .container
                .find(name)
                .cloned()
                .map_err(|e| e.to_string()),
            None => self
                .container
                .default_connector()
                .ok_or_else(|| "No default connector. Use connectors.set_active first.".to_string()),
        }
    }

    fn handle_list_connectors(&self) -> Result<String, String> {
        let default = self.container.default_connector();
        let views: Vec<ConnectorView> = self
            .container
            .connectors()
            .iter()
            .map(|c| ConnectorView {
                name: c.name().to_string(),
                path: c.path().to_string(),
                state: c.state().to_string(),
                default: default.as_ref().is_some_and(|d| Arc::ptr_eq(d, c)),
            })
            .collect();

        to_text(&views)
    }

    fn handle_parameters(&self, args: serde_json::Value) -> Result<String, String> {
        let connector = self.resolve_connector(&args)?;
        to_text(connector.parameters())
    }

    async fn handle_launch(&self, args: serde_json::Value) -> Result<String, String> {
        let connector = self.resolve_connector(&args)?;

        let launch_args: LaunchArgs =
            serde_json::from_value(args.get("arguments").cloned().unwrap_or_else(|| json!({})))
                .map_err(|e| format!("Invalid launch arguments: {}", e))?;

        match connector.launch(launch_args).await {
            Ok(()) => Ok(format!("{} connected", connector.name())),
            Err(e) => {
                let cause = std::error::Error::source(&e)
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                Err(format!("{}: {}", e, cause))
            }
        }
    }

    async fn handle_set_active(&self, args: serde_json::Value) -> Result<String, String> {
        let name = args
            .get("connector")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "Missing 'connector' parameter".to_string())?;

        let connector = self.container.find(name).map_err(|e| e.to_string())?.clone();
        connector.set_active().await.map_err(|e| e.to_string())?;

        Ok(format!("{} is now the default connector", connector.name()))
    }

    async fn handle_list_sessions(&self) -> Result<String, String> {
        let sessions = self.sessions.sessions().await;
        to_text(&sessions)
    }

    async fn handle_close_session(&self, args: serde_json::Value) -> Result<String, String> {
        let session_id = args
            .get("session_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "Missing 'session_id' parameter".to_string())?;

        if self.sessions.remove_session(session_id).await {
            Ok(format!("Closed {}", session_id))
        } else {
            Err(format!("Unknown session: {}", session_id))
        }
    }
}

fn to_result<T: Serialize>(value: T) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError {
        code: INTERNAL_ERROR,
        message: format!("Failed to encode result: {}", e),
        data: None,
    })
}

fn to_text<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to encode result: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn handler(names: &[&str]) -> RequestHandler {
        RequestHandler::new(&ServerConfig {
            connector_names: names.iter().map(|n| n.to_string()).collect(),
            connect_timeout: Duration::from_secs(2),
        })
    }

    async fn call(handler: &RequestHandler, name: &str, arguments: serde_json::Value) -> serde_json::Value {
        let request: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        }))
        .unwrap();

        let response = handler.handle_request(request).await;
        assert_eq!(response.id, json!(7));
        response.result.expect("tool calls always produce a result")
    }

    fn text(result: &serde_json::Value) -> &str {
        result["content"][0]["text"].as_str().unwrap()
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "method": "nope"})).unwrap();
        let response = handler(&["ProcessRemote"]).handle_request(request).await;

        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_tools_embeds_parameter_schema() {
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
                .unwrap();
        let response = handler(&["ProcessRemote"]).handle_request(request).await;
        let tools = &response.result.unwrap()["tools"];

        let launch = tools
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["name"] == "connectors.launch")
            .unwrap();
        let arguments = &launch["inputSchema"]["properties"]["arguments"];
        assert_eq!(arguments["properties"]["Port"]["default"], "12345");
        assert_eq!(arguments["required"], json!(["Host", "Port"]));
    }

    #[tokio::test]
    async fn test_parameters_of_default_connector() {
        let handler = handler(&["ProcessRemote"]);
        let result = call(&handler, "connectors.parameters", json!({})).await;

        let params: serde_json::Value = serde_json::from_str(text(&result)).unwrap();
        let names: Vec<&str> = params["parameters"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Host", "Port", "Async"]);
    }

    #[tokio::test]
    async fn test_launch_and_list_sessions() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port().to_string();
        let handler = handler(&["ProcessRemote"]);

        let result = call(
            &handler,
            "connectors.launch",
            json!({"arguments": {"Host": "127.0.0.1", "Port": port, "Async": false}}),
        )
        .await;
        assert!(result.get("isError").is_none(), "{}", text(&result));

        let result = call(&handler, "sessions.list", json!({})).await;
        let sessions: serde_json::Value = serde_json::from_str(text(&result)).unwrap();
        assert_eq!(
            sessions[0]["url"],
            format!("connect://127.0.0.1:{}", port).as_str()
        );

        let listed = call(&handler, "connectors.list", json!({})).await;
        let views: serde_json::Value = serde_json::from_str(text(&listed)).unwrap();
        assert_eq!(views[0]["state"], "Connected");
        assert_eq!(views[0]["default"], true);
    }

    #[tokio::test]
    async fn test_launch_failure_is_tool_error() {
        let handler = handler(&["ProcessRemote"]);

        let result = call(
            &handler,
            "connectors.launch",
            json!({"arguments": {"Host": "127.0.0.1", "Port": "not-a-port"}}),
        )
        .await;

        assert_eq!(result["isError"], true);
        assert!(text(&result).starts_with("Launch failed for"));
        assert!(text(&result).contains("Invalid connection target"));
    }

    #[tokio::test]
    async fn test_null_argument_fails_launch_with_parameter_name() {
        let handler = handler(&["ProcessRemote"]);

        for port in [json!(null), json!(1.5), json!(["1"])] {
            let result = call(
                &handler,
                "connectors.launch",
                json!({"arguments": {"Host": "h", "Port": port}}),
            )
            .await;

            assert_eq!(result["isError"], true);
            assert!(text(&result).starts_with("Launch failed for"), "{}", text(&result));
            assert!(text(&result).contains("Parameter 'Port' expects string"));
        }

        let result = call(
            &handler,
            "connectors.launch",
            json!({"arguments": {"Host": "h", "Port": null}}),
        )
        .await;
        assert!(text(&result).contains(r#"{"Host":"h","Port":null}"#));
        assert!(text(&result).ends_with("got null"));

        let listed = call(&handler, "connectors.list", json!({})).await;
        let views: serde_json::Value = serde_json::from_str(text(&listed)).unwrap();
        assert_eq!(views[0]["state"], "Launch failed");
    }

    #[tokio::test]
    async fn test_set_active_switches_default() {
        let handler = handler(&["First", "Second"]);

        let result = call(&handler, "connectors.set_active", json!({"connector": "Second"})).await;
        assert!(result.get("isError").is_none());

        let listed = call(&handler, "connectors.list", json!({})).await;
        let views: serde_json::Value = serde_json::from_str(text(&listed)).unwrap();
        assert_eq!(views[0]["default"], false);
        assert_eq!(views[1]["default"], true);

        let result = call(&handler, "connectors.set_active", json!({"connector": "Third"})).await;
        assert_eq!(result["isError"], true);
    }
}
