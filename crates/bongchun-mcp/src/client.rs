use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use rmcp::ServiceExt;
use rmcp::model::{CallToolRequestParams, CallToolResult, RawContent};
use rmcp::service::RunningService;
use rmcp::transport::TokioChildProcess;
use rmcp::transport::streamable_http_client::{
    StreamableHttpClientTransport, StreamableHttpClientTransportConfig,
};
use tokio::process::Command;

use crate::config::{ServerConfig, Transport};
use crate::error::McpError;
use crate::session::{BoxFuture, Connector, JsonMap, ToolSession};
use crate::tool::{ContentPart, ToolCallResult, ToolDescriptor};

type ClientService = RunningService<rmcp::RoleClient, ()>;

/// MCP session backed by an `rmcp` client service.
pub struct McpClient {
    server: String,
    service: ClientService,
    timeout: Duration,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("server", &self.server)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl McpClient {
    /// Open the transport described by `config` and perform the MCP handshake.
    ///
    /// # Errors
    ///
    /// Returns `McpError::Connection` if the transport cannot be opened or the
    /// handshake fails, `McpError::HandshakeTimeout` if it does not finish in time.
    pub async fn connect(config: &ServerConfig) -> Result<Self, McpError> {
        match &config.transport {
            Transport::Stdio { command, args, env } => {
                Self::connect_stdio(&config.name, command, args, env, config.timeout).await
            }
            Transport::Sse {
                url,
                bearer,
                headers,
            } => {
                Self::connect_url(
                    &config.name,
                    url,
                    bearer.as_deref(),
                    headers,
                    config.timeout,
                )
                .await
            }
        }
    }

    async fn connect_stdio(
        server: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, McpError> {
        tracing::info!(server, command, ?args, "connecting to stdio MCP server");
        let mut cmd = Command::new(command);
        cmd.args(args);
        for (k, v) in env {
            cmd.env(k, v);
        }

        let transport = TokioChildProcess::new(cmd).map_err(|e| McpError::Connection {
            server: server.into(),
            message: e.to_string(),
        })?;

        let service = tokio::time::timeout(timeout, ().serve(transport))
            .await
            .map_err(|_| McpError::HandshakeTimeout {
                server: server.into(),
                timeout_secs: timeout.as_secs(),
            })?
            .map_err(|e| McpError::Connection {
                server: server.into(),
                message: e.to_string(),
            })?;

        Ok(Self {
            server: server.into(),
            service,
            timeout,
        })
    }

    /// Connect to a remote MCP server over streamed HTTP.
    async fn connect_url(
        server: &str,
        url: &str,
        bearer: Option<&str>,
        headers: &HashMap<HeaderName, HeaderValue>,
        timeout: Duration,
    ) -> Result<Self, McpError> {
        tracing::info!(
            server,
            url,
            headers = ?headers.keys().collect::<Vec<_>>(),
            "connecting to streamed HTTP MCP server"
        );
        let mut transport_config = StreamableHttpClientTransportConfig::with_uri(url.to_owned())
            .custom_headers(headers.clone());
        if let Some(token) = bearer {
            transport_config = transport_config.auth_header(token.to_owned());
        }
        let transport = StreamableHttpClientTransport::from_config(transport_config);

        let service = tokio::time::timeout(timeout, ().serve(transport))
            .await
            .map_err(|_| McpError::HandshakeTimeout {
                server: server.into(),
                timeout_secs: timeout.as_secs(),
            })?
            .map_err(|e| McpError::Connection {
                server: server.into(),
                message: e.to_string(),
            })?;

        Ok(Self {
            server: server.into(),
            service,
            timeout,
        })
    }

    async fn fetch_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let tools = tokio::time::timeout(self.timeout, self.service.list_all_tools())
            .await
            .map_err(|_| McpError::Timeout {
                server: self.server.clone(),
                tool: "tools/list".into(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| McpError::ToolCall {
                server: self.server.clone(),
                tool: "tools/list".into(),
                message: e.to_string(),
            })?;

        Ok(tools
            .into_iter()
            .map(|t| ToolDescriptor {
                name: t.name.to_string(),
                description: t.description.map_or_else(String::new, |d| d.to_string()),
                input_schema: serde_json::Value::Object((*t.input_schema).clone()),
            })
            .collect())
    }

    async fn invoke(&self, name: &str, args: JsonMap) -> Result<ToolCallResult, McpError> {
        let params = CallToolRequestParams {
            name: Cow::Owned(name.to_owned()),
            arguments: Some(args),
            task: None,
            meta: None,
        };

        let result = tokio::time::timeout(self.timeout, self.service.call_tool(params))
            .await
            .map_err(|_| McpError::Timeout {
                server: self.server.clone(),
                tool: name.into(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| McpError::ToolCall {
                server: self.server.clone(),
                tool: name.into(),
                message: e.to_string(),
            })?;

        Ok(convert_result(result))
    }
}

fn convert_result(result: CallToolResult) -> ToolCallResult {
    let mut content: Vec<ContentPart> = result
        .content
        .into_iter()
        .map(|c| match c.raw {
            RawContent::Text(t) => ContentPart::Text(t.text),
            other => ContentPart::Json(serde_json::to_value(&other).unwrap_or_default()),
        })
        .collect();
    if let Some(structured) = result.structured_content {
        content.push(ContentPart::Json(structured));
    }
    ToolCallResult {
        is_error: result.is_error.unwrap_or(false),
        content,
    }
}

impl ToolSession for McpClient {
    fn server_name(&self) -> &str {
        &self.server
    }

    fn list_tools(&self) -> BoxFuture<'_, Result<Vec<ToolDescriptor>, McpError>> {
        Box::pin(self.fetch_tools())
    }

    fn call_tool(
        &self,
        name: &str,
        args: JsonMap,
    ) -> BoxFuture<'_, Result<ToolCallResult, McpError>> {
        let name = name.to_owned();
        Box::pin(async move { self.invoke(&name, args).await })
    }

    fn shutdown(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let server = self.server;
            if let Err(e) = self.service.cancel().await {
                tracing::warn!(server, "MCP service did not stop cleanly: {e}");
            }
        })
    }
}

/// Production connector: real child processes and HTTP endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct RmcpConnector;

impl Connector for RmcpConnector {
    fn connect(
        &self,
        config: ServerConfig,
    ) -> BoxFuture<'static, Result<Box<dyn ToolSession>, McpError>> {
        Box::pin(async move {
            let client = McpClient::connect(&config).await?;
            Ok(Box::new(client) as Box<dyn ToolSession>)
        })
    }
}
