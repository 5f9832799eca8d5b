use std::future::Future;
use std::pin::Pin;

use crate::config::ServerConfig;
use crate::error::McpError;
use crate::tool::{ToolCallResult, ToolDescriptor};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// An open channel to one tool server.
///
/// Only the registry tears sessions down, through [`ToolSession::shutdown`].
pub trait ToolSession: Send + Sync {
    fn server_name(&self) -> &str;

    fn list_tools(&self) -> BoxFuture<'_, Result<Vec<ToolDescriptor>, McpError>>;

    fn call_tool(
        &self,
        name: &str,
        args: JsonMap,
    ) -> BoxFuture<'_, Result<ToolCallResult, McpError>>;

    /// Release the session and then its transport.
    fn shutdown(self: Box<Self>) -> BoxFuture<'static, ()>;
}

/// Opens sessions for validated server configs.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        config: ServerConfig,
    ) -> BoxFuture<'static, Result<Box<dyn ToolSession>, McpError>>;
}
