//! Multi-server MCP client: concurrent connect, session ownership, and the
//! merged tool catalog.

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod registry;
pub mod session;
pub mod tool;

pub use catalog::{CapabilityCatalog, Collision, CollisionPolicy};
pub use client::{McpClient, RmcpConnector};
pub use config::{ServerConfig, ServerEntry, Transport};
pub use error::{ConfigError, McpError};
pub use manager::{ConnectFailure, ConnectReport, FailureReason, McpManager};
pub use registry::SessionRegistry;
pub use session::{BoxFuture, Connector, JsonMap, ToolSession};
pub use tool::{ContentPart, ToolCallResult, ToolDescriptor};
