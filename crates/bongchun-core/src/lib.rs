//! Tool-calling conversation core: configuration, attachment validation, and
//! the loop that drives a Gemini chat through MCP tools.

pub mod attachment;
pub mod chat;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod tools;
pub mod turn;

pub use client::{Client, ClientSettings, ConnectSummary};
pub use config::Config;
pub use dispatch::ToolCallOutcome;
pub use error::{AttachmentError, TurnError};
pub use turn::compose_query;
