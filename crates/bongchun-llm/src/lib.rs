//! Gemini function-calling provider and the MCP-to-Gemini schema translator.

pub mod any;
pub mod error;
pub mod gemini;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod provider;
mod retry;
pub mod schema;

pub use any::AnyProvider;
pub use error::LlmError;
pub use gemini::{GeminiProvider, GenerationConfig, SafetySetting};
pub use provider::{
    Blob, Candidate, Content, FunctionCall, FunctionDeclaration, FunctionResponse,
    GenerateRequest, GenerateResponse, LlmProvider, Part, Role,
};
pub use schema::{SchemaNode, clean};
