use bongchun_llm::FunctionCall;
use bongchun_mcp::{CapabilityCatalog, JsonMap, McpError, SessionRegistry, ToolCallResult};
use serde_json::Value;
use tracing::Instrument as _;

use crate::tools::truncate_for_log;

const LOG_PREVIEW_CHARS: usize = 200;
const NO_CONTENT: &str = "[Tool executed successfully, no specific content returned]";

/// How one tool call ended, before it is rendered for the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCallOutcome {
    Ok(String),
    /// The server answered with `isError`.
    ProtocolError(String),
    /// The call never produced an answer: transport failure, timeout, dead session.
    TransportError(String),
    /// No live session owns the tool. Carries the full message.
    Unroutable(String),
}

impl ToolCallOutcome {
    #[must_use]
    pub fn from_result(result: Result<ToolCallResult, McpError>) -> Self {
        match result {
            Err(e) => Self::TransportError(e.to_string()),
            Ok(r) if r.is_error => {
                Self::ProtocolError(r.joined_text().unwrap_or_else(|| "Unknown error".into()))
            }
            Ok(r) => Self::Ok(
                r.joined_text()
                    .or_else(|| r.json_fallback())
                    .unwrap_or_else(|| NO_CONTENT.into()),
            ),
        }
    }

    /// The `content` string fed back to the model for `tool`.
    #[must_use]
    pub fn render(&self, tool: &str) -> String {
        match self {
            Self::Ok(content) | Self::Unroutable(content) => content.clone(),
            Self::ProtocolError(message) => format!("[Error executing tool '{tool}': {message}]"),
            Self::TransportError(message) => {
                format!("Error: Exception during tool execution: {message}")
            }
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Route one model-issued call to the session that owns the tool.
pub(crate) async fn dispatch(
    registry: &SessionRegistry,
    catalog: &CapabilityCatalog,
    call: &FunctionCall,
    notify: impl Fn(String),
) -> ToolCallOutcome {
    let name = call.name.as_str();
    let Some(owner) = catalog.owner_of(name) else {
        tracing::warn!(tool = name, "model requested an unknown tool");
        return ToolCallOutcome::Unroutable(format!(
            "Error: Tool '{name}' not found or not configured correctly."
        ));
    };
    let Some(session) = registry.get(owner) else {
        tracing::error!(tool = name, server = owner, "tool owner has no live session");
        return ToolCallOutcome::Unroutable(format!(
            "Error: Could not find active session for server '{owner}' required by tool '{name}'."
        ));
    };

    let args = arguments(call);
    notify(format!("Calling tool '{name}' on server '{owner}'"));
    let span = tracing::info_span!("tool_call", tool = name, server = owner);
    async {
        tracing::debug!(args = %serde_json::Value::Object(args.clone()), "dispatching tool call");
        let outcome = ToolCallOutcome::from_result(session.call_tool(name, args).await);
        let rendered = outcome.render(name);
        let preview = truncate_for_log(&rendered, LOG_PREVIEW_CHARS);
        if outcome.is_ok() {
            tracing::info!(result = preview, "tool call finished");
        } else {
            tracing::warn!(result = preview, "tool call failed");
        }
        outcome
    }
    .instrument(span)
    .await
}

fn arguments(call: &FunctionCall) -> JsonMap {
    match &call.args {
        Some(Value::Object(map)) => map.clone(),
        None | Some(Value::Null) => JsonMap::new(),
        Some(other) => {
            tracing::warn!(
                tool = call.name,
                args = %other,
                "function call arguments are not an object, using empty arguments"
            );
            JsonMap::new()
        }
    }
}
