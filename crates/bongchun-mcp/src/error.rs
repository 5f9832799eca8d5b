#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("connection failed for server '{server}': {message}")]
    Connection { server: String, message: String },

    #[error("handshake with server '{server}' timed out after {timeout_secs}s")]
    HandshakeTimeout { server: String, timeout_secs: u64 },

    #[error("tool call failed: {server}/{tool}: {message}")]
    ToolCall {
        server: String,
        tool: String,
        message: String,
    },

    #[error("tool call timed out after {timeout_secs}s: {server}/{tool}")]
    Timeout {
        server: String,
        tool: String,
        timeout_secs: u64,
    },

    #[error("server '{server}' is already registered")]
    AlreadyRegistered { server: String },
}

/// A server entry that cannot be turned into a connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("server '{server}': unsupported transport '{transport}'")]
    UnsupportedTransport { server: String, transport: String },

    #[error("server '{server}': missing required field '{field}' for {transport} transport")]
    MissingField {
        server: String,
        field: &'static str,
        transport: &'static str,
    },

    #[error("server '{server}': invalid url '{url}': {message}")]
    InvalidUrl {
        server: String,
        url: String,
        message: String,
    },

    #[error("server '{server}': invalid header '{header}': {message}")]
    InvalidHeader {
        server: String,
        header: String,
        message: String,
    },

    #[error("server name must not be empty")]
    EmptyName,

    #[error("server '{server}' is configured more than once")]
    DuplicateName { server: String },
}
