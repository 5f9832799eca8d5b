use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Raw server record as it appears in the configuration file.
///
/// Nothing is checked at deserialization time so that one malformed entry
/// never rejects the whole server list; call [`ServerEntry::validate`] per entry.
#[derive(Clone, Deserialize, Serialize)]
pub struct ServerEntry {
    pub name: String,
    #[serde(default = "default_transport")]
    pub transport: String,
    /// Stdio transport: command to spawn.
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Streamed HTTP transport: remote endpoint.
    pub url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_transport() -> String {
    "stdio".into()
}

fn default_timeout() -> u64 {
    30
}

impl std::fmt::Debug for ServerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerEntry")
            .field("name", &self.name)
            .field("transport", &self.transport)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env", &redacted_keys(&self.env))
            .field("url", &self.url)
            .field("headers", &redacted_keys(&self.headers))
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn redacted_keys(map: &HashMap<String, String>) -> HashMap<&str, &str> {
    map.keys().map(|k| (k.as_str(), "[REDACTED]")).collect()
}

impl ServerEntry {
    #[must_use]
    pub fn stdio(name: &str, command: &str, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            transport: default_transport(),
            command: Some(command.into()),
            args: args.iter().map(|a| (*a).to_owned()).collect(),
            env: HashMap::new(),
            url: None,
            headers: HashMap::new(),
            timeout: default_timeout(),
        }
    }

    #[must_use]
    pub fn sse(name: &str, url: &str) -> Self {
        Self {
            name: name.into(),
            transport: "sse".into(),
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            url: Some(url.into()),
            headers: HashMap::new(),
            timeout: default_timeout(),
        }
    }

    /// Check the transport kind and its required fields.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first problem found.
    pub fn validate(&self) -> Result<ServerConfig, ConfigError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }

        let transport = match self.transport.to_lowercase().as_str() {
            "stdio" => {
                let command = self
                    .command
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| ConfigError::MissingField {
                        server: name.into(),
                        field: "command",
                        transport: "stdio",
                    })?;
                Transport::Stdio {
                    command: command.to_owned(),
                    args: self.args.clone(),
                    env: self.env.clone(),
                }
            }
            "sse" | "http" | "streamable-http" => {
                let raw = self
                    .url
                    .as_deref()
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| ConfigError::MissingField {
                        server: name.into(),
                        field: "url",
                        transport: "sse",
                    })?;
                let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
                    server: name.into(),
                    url: raw.into(),
                    message: e.to_string(),
                })?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ConfigError::InvalidUrl {
                        server: name.into(),
                        url: raw.into(),
                        message: format!("unsupported scheme '{}'", url.scheme()),
                    });
                }
                let (bearer, headers) = http_headers(name, &self.headers)?;
                Transport::Sse {
                    url: raw.to_owned(),
                    bearer,
                    headers,
                }
            }
            other => {
                return Err(ConfigError::UnsupportedTransport {
                    server: name.into(),
                    transport: other.into(),
                });
            }
        };

        Ok(ServerConfig {
            name: name.into(),
            transport,
            timeout: Duration::from_secs(self.timeout),
        })
    }
}

/// Headers the streamed HTTP transport sets itself.
const RESERVED_HEADERS: [&str; 4] = [
    "accept",
    "mcp-session-id",
    "mcp-protocol-version",
    "last-event-id",
];

/// Split configured headers into a bearer token and the headers sent as-is.
fn http_headers(
    server: &str,
    raw: &HashMap<String, String>,
) -> Result<(Option<String>, HashMap<HeaderName, HeaderValue>), ConfigError> {
    let invalid = |header: &str, message: String| ConfigError::InvalidHeader {
        server: server.into(),
        header: header.into(),
        message,
    };

    let mut bearer = None;
    let mut headers = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let name = HeaderName::from_bytes(key.trim().as_bytes())
            .map_err(|e| invalid(key, e.to_string()))?;
        if RESERVED_HEADERS.contains(&name.as_str()) {
            return Err(invalid(key, "set by the MCP transport".into()));
        }
        if name == AUTHORIZATION
            && let Some(token) = value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
        {
            bearer = Some(token.trim().to_owned());
            continue;
        }
        let mut value = HeaderValue::from_str(value).map_err(|e| invalid(key, e.to_string()))?;
        value.set_sensitive(true);
        headers.insert(name, value);
    }
    Ok((bearer, headers))
}

/// A validated, immutable server definition.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub transport: Transport,
    /// Bounds the handshake and every tool call on this server.
    pub timeout: Duration,
}

#[derive(Clone)]
pub enum Transport {
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    Sse {
        url: String,
        /// Token from an `Authorization: Bearer` header.
        bearer: Option<String>,
        headers: HashMap<HeaderName, HeaderValue>,
    },
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio { command, args, env } => f
                .debug_struct("Stdio")
                .field("command", command)
                .field("args", args)
                .field("env", &redacted_keys(env))
                .finish(),
            Self::Sse {
                url,
                bearer,
                headers,
            } => f
                .debug_struct("Sse")
                .field("url", url)
                .field("bearer", &bearer.as_ref().map(|_| "[REDACTED]"))
                .field(
                    "headers",
                    &headers
                        .keys()
                        .map(|k| (k.as_str(), "[REDACTED]"))
                        .collect::<HashMap<_, _>>(),
                )
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_entry_validates() {
        let entry = ServerEntry::stdio("fs", "npx", &["-y", "server-filesystem"]);
        let config = entry.validate().unwrap();
        assert_eq!(config.name, "fs");
        assert_eq!(config.timeout, Duration::from_secs(30));
        let Transport::Stdio { command, args, .. } = config.transport else {
            panic!("expected stdio transport");
        };
        assert_eq!(command, "npx");
        assert_eq!(args, vec!["-y", "server-filesystem"]);
    }

    #[test]
    fn stdio_without_command_is_rejected() {
        let mut entry = ServerEntry::stdio("fs", "npx", &[]);
        entry.command = None;
        assert_eq!(
            entry.validate().unwrap_err(),
            ConfigError::MissingField {
                server: "fs".into(),
                field: "command",
                transport: "stdio",
            }
        );
    }

    #[test]
    fn blank_command_is_rejected() {
        let entry = ServerEntry::stdio("fs", "   ", &[]);
        assert!(matches!(
            entry.validate(),
            Err(ConfigError::MissingField { field: "command", .. })
        ));
    }

    #[test]
    fn sse_without_url_is_rejected() {
        let mut entry = ServerEntry::sse("remote", "http://localhost:8000/mcp");
        entry.url = None;
        assert!(matches!(
            entry.validate(),
            Err(ConfigError::MissingField { field: "url", .. })
        ));
    }

    #[test]
    fn sse_with_garbage_url_is_rejected() {
        let entry = ServerEntry::sse("remote", "not a url");
        assert!(matches!(
            entry.validate(),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn sse_with_non_http_scheme_is_rejected() {
        let entry = ServerEntry::sse("remote", "ftp://example.com/mcp");
        assert!(matches!(
            entry.validate(),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn transport_is_case_insensitive() {
        let mut entry = ServerEntry::sse("remote", "http://localhost:8000/mcp");
        entry.transport = "SSE".into();
        assert!(matches!(
            entry.validate().unwrap().transport,
            Transport::Sse { .. }
        ));
    }

    #[test]
    fn unknown_transport_is_rejected() {
        let mut entry = ServerEntry::stdio("ws", "x", &[]);
        entry.transport = "websocket".into();
        assert_eq!(
            entry.validate().unwrap_err(),
            ConfigError::UnsupportedTransport {
                server: "ws".into(),
                transport: "websocket".into(),
            }
        );
    }

    #[test]
    fn empty_name_is_rejected() {
        let entry = ServerEntry::stdio(" ", "x", &[]);
        assert_eq!(entry.validate().unwrap_err(), ConfigError::EmptyName);
    }

    #[test]
    fn deserializes_with_defaults() {
        let entry: ServerEntry = toml::from_str(
            r#"
name = "fs"
command = "mcp-fs"
"#,
        )
        .unwrap();
        assert_eq!(entry.transport, "stdio");
        assert_eq!(entry.timeout, 30);
        assert!(entry.args.is_empty());
    }

    #[test]
    fn headers_split_into_bearer_and_custom() {
        let mut entry = ServerEntry::sse("remote", "https://mcp.example.com/mcp");
        entry
            .headers
            .insert("Authorization".into(), "Bearer tok-123".into());
        entry.headers.insert("X-API-Key".into(), "k-456".into());
        let Transport::Sse { bearer, headers, .. } = entry.validate().unwrap().transport else {
            panic!("expected sse transport");
        };
        assert_eq!(bearer.as_deref(), Some("tok-123"));
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[&HeaderName::from_static("x-api-key")], "k-456");
    }

    #[test]
    fn non_bearer_authorization_is_sent_verbatim() {
        let mut entry = ServerEntry::sse("remote", "https://mcp.example.com/mcp");
        entry
            .headers
            .insert("authorization".into(), "Basic dXNlcjpwdw==".into());
        let Transport::Sse { bearer, headers, .. } = entry.validate().unwrap().transport else {
            panic!("expected sse transport");
        };
        assert!(bearer.is_none());
        assert_eq!(headers[&AUTHORIZATION], "Basic dXNlcjpwdw==");
    }

    #[test]
    fn malformed_header_is_rejected() {
        let mut entry = ServerEntry::sse("remote", "https://mcp.example.com/mcp");
        entry.headers.insert("X Bad Name".into(), "v".into());
        assert!(matches!(
            entry.validate(),
            Err(ConfigError::InvalidHeader { ref server, ref header, .. })
                if server == "remote" && header == "X Bad Name"
        ));

        let mut entry = ServerEntry::sse("remote", "https://mcp.example.com/mcp");
        entry.headers.insert("X-Token".into(), "line\nbreak".into());
        assert!(matches!(
            entry.validate(),
            Err(ConfigError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn transport_owned_header_is_rejected() {
        let mut entry = ServerEntry::sse("remote", "https://mcp.example.com/mcp");
        entry.headers.insert("Mcp-Session-Id".into(), "abc".into());
        assert!(matches!(
            entry.validate(),
            Err(ConfigError::InvalidHeader { ref message, .. }) if message.contains("transport")
        ));
    }

    #[test]
    fn debug_redacts_env_and_headers() {
        let mut entry = ServerEntry::sse("remote", "http://localhost:8000/mcp");
        entry
            .headers
            .insert("Authorization".into(), "Bearer hunter2".into());
        entry.env.insert("TOKEN".into(), "s3cret".into());
        let out = format!("{entry:?}");
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("s3cret"));
        assert!(out.contains("[REDACTED]"));

        entry.headers.insert("X-API-Key".into(), "k-456".into());
        let transport = format!("{:?}", entry.validate().unwrap().transport);
        assert!(!transport.contains("hunter2"));
        assert!(!transport.contains("k-456"));
        assert!(transport.contains("x-api-key"));
    }
}
