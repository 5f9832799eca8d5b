use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::client::RmcpConnector;
use crate::config::ServerEntry;
use crate::error::{ConfigError, McpError};
use crate::registry::SessionRegistry;
use crate::session::Connector;

#[derive(Debug, thiserror::Error)]
pub enum FailureReason {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connect(#[from] McpError),

    #[error("connection task panicked")]
    Panicked,
}

/// A server that did not make it into the registry.
#[derive(Debug)]
pub struct ConnectFailure {
    pub server: String,
    pub reason: FailureReason,
}

#[derive(Debug, Default)]
pub struct ConnectReport {
    pub registry: SessionRegistry,
    pub failures: Vec<ConnectFailure>,
}

/// Opens one session per configured server, all at once.
pub struct McpManager {
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for McpManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpManager").finish_non_exhaustive()
    }
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new(Arc::new(RmcpConnector))
    }
}

impl McpManager {
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Connect to every valid entry concurrently and list its tools.
    ///
    /// Invalid entries are skipped before any attempt is made. A failing server
    /// never affects the others; every failure is reported in the result.
    /// Sessions are registered in configuration order, whatever order the
    /// handshakes finish in.
    pub async fn connect_all(&self, entries: &[ServerEntry]) -> ConnectReport {
        let mut report = ConnectReport::default();
        let mut seen = HashSet::new();
        let mut join_set = JoinSet::new();

        for (position, entry) in entries.iter().enumerate() {
            let config = match entry.validate() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(server = entry.name, "skipping MCP server: {e}");
                    report.failures.push(ConnectFailure {
                        server: entry.name.clone(),
                        reason: e.into(),
                    });
                    continue;
                }
            };
            if !seen.insert(config.name.clone()) {
                let e = ConfigError::DuplicateName {
                    server: config.name.clone(),
                };
                tracing::warn!(server = config.name, "skipping MCP server: {e}");
                report.failures.push(ConnectFailure {
                    server: config.name,
                    reason: e.into(),
                });
                continue;
            }

            let connector = Arc::clone(&self.connector);
            join_set.spawn(async move {
                let server = config.name.clone();
                let result = async {
                    let session = connector.connect(config).await?;
                    let listed = session.list_tools().await;
                    match listed {
                        Ok(tools) => Ok((session, tools)),
                        Err(e) => {
                            session.shutdown().await;
                            Err(e)
                        }
                    }
                }
                .await;
                (position, server, result)
            });
        }

        let mut settled = Vec::with_capacity(join_set.len());
        let mut panicked = 0usize;
        while let Some(joined) = join_set.join_next().await {
            if let Ok(outcome) = joined {
                settled.push(outcome);
            } else {
                tracing::warn!("MCP connection task panicked");
                panicked += 1;
            }
        }
        settled.sort_by_key(|(position, _, _)| *position);

        for (_, server, result) in settled {
            match result {
                Ok((session, tools)) => {
                    tracing::info!(
                        server,
                        tools = ?tools.iter().map(|t| &t.name).collect::<Vec<_>>(),
                        "connected to MCP server"
                    );
                    if let Err(e) = report.registry.register(server.clone(), session, tools) {
                        report.failures.push(ConnectFailure {
                            server,
                            reason: e.into(),
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(server, "MCP server connection failed: {e}");
                    report.failures.push(ConnectFailure {
                        server,
                        reason: e.into(),
                    });
                }
            }
        }

        if panicked > 0 {
            let attempted: HashSet<&str> = report
                .failures
                .iter()
                .map(|f| f.server.as_str())
                .chain(report.registry.names())
                .collect();
            let lost: Vec<String> = entries
                .iter()
                .map(|e| e.name.trim().to_owned())
                .filter(|n| !attempted.contains(n.as_str()))
                .collect();
            for server in lost {
                report.failures.push(ConnectFailure {
                    server,
                    reason: FailureReason::Panicked,
                });
            }
        }

        tracing::info!(
            connected = report.registry.len(),
            failed = report.failures.len(),
            "MCP connect phase finished"
        );
        report
    }
}
