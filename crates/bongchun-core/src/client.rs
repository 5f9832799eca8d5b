use std::sync::Arc;
use std::time::Duration;

use bongchun_llm::{FunctionDeclaration, LlmProvider};
use bongchun_mcp::{
    CapabilityCatalog, Collision, CollisionPolicy, ConnectFailure, Connector, McpManager,
    ServerEntry, SessionRegistry, ToolDescriptor,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::chat::ChatSession;
use crate::tools::declarations;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub max_tool_iterations: usize,
    pub collision_policy: CollisionPolicy,
    pub llm_timeout: Duration,
    /// Upper bound for closing a single session during cleanup.
    pub shutdown_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            max_tool_iterations: 10,
            collision_policy: CollisionPolicy::default(),
            llm_timeout: Duration::from_secs(120),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// What `connect_all` achieved.
#[derive(Debug, Default)]
pub struct ConnectSummary {
    pub connected: Vec<String>,
    pub failures: Vec<ConnectFailure>,
    pub collisions: Vec<Collision>,
    pub tool_count: usize,
}

/// Tool-calling chat client: owns the MCP sessions, the merged tool catalog,
/// the chat history, and the model provider.
///
/// At most one turn runs at a time; `process_query` takes `&mut self`.
pub struct Client<P: LlmProvider> {
    pub(crate) provider: P,
    pub(crate) settings: ClientSettings,
    manager: McpManager,
    pub(crate) registry: SessionRegistry,
    pub(crate) catalog: CapabilityCatalog,
    pub(crate) declarations: Vec<FunctionDeclaration>,
    pub(crate) chat: ChatSession,
    pub(crate) cancel: CancellationToken,
    status_tx: Option<UnboundedSender<String>>,
}

impl<P: LlmProvider> std::fmt::Debug for Client<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("tools", &self.catalog.len())
            .field("history", &self.chat.len())
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> Client<P> {
    #[must_use]
    pub fn new(provider: P, settings: ClientSettings) -> Self {
        Self {
            provider,
            settings,
            manager: McpManager::default(),
            registry: SessionRegistry::new(),
            catalog: CapabilityCatalog::default(),
            declarations: Vec::new(),
            chat: ChatSession::new(),
            cancel: CancellationToken::new(),
            status_tx: None,
        }
    }

    /// Replace the transport used to open sessions.
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.manager = McpManager::new(connector);
        self
    }

    /// Forward status lines (connect summary, tool dispatch) to a front end.
    #[must_use]
    pub fn with_status_tx(mut self, tx: UnboundedSender<String>) -> Self {
        self.status_tx = Some(tx);
        self
    }

    pub(crate) fn emit_status(&self, msg: impl Into<String>) {
        if let Some(tx) = &self.status_tx {
            let _ = tx.send(msg.into());
        }
    }

    /// Connect to every configured server and rebuild the tool catalog.
    ///
    /// Sessions from an earlier call are closed first. Individual server
    /// failures are reported in the summary and never fail the batch.
    pub async fn connect_all(&mut self, entries: &[ServerEntry]) -> ConnectSummary {
        if !self.registry.is_empty() {
            tracing::info!("replacing existing MCP sessions");
            self.cleanup().await;
        }

        let report = self.manager.connect_all(entries).await;
        self.registry = report.registry;
        self.catalog = CapabilityCatalog::build(&self.registry, self.settings.collision_policy);
        self.declarations = declarations(&self.catalog);

        let summary = ConnectSummary {
            connected: self.registry.names().into_iter().map(str::to_owned).collect(),
            failures: report.failures,
            collisions: self.catalog.collisions().to_vec(),
            tool_count: self.catalog.len(),
        };
        for failure in &summary.failures {
            self.emit_status(format!(
                "Failed to connect to '{}': {}",
                failure.server, failure.reason
            ));
        }
        self.emit_status(format!(
            "Connected to {} of {} server(s), {} tool(s) available",
            summary.connected.len(),
            entries.len(),
            summary.tool_count
        ));
        summary
    }

    /// Deduplicated descriptors across all sessions, for display.
    pub fn all_tools(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.catalog.all_tools()
    }

    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        self.catalog.all_tools().map(|t| t.name.clone()).collect()
    }

    #[must_use]
    pub fn catalog(&self) -> &CapabilityCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn history(&self) -> &ChatSession {
        &self.chat
    }

    /// Forget the conversation; sessions and tools stay.
    pub fn start_new_chat(&mut self) {
        self.chat.reset();
        tracing::info!("started a new chat");
    }

    /// Token that interrupts the in-flight turn and any later ones.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Close all sessions, most recently connected first. Safe to call repeatedly.
    pub async fn cleanup(&mut self) {
        self.registry
            .shutdown_all(self.settings.shutdown_timeout)
            .await;
        self.catalog = CapabilityCatalog::default();
        self.declarations.clear();
    }
}
