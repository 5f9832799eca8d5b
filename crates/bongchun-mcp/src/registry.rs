use std::collections::HashMap;
use std::time::Duration;

use crate::error::McpError;
use crate::session::ToolSession;
use crate::tool::ToolDescriptor;

pub struct RegisteredSession {
    pub name: String,
    pub session: Box<dyn ToolSession>,
    /// Tools listed right after the handshake.
    pub tools: Vec<ToolDescriptor>,
}

/// Sole owner of live sessions, kept in acquisition order.
#[derive(Default)]
pub struct SessionRegistry {
    entries: Vec<RegisteredSession>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field(
                "servers",
                &self.entries.iter().map(|e| &e.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `McpError::AlreadyRegistered` if a session with this name exists.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        session: Box<dyn ToolSession>,
        tools: Vec<ToolDescriptor>,
    ) -> Result<(), McpError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(McpError::AlreadyRegistered { server: name });
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(RegisteredSession {
            name,
            session,
            tools,
        });
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn ToolSession> {
        self.index
            .get(name)
            .map(|&i| self.entries[i].session.as_ref())
    }

    pub fn all(&self) -> impl Iterator<Item = &RegisteredSession> {
        self.entries.iter()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Close every session, most recently acquired first.
    ///
    /// Each shutdown is bounded by `per_session` so a stuck server cannot hang
    /// teardown. Calling this again is a no-op.
    pub async fn shutdown_all(&mut self, per_session: Duration) {
        self.index.clear();
        while let Some(entry) = self.entries.pop() {
            tracing::info!(server = entry.name, "shutting down MCP session");
            if tokio::time::timeout(per_session, entry.session.shutdown())
                .await
                .is_err()
            {
                tracing::warn!(
                    server = entry.name,
                    timeout_secs = per_session.as_secs(),
                    "MCP session shutdown timed out, abandoning it"
                );
            }
        }
    }
}
