use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::registry::SessionRegistry;
use crate::tool::ToolDescriptor;

/// Which server keeps a tool name that several servers expose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The server later in connection order takes the name over.
    #[default]
    LastWins,
    /// The first server to expose the name keeps it.
    FirstWins,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub tool: String,
    pub kept: String,
    pub discarded: String,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    owner: String,
    tool: ToolDescriptor,
}

/// Merged tool namespace across all live sessions.
#[derive(Debug, Clone, Default)]
pub struct CapabilityCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
    collisions: Vec<Collision>,
}

impl CapabilityCatalog {
    /// Merge the tool snapshots of every registered session, in acquisition order.
    #[must_use]
    pub fn build(registry: &SessionRegistry, policy: CollisionPolicy) -> Self {
        Self::from_snapshots(
            registry.all().map(|s| (s.name.as_str(), s.tools.as_slice())),
            policy,
        )
    }

    #[must_use]
    pub fn from_snapshots<'a>(
        snapshots: impl IntoIterator<Item = (&'a str, &'a [ToolDescriptor])>,
        policy: CollisionPolicy,
    ) -> Self {
        let mut catalog = Self::default();
        for (server, tools) in snapshots {
            for tool in tools {
                catalog.insert(server, tool, policy);
            }
        }
        catalog
    }

    fn insert(&mut self, server: &str, tool: &ToolDescriptor, policy: CollisionPolicy) {
        let Some(&i) = self.index.get(&tool.name) else {
            self.index.insert(tool.name.clone(), self.entries.len());
            self.entries.push(CatalogEntry {
                owner: server.into(),
                tool: tool.clone(),
            });
            return;
        };

        let previous = self.entries[i].owner.clone();
        let (kept, discarded) = match policy {
            CollisionPolicy::LastWins => {
                self.entries[i] = CatalogEntry {
                    owner: server.into(),
                    tool: tool.clone(),
                };
                (server.to_owned(), previous)
            }
            CollisionPolicy::FirstWins => (previous, server.to_owned()),
        };
        tracing::warn!(
            tool = tool.name,
            kept,
            discarded,
            "tool name exposed by more than one server"
        );
        self.collisions.push(Collision {
            tool: tool.name.clone(),
            kept,
            discarded,
        });
    }

    /// One descriptor per tool name, in order of first appearance.
    pub fn all_tools(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.entries.iter().map(|e| &e.tool)
    }

    #[must_use]
    pub fn owner_of(&self, tool: &str) -> Option<&str> {
        self.index.get(tool).map(|&i| self.entries[i].owner.as_str())
    }

    #[must_use]
    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
