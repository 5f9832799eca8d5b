use std::fmt;
use std::time::Duration;

use bongchun_llm::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use bongchun_llm::{GenerationConfig, SafetySetting};
use bongchun_mcp::{CollisionPolicy, ServerEntry};
use serde::Deserialize;

/// Wrapper for sensitive strings with redacted Debug/Display.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub llm: LlmConfig,
    pub timeouts: TimeoutConfig,
    pub mcp: McpConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model round trips that may request tools before the turn is abandoned.
    pub max_tool_iterations: usize,
    pub collision_policy: CollisionPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: 10,
            collision_policy: CollisionPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub system_instruction: Option<String>,
    pub max_retries: u32,
    /// `None` uses the built-in defaults; an empty list sends none.
    pub safety_settings: Option<Vec<SafetySetting>>,
    pub generation: GenerationConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            system_instruction: None,
            max_retries: 3,
            safety_settings: None,
            generation: GenerationConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub llm_seconds: u64,
    pub shutdown_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_seconds: 120,
            shutdown_seconds: 5,
        }
    }
}

impl TimeoutConfig {
    #[must_use]
    pub fn llm(&self) -> Duration {
        Duration::from_secs(self.llm_seconds)
    }

    #[must_use]
    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_seconds)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Configuration order is connection order.
    pub servers: Vec<ServerEntry>,
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub gemini_api_key: Option<Secret>,
}
