mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};
use bongchun_llm::{GeminiProvider, SafetySetting};

use crate::client::ClientSettings;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the resulting values are out of range.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error when a setting cannot produce a working client.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.agent.max_tool_iterations == 0 {
            bail!("agent.max_tool_iterations must be at least 1");
        }
        if self.timeouts.llm_seconds == 0 {
            bail!("timeouts.llm_seconds must be at least 1");
        }
        if self.timeouts.shutdown_seconds == 0 {
            bail!("timeouts.shutdown_seconds must be at least 1");
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        Ok(())
    }

    #[must_use]
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            max_tool_iterations: self.agent.max_tool_iterations,
            collision_policy: self.agent.collision_policy,
            llm_timeout: self.timeouts.llm(),
            shutdown_timeout: self.timeouts.shutdown(),
        }
    }

    /// Build the Gemini provider from the `[llm]` section and the resolved key.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key was found in the environment.
    pub fn gemini_provider(&self) -> anyhow::Result<GeminiProvider> {
        let Some(key) = &self.secrets.gemini_api_key else {
            bail!("Gemini API key missing: set BONGCHUN_GEMINI_API_KEY or GOOGLE_API_KEY");
        };
        let safety = self
            .llm
            .safety_settings
            .clone()
            .unwrap_or_else(SafetySetting::defaults);
        Ok(GeminiProvider::new(key.expose(), self.llm.model.clone())
            .with_base_url(self.llm.base_url.clone())
            .with_system_instruction(self.llm.system_instruction.clone())
            .with_safety_settings(safety)
            .with_generation_config(self.llm.generation.clone())
            .with_max_retries(self.llm.max_retries))
    }
}
