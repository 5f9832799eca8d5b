use super::{Config, Secret};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BONGCHUN_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("BONGCHUN_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("BONGCHUN_MAX_TOOL_ITERATIONS") {
            match v.parse::<usize>() {
                Ok(n) if n > 0 => self.agent.max_tool_iterations = n,
                _ => tracing::warn!("ignoring invalid BONGCHUN_MAX_TOOL_ITERATIONS value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("BONGCHUN_LLM_TIMEOUT") {
            match v.parse::<u64>() {
                Ok(secs) if secs > 0 => self.timeouts.llm_seconds = secs,
                _ => tracing::warn!("ignoring invalid BONGCHUN_LLM_TIMEOUT value: {v}"),
            }
        }

        self.secrets.gemini_api_key = ["BONGCHUN_GEMINI_API_KEY", "GOOGLE_API_KEY"]
            .into_iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|v| !v.trim().is_empty())
            .map(Secret::new);
    }
}
