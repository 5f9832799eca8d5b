use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::http::default_client;
use crate::provider::{
    Content, FunctionDeclaration, GenerateRequest, GenerateResponse, LlmProvider, Part,
};
use crate::retry::send_with_retry;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_MAX_RETRIES: u32 = 3;
const PROVIDER: &str = "gemini";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

impl SafetySetting {
    /// The four harm categories, each blocked at medium probability and above.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        [
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
        ]
        .into_iter()
        .map(|category| Self {
            category: category.into(),
            threshold: "BLOCK_MEDIUM_AND_ABOVE".into(),
        })
        .collect()
    }
}

/// Sampling parameters. Read from config in `snake_case`, sent in `camelCase`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    system_instruction: Option<String>,
    safety_settings: Vec<SafetySetting>,
    generation: GenerationConfig,
    max_retries: u32,
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("system_instruction", &self.system_instruction.is_some())
            .field("safety_settings", &self.safety_settings.len())
            .field("generation", &self.generation)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: default_client(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            system_instruction: None,
            safety_settings: SafetySetting::defaults(),
            generation: GenerationConfig::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction.filter(|s| !s.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_safety_settings(mut self, settings: Vec<SafetySetting>) -> Self {
        self.safety_settings = settings;
        self
    }

    #[must_use]
    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn build_body<'a>(&'a self, request: GenerateRequest<'a>) -> RequestBody<'a> {
        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![ToolBlock {
                function_declarations: request.tools,
            }]
        };
        RequestBody {
            contents: request.contents,
            tools,
            system_instruction: self
                .system_instruction
                .as_deref()
                .map(|s| Content {
                    role: None,
                    parts: vec![Part::text(s)],
                }),
            safety_settings: (!self.safety_settings.is_empty()).then_some(&self.safety_settings),
            generation_config: (!self.generation.is_empty()).then_some(&self.generation),
        }
    }

    async fn send(&self, request: GenerateRequest<'_>) -> Result<GenerateResponse, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingApiKey { provider: PROVIDER });
        }
        let body = self.build_body(request);
        let url = self.endpoint();
        tracing::debug!(
            model = self.model,
            messages = request.contents.len(),
            tools = request.tools.len(),
            "sending generateContent request"
        );

        let response = send_with_retry(PROVIDER, self.max_retries, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map_or(text, |body| body.error.message);
            tracing::error!(status = status.as_u16(), "Gemini API error: {message}");
            return Err(LlmError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)?;
        if parsed.candidates.is_empty()
            && let Some(feedback) = &parsed.prompt_feedback
        {
            tracing::warn!(%feedback, "model returned no candidates");
        }
        Ok(parsed)
    }
}

impl LlmProvider for GeminiProvider {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<GenerateResponse, LlmError> {
        self.send(request).await
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestBody<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolBlock<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_settings: Option<&'a Vec<SafetySetting>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<&'a GenerationConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolBlock<'a> {
    function_declarations: &'a [FunctionDeclaration],
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}
