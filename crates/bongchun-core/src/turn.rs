use std::path::Path;

use bongchun_llm::{
    Content, FunctionCall, GenerateRequest, GenerateResponse, LlmProvider, Part, Role,
};
use tracing::Instrument as _;

use crate::attachment::load_image_async;
use crate::client::Client;
use crate::dispatch::dispatch;
use crate::error::TurnError;

/// Prefix `query` with caller-supplied instructions, if any.
#[must_use]
pub fn compose_query(query: &str, additional_prompt: Option<&str>) -> String {
    match additional_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prompt) => format!("{prompt}\n\n---\n\nUser Request:\n{query}"),
        None => query.to_owned(),
    }
}

/// What the leading part of a model reply asks the loop to do.
enum Step {
    Answer(Vec<String>),
    Call {
        calls: Vec<FunctionCall>,
        narration: Vec<String>,
    },
    Unexpected(String),
}

fn texts<'a>(parts: impl Iterator<Item = &'a Part>) -> Vec<String> {
    parts
        .filter_map(|p| p.text.as_deref())
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// `None` when the reply carries no visible parts.
fn classify(content: &Content) -> Option<Step> {
    let mut visible = content.parts.iter().filter(|p| !p.is_thought()).peekable();
    let lead = *visible.peek()?;

    if lead.text.as_deref().is_some_and(|t| !t.is_empty()) {
        return Some(Step::Answer(texts(visible)));
    }
    if lead.function_call.is_some() {
        let visible: Vec<&Part> = visible.collect();
        return Some(Step::Call {
            calls: visible
                .iter()
                .filter_map(|p| p.function_call.clone())
                .collect(),
            narration: texts(visible.into_iter()),
        });
    }
    let shape = serde_json::to_string(lead).unwrap_or_else(|_| format!("{lead:?}"));
    Some(Step::Unexpected(shape))
}

impl<P: LlmProvider> Client<P> {
    /// Run one user turn to a final answer, executing any tools the model asks for.
    ///
    /// A failed turn leaves the chat history as it was before the call.
    ///
    /// # Errors
    ///
    /// Returns a `TurnError` when the attachment is invalid, the model cannot be
    /// reached or answers with nothing usable, the tool round limit is hit, or
    /// the turn is cancelled. Failures of individual tool calls are reported to
    /// the model instead.
    pub async fn process_query(
        &mut self,
        query: &str,
        additional_prompt: Option<&str>,
        attachment: Option<&Path>,
    ) -> Result<String, TurnError> {
        let checkpoint = self.chat.len();
        let span = tracing::info_span!("turn", history = checkpoint);
        let result = self
            .run_turn(query, additional_prompt, attachment)
            .instrument(span)
            .await;
        if let Err(e) = &result {
            tracing::warn!("turn failed: {e}");
            self.chat.rollback(checkpoint);
        }
        result
    }

    async fn run_turn(
        &mut self,
        query: &str,
        additional_prompt: Option<&str>,
        attachment: Option<&Path>,
    ) -> Result<String, TurnError> {
        if self.cancel.is_cancelled() {
            return Err(TurnError::Cancelled);
        }
        if self.registry.is_empty() {
            tracing::warn!("no MCP servers connected, tools are unavailable");
        }

        let mut parts = vec![Part::text(compose_query(query, additional_prompt))];
        if let Some(path) = attachment {
            let image = load_image_async(path.to_owned()).await?;
            tracing::info!(path = %path.display(), mime_type = image.mime_type, "attaching image");
            parts.push(image.to_part());
        }
        self.chat.push(Content::user(parts));

        let max_rounds = self.settings.max_tool_iterations;
        let mut answer = Vec::new();
        let mut rounds = 0usize;
        loop {
            let response = self.ask_model().await?;
            let Some(mut content) = response.candidates.into_iter().next().and_then(|c| c.content)
            else {
                tracing::warn!("model returned no candidates");
                return self.settle(answer, TurnError::NoValidResponse);
            };
            let Some(step) = classify(&content) else {
                tracing::warn!("model returned a candidate without content");
                return self.settle(answer, TurnError::NoValidResponse);
            };
            content.role = Some(Role::Model);

            match step {
                Step::Answer(text) => {
                    self.chat.push(content);
                    answer.extend(text);
                    tracing::info!(rounds, "turn finished");
                    return Ok(answer.join("\n"));
                }
                Step::Unexpected(shape) => {
                    tracing::warn!(shape, "unexpected response shape from the model");
                    return self.settle(answer, TurnError::UnexpectedResponse(shape));
                }
                Step::Call { calls, narration } => {
                    if rounds == max_rounds {
                        return Err(TurnError::MaxToolCalls(max_rounds));
                    }
                    rounds += 1;
                    tracing::debug!(iteration = rounds, calls = calls.len(), "model requested tools");
                    answer.extend(narration);
                    self.chat.push(content);

                    let mut responses = Vec::with_capacity(calls.len());
                    for call in &calls {
                        let outcome = tokio::select! {
                            biased;
                            () = self.cancel.cancelled() => return Err(TurnError::Cancelled),
                            outcome = dispatch(
                                &self.registry,
                                &self.catalog,
                                call,
                                |msg| self.emit_status(msg),
                            ) => outcome,
                        };
                        responses.push(Part::function_response(
                            call.name.clone(),
                            outcome.render(&call.name),
                        ));
                    }
                    self.chat.push(Content::user(responses));
                }
            }
        }
    }

    /// End the turn on text gathered from earlier rounds, recording it as the
    /// model's reply so history keeps alternating roles.
    fn settle(&mut self, answer: Vec<String>, otherwise: TurnError) -> Result<String, TurnError> {
        if answer.is_empty() {
            return Err(otherwise);
        }
        let text = answer.join("\n");
        self.chat.push(Content::model(vec![Part::text(text.clone())]));
        Ok(text)
    }

    async fn ask_model(&self) -> Result<GenerateResponse, TurnError> {
        let request = GenerateRequest {
            contents: self.chat.history(),
            tools: &self.declarations,
        };
        let limit = self.settings.llm_timeout;
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(TurnError::Cancelled),
            result = tokio::time::timeout(limit, self.provider.generate(request)) => match result {
                Ok(response) => Ok(response?),
                Err(_) => Err(TurnError::Timeout(limit.as_secs())),
            },
        }
    }
}

#[cfg(test)]
mod tests;
