use bongchun_llm::Content;

/// Conversation history sent with every model request.
#[derive(Debug, Default, Clone)]
pub struct ChatSession {
    history: Vec<Content>,
}

impl ChatSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn history(&self) -> &[Content] {
        &self.history
    }

    pub fn push(&mut self, content: Content) {
        self.history.push(content);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Drop everything recorded after `len` messages.
    pub fn rollback(&mut self, len: usize) {
        if len < self.history.len() {
            tracing::debug!(
                dropped = self.history.len() - len,
                "rolling back chat history"
            );
            self.history.truncate(len);
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}
