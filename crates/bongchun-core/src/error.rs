use std::path::PathBuf;

use bongchun_llm::LlmError;

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("attachment not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("attachment is not a regular file: {}", path.display())]
    NotAFile { path: PathBuf },

    #[error("attachment is not an image ({mime}): {}", path.display())]
    NotAnImage { path: PathBuf, mime: String },

    #[error("failed to read attachment {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("attachment is not a valid image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("attachment validation was interrupted")]
    Interrupted,
}

/// Failures that end a turn without an answer.
///
/// Per-tool failures never show up here; they are fed back to the model.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error("model request failed: {0}")]
    Model(#[from] LlmError),

    #[error("no valid response received from the model")]
    NoValidResponse,

    #[error("unexpected response shape from the model: {0}")]
    UnexpectedResponse(String),

    #[error("tool call limit reached ({0} rounds) without a final answer")]
    MaxToolCalls(usize),

    #[error("turn cancelled")]
    Cancelled,

    #[error("model did not respond within {0}s")]
    Timeout(u64),
}
