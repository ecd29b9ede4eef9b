use thiserror::Error;

/// Why a chat completion produced no reply.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The model server could not be reached.
    #[error("request to model server failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer; `body` is whatever the server said.
    #[error("model server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("model response contained no choices")]
    NoChoices,
}
