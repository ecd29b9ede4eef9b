use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("FHIR_API_BASE is not set")]
    MissingEndpoint,

    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    #[error("FHIR request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("FHIR request failed with status {0}")]
    Status(u16),

    #[error(transparent)]
    Mcp(#[from] mcp::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
