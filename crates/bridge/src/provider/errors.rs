use thiserror::Error;

/// Errors from a tool provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not connected to a tool server")]
    NotConnected,

    #[error("failed to connect to tool server {server}: {source}")]
    Connect {
        server: String,
        #[source]
        source: mcp::Error,
    },

    #[error(transparent)]
    Mcp(#[from] mcp::Error),

    #[error("unreadable tool output: {0}")]
    Output(#[from] serde_json::Error),
}
