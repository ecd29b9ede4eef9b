//! CLI error types.

use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The tool server could not be started or did not list its tools.
    ///
    /// The cause has already been logged by the bridge.
    #[error("tools from server '{server}' are unavailable; see the log for details")]
    ToolsUnavailable { server: String },

    /// An error occurred in the bridge layer.
    #[error(transparent)]
    Bridge(#[from] bridge::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<bridge::ConfigError> for Error {
    fn from(e: bridge::ConfigError) -> Self {
        Self::Bridge(e.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
