use thiserror::Error;

use crate::config::ConfigError;
use crate::model::ModelError;
use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("tool call limit of {0} rounds exceeded")]
    ToolRoundLimit(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
