use thiserror::Error;

use crate::content::ContentError;
use crate::definition::DefinitionError;

#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error in {path}: {source}")]
    TomlError {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SpawnError>;
