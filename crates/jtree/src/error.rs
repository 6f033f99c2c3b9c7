use std::path::PathBuf;

use jtree_model::{ConfigError, LoadError, SaveError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    #[error("save failed: {0}")]
    Save(#[from] SaveError),

    #[error("profile error: {0}")]
    Config(#[from] ConfigError),

    #[error("required path does not exist: {path}")]
    MissingPath { path: PathBuf },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl CliError {
    /// Process exit code: 2 for rejected documents, 3 for failed saves,
    /// 64 for usage errors, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Load(_) => 2,
            Self::Save(_) => 3,
            Self::Config(_) | Self::InvalidArgument { .. } => 64,
            _ => 1,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
