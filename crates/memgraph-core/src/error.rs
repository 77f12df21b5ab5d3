//! Error types for Memgraph

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Upstream(String),

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("tool error: {name} - {message}")]
    ToolFailed { name: String, message: String },

    #[error("rename failed at {stage}: {message}")]
    RenameFailed { stage: RenameStage, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used by callers that branch on failure class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Upstream,
}

/// Steps of an entity rename, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenameStage {
    CreateEntity,
    CreateRelations,
    DeleteEntity,
}

impl RenameStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenameStage::CreateEntity => "create_entity",
            RenameStage::CreateRelations => "create_relations",
            RenameStage::DeleteEntity => "delete_entity",
        }
    }
}

impl std::fmt::Display for RenameStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    pub fn tool_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn rename_failed(stage: RenameStage, source: &Error) -> Self {
        Self::RenameFailed {
            stage,
            message: source.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Upstream(_)
            | Error::ConnectFailed(_)
            | Error::ToolFailed { .. }
            | Error::RenameFailed { .. }
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_) => ErrorKind::Upstream,
        }
    }

    /// Stage at which a rename stopped, if this error came from one.
    pub fn rename_stage(&self) -> Option<RenameStage> {
        match self {
            Error::RenameFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
