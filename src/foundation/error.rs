use serde::Serialize;

/// Convenience result type used across mathviz.
pub type MathvizResult<T> = Result<T, MathvizError>;

/// Error taxonomy surfaced by the render pipeline.
#[derive(thiserror::Error, Debug)]
pub enum MathvizError {
    /// Malformed, incomplete, or unrecognized problem descriptor.
    #[error("validation error: {0}")]
    Validation(String),

    /// The transient workspace (or the configuration it depends on) could not be prepared.
    #[error("config error: {0}")]
    Config(String),

    /// The external scene renderer failed, was killed, or could not be started.
    #[error("render error: {message}")]
    Render {
        message: String,
        diagnostic: Option<String>,
    },

    /// The renderer reported success but its contract was not met.
    #[error("internal error: {0}")]
    Internal(String),

    /// Publishing into the cache failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of a [`MathvizError`], stable across messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Config,
    Render,
    Internal,
    Storage,
}

impl MathvizError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn render(msg: impl Into<String>, diagnostic: Option<String>) -> Self {
        Self::Render {
            message: msg.into(),
            diagnostic,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Config(_) => ErrorKind::Config,
            Self::Render { .. } => ErrorKind::Render,
            Self::Internal(_) | Self::Other(_) => ErrorKind::Internal,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// The user-facing message, without the kind prefix used by `Display`.
    pub fn message(&self) -> String {
        match self {
            Self::Validation(m) | Self::Config(m) | Self::Internal(m) | Self::Storage(m) => {
                m.clone()
            }
            Self::Render { message, .. } => message.clone(),
            Self::Other(e) => format!("{e:#}"),
        }
    }

    /// Renderer diagnostics (captured stderr), when available.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Render { diagnostic, .. } => diagnostic.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
