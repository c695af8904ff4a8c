//! Error types shared across Gazer crates.

use std::path::PathBuf;

/// Top-level error type for Gazer operations.
#[derive(Debug, thiserror::Error)]
pub enum GazerError {
    /// The GPU context or window could not be created.
    #[error("GPU resource unavailable: {message}")]
    ResourceUnavailable { message: String },

    /// A context-bound operation ran before activation or off the owning thread.
    #[error("GPU context inactive: {message}")]
    ContextInactive { message: String },

    #[error("GPU error: {message}")]
    Gpu { message: String },

    #[error("Frame source error: {message}")]
    Source { message: String },

    #[error("Unsupported pixel format: {format}")]
    UnsupportedFormat { format: String },

    /// The recording destination could not be created or opened.
    #[error("Output stream unavailable: {message}")]
    StreamUnavailable { message: String },

    #[error("Recording error: {message}")]
    Recording { message: String },

    #[error("Present failed: {message}")]
    Present { message: String },

    #[error("Processing error: {message}")]
    Processing { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using GazerError.
pub type GazerResult<T> = Result<T, GazerError>;

impl GazerError {
    pub fn resource_unavailable(msg: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            message: msg.into(),
        }
    }

    pub fn context_inactive(msg: impl Into<String>) -> Self {
        Self::ContextInactive {
            message: msg.into(),
        }
    }

    pub fn gpu(msg: impl Into<String>) -> Self {
        Self::Gpu {
            message: msg.into(),
        }
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source {
            message: msg.into(),
        }
    }

    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn stream_unavailable(msg: impl Into<String>) -> Self {
        Self::StreamUnavailable {
            message: msg.into(),
        }
    }

    pub fn recording(msg: impl Into<String>) -> Self {
        Self::Recording {
            message: msg.into(),
        }
    }

    pub fn present(msg: impl Into<String>) -> Self {
        Self::Present {
            message: msg.into(),
        }
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the run can continue after this error.
    ///
    /// Recording and presentation failures degrade the run; everything else
    /// stops it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StreamUnavailable { .. } | Self::Recording { .. } | Self::Present { .. }
        )
    }
}
