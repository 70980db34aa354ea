//! Crate error type. Every fallible public call returns [`FramerResult`].

pub type FramerResult<T> = Result<T, FramerError>;

/// Failure categories. The CLI maps them to exit codes.
#[derive(thiserror::Error, Debug)]
pub enum FramerError {
    /// Bad descriptor, mask, frame or template image. Raised before any resource is opened.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation called in the wrong compositor state.
    #[error("state error: {0}")]
    State(String),

    /// External resource (encoder, decoder) could not be acquired or driven.
    #[error("resource error: {0}")]
    Resource(String),

    /// Malformed textual input (hex colors, padding specs, fourcc tags).
    #[error("format error: {0}")]
    Format(String),

    /// Catalog or ffprobe JSON that does not deserialize.
    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_state(&self) -> bool {
        matches!(self, Self::State(_))
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource(_))
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}
