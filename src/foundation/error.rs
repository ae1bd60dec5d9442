/// Convenience result type used across Limn2d.
pub type LimnResult<T> = Result<T, LimnError>;

/// Top-level error taxonomy used by render graph APIs.
#[derive(thiserror::Error, Debug)]
pub enum LimnError {
    /// Invalid immutable node parameters (negative dimensions, non-finite
    /// values). Raised fail-fast at construction time.
    #[error("construction error: {0}")]
    Construction(String),

    /// Surface or canvas allocation failed. Callers degrade to an empty
    /// operation set instead of aborting the pass.
    #[error("resource error: {0}")]
    Resource(String),

    /// A filter-effect item failed while rendering. Caught at the operation
    /// boundary; the operation draws nothing for the frame.
    #[error("effect error: {0}")]
    Effect(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LimnError {
    /// Build a [`LimnError::Construction`] value.
    pub fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    /// Build a [`LimnError::Resource`] value.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Build a [`LimnError::Effect`] value.
    pub fn effect(msg: impl Into<String>) -> Self {
        Self::Effect(msg.into())
    }
}
