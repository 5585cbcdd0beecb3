use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SliceError {
    /// Inputs were rejected before any work started.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The cancel callback tripped, no partial result is returned.
    #[error("Slicing was cancelled")]
    Cancelled,
}

pub type SliceResult<T> = std::result::Result<T, SliceError>;

impl SliceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SliceError::invalid("heights are not sorted");
        assert_eq!(err.to_string(), "Invalid argument: heights are not sorted");
        assert_eq!(SliceError::Cancelled.to_string(), "Slicing was cancelled");
    }
}
