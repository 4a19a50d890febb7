use crate::doc::DocumentError;

/// Caller-contract violations reported by [`crate::builder::ScopedBuilder`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuilderError {
    #[error("invalid builder state: {reason}")]
    InvalidState { reason: String },
    #[error("scope underflow: end_within called with no open scope")]
    ScopeUnderflow,
}

impl BuilderError {
    pub(crate) fn invalid_state(reason: impl Into<String>) -> Self {
        BuilderError::InvalidState {
            reason: reason.into(),
        }
    }
}

impl From<DocumentError> for BuilderError {
    fn from(err: DocumentError) -> Self {
        BuilderError::invalid_state(err.to_string())
    }
}

pub type BuilderResult<T> = Result<T, BuilderError>;
