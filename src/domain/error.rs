use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("unknown document `{reference}`")]
    UnknownDocument { reference: String },
    #[error("invalid document `{key}`: {reason}")]
    InvalidDocument { key: String, reason: String },
}

impl DomainError {
    pub fn unknown_document(reference: impl Into<String>) -> Self {
        Self::UnknownDocument {
            reference: reference.into(),
        }
    }

    pub fn invalid_document(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
