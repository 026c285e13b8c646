use thiserror::Error;

use crate::domain::change::DocumentError;
use crate::repository::errors::RepositoryError;

#[derive(Debug, Error)]
pub enum UsecaseError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid document: {0}")]
    InvalidDocument(#[from] DocumentError),

    #[error("{0}")]
    Internal(String),
}

impl UsecaseError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            UsecaseError::NotFound(_) => "not_found",
            UsecaseError::InvalidDocument(_) => "invalid_document",
            UsecaseError::Internal(_) => "internal",
        }
    }
}

impl From<RepositoryError> for UsecaseError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::DatabaseError(msg) => UsecaseError::Internal(msg),
            malformed @ RepositoryError::MalformedDocument { .. } => {
                UsecaseError::Internal(malformed.to_string())
            }
        }
    }
}
