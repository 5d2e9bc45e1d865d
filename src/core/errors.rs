use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        RagError::Internal(err.to_string())
    }

    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        RagError::Storage(err.to_string())
    }

    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        RagError::Embedding(err.to_string())
    }

    /// True for failures of a collaborator (database, embedding service) rather
    /// than of the request itself.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, RagError::Storage(_) | RagError::Embedding(_))
    }
}

impl From<sqlx::Error> for RagError {
    fn from(err: sqlx::Error) -> Self {
        RagError::storage(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_errors_are_classified() {
        assert!(RagError::storage("disk gone").is_infrastructure());
        assert!(RagError::embedding("timeout").is_infrastructure());
        assert!(!RagError::BadRequest("top_k".into()).is_infrastructure());
        assert!(!RagError::DimensionMismatch {
            expected: 128,
            actual: 3
        }
        .is_infrastructure());
    }

    #[test]
    fn dimension_mismatch_message_names_both_sizes() {
        let err = RagError::DimensionMismatch {
            expected: 128,
            actual: 64,
        };
        assert_eq!(
            err.to_string(),
            "embedding dimension mismatch: expected 128, got 64"
        );
    }
}
