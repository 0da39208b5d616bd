use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("k must be greater than zero")]
    ZeroK,
    #[error("candidate_limit must be greater than zero")]
    ZeroCandidateLimit,
    #[error("max_tokens_in_query must be greater than zero")]
    ZeroMaxTokens,
    #[error("alpha must be within [0, 1], got {0}")]
    AlphaOutOfRange(f64),
    #[error("rrf_constant must be a finite non-negative number, got {0}")]
    InvalidRrfConstant(f64),
    #[error("bm25 parameter `{name}` is invalid: {value}")]
    InvalidBm25Param { name: &'static str, value: f64 },
    #[error("`{field}` is not a valid identifier: {value:?}")]
    InvalidIdentifier { field: &'static str, value: String },
    #[error("metadata column `{0}` is listed more than once")]
    DuplicateMetadataColumn(String),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("candidate row {row} is missing metadata column `{column}`")]
    MalformedRow { row: usize, column: String },
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_errors_keep_their_message() {
        let err = RetrievalError::from(anyhow::anyhow!("connection reset by peer"));
        assert_eq!(err.to_string(), "connection reset by peer");
    }

    #[test]
    fn malformed_row_names_the_column() {
        let err = RetrievalError::MalformedRow {
            row: 3,
            column: "SOURCE".to_string(),
        };
        assert!(err.to_string().contains("`SOURCE`"));
    }
}
