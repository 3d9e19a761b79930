//! Error taxonomy for the repository engine.
//!
//! Every failure that crosses the repository boundary is one of these variants;
//! driver errors are wrapped in [`RepositoryError::Persistence`] with their source kept.

/// Result type alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A composite filter with fewer than two children, or a property filter whose
    /// value does not fit its operator.
    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    /// An operator name outside the supported symbol table.
    #[error("Unsupported filter operator '{0}'")]
    UnsupportedOperator(String),

    /// Pagination parameters or projections that cannot produce a valid query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A table or field name that is not a plain SQL identifier.
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// A record payload that cannot be stored (e.g. not a JSON object).
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Any failure surfaced by the underlying data-access call.
    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// A dialect or key-generator name that does not resolve to an implementation.
    #[error("Unresolved {kind} strategy '{name}'")]
    UnresolvedStrategy { kind: &'static str, name: String },

    /// Missing or unparsable configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RepositoryError {
    pub fn malformed_filter(detail: impl Into<String>) -> Self {
        RepositoryError::MalformedFilter(detail.into())
    }

    pub fn invalid_query(detail: impl Into<String>) -> Self {
        RepositoryError::InvalidQuery(detail.into())
    }

    pub fn unresolved(kind: &'static str, name: impl Into<String>) -> Self {
        RepositoryError::UnresolvedStrategy {
            kind,
            name: name.into(),
        }
    }

    /// True for both filter-shape failures (arity and operator).
    pub fn is_malformed_filter(&self) -> bool {
        matches!(
            self,
            RepositoryError::MalformedFilter(_) | RepositoryError::UnsupportedOperator(_)
        )
    }

    /// True for errors caused by caller input, detected before any statement ran.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            RepositoryError::MalformedFilter(_)
                | RepositoryError::UnsupportedOperator(_)
                | RepositoryError::InvalidQuery(_)
                | RepositoryError::InvalidIdentifier(_)
                | RepositoryError::InvalidRecord(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RepositoryError::malformed_filter("composite filter needs at least 2 children");
        assert_eq!(
            err.to_string(),
            "Malformed filter: composite filter needs at least 2 children"
        );

        let err = RepositoryError::unresolved("dialect", "oracle");
        assert_eq!(err.to_string(), "Unresolved dialect strategy 'oracle'");
    }

    #[test]
    fn test_classification() {
        assert!(RepositoryError::UnsupportedOperator("BETWEEN".into()).is_malformed_filter());
        assert!(!RepositoryError::invalid_query("page_num must be >= 1").is_malformed_filter());
        assert!(RepositoryError::InvalidIdentifier("a b".into()).is_caller_error());

        let err: RepositoryError = sqlx::Error::Protocol("connection reset".into()).into();
        assert!(!err.is_caller_error());
        assert!(std::error::Error::source(&err).is_some());
    }
}
