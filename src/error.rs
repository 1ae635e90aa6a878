use thiserror::Error;

/// Main error type for the query-processing core.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    /// Bad input: empty query text, malformed filter, invalid config.
    #[error("validation error: {0}")]
    Validation(String),

    /// Upstream credential failure against an embedding provider or vector
    /// backend; retried once after re-auth before surfacing.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Transport-level failure talking to a vector backend or embedding
    /// provider; retried with exponential back-off.
    #[error("connection error: {0}")]
    Connection(String),

    /// An individual call or the whole pipeline exceeded its deadline.
    #[error("operation timed out")]
    Timeout,

    /// Upstream rate limit hit.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit { retry_after_secs: u64 },

    /// Admission gate is full (maxConcurrentQueries reached).
    #[error("capacity exceeded, retry after {retry_after_secs}s")]
    CapacityExceeded { retry_after_secs: u64 },

    /// Catch-all internal failure during parsing, optimization, fan-out, or
    /// response synthesis. Never surfaced raw from `process` — converted to
    /// the sentinel Query Result instead.
    #[error("processing error: {0}")]
    Processing(String),
}

impl CoreError {
    /// Status-code hint for the (out-of-scope) HTTP layer.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation(_) => 400,
            CoreError::Authentication(_) => 401,
            CoreError::Connection(_) => 502,
            CoreError::Timeout => 408,
            CoreError::RateLimit { .. } => 429,
            CoreError::CapacityExceeded { .. } => 503,
            CoreError::Processing(_) => 500,
        }
    }

    /// True if this is a backend connection failure, the kind the circuit
    /// breaker and retry executor care about.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, CoreError::Connection(_))
    }

    pub fn is_authentication_error(&self) -> bool {
        matches!(self, CoreError::Authentication(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CoreError::Timeout)
    }

    /// Whether `QueryProcessor::process` surfaces this error to the caller
    /// instead of degrading to the sentinel Query Result.
    pub fn surfaces_to_caller(&self) -> bool {
        matches!(
            self,
            CoreError::Validation(_) | CoreError::Timeout | CoreError::CapacityExceeded { .. }
        )
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            CoreError::RateLimit { retry_after_secs } => Some(*retry_after_secs),
            CoreError::CapacityExceeded { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Processing(format!("serialization error: {err}"))
    }
}

/// Result type alias for core operations. The data entity with the same
/// informal name is `SearchHit` (see `types.rs`) to avoid colliding with
/// this alias.
pub type CoreResult<T> = Result<T, CoreError>;

/// Validation error for request construction (query text, filters, top-k).
#[derive(Debug, Error, Clone)]
pub enum ValidationError {
    #[error("invalid query text: {0}")]
    InvalidText(String),

    #[error("invalid top_k: {0}")]
    InvalidTopK(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ValidationError> for CoreError {
    fn from(err: ValidationError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(CoreError::Validation("x".into()).status_code(), 400);
        assert_eq!(CoreError::Authentication("x".into()).status_code(), 401);
        assert_eq!(CoreError::Connection("x".into()).status_code(), 502);
        assert_eq!(CoreError::Timeout.status_code(), 408);
        assert_eq!(
            CoreError::RateLimit { retry_after_secs: 5 }.status_code(),
            429
        );
        assert_eq!(
            CoreError::CapacityExceeded { retry_after_secs: 1 }.status_code(),
            503
        );
        assert_eq!(CoreError::Processing("x".into()).status_code(), 500);
    }

    #[test]
    fn only_validation_timeout_capacity_surface() {
        assert!(CoreError::Validation("x".into()).surfaces_to_caller());
        assert!(CoreError::Timeout.surfaces_to_caller());
        assert!(CoreError::CapacityExceeded { retry_after_secs: 1 }.surfaces_to_caller());
        assert!(!CoreError::Processing("x".into()).surfaces_to_caller());
        assert!(!CoreError::Connection("x".into()).surfaces_to_caller());
        assert!(!CoreError::Authentication("x".into()).surfaces_to_caller());
    }

    #[test]
    fn validation_error_converts_to_core_error() {
        let err: CoreError = ValidationError::InvalidTopK("must be positive".into()).into();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
