use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    // Input validation errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Upstream ledger-query errors
    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Upstream rejected request: {0}")]
    UpstreamRejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    // Scan-level errors
    #[error("Failed to fetch target ledger: {source}")]
    TargetFetchFailed {
        #[source]
        source: Box<EngineError>,
    },

    #[error("Scan cancelled")]
    Cancelled,
}

impl EngineError {
    /// Check if error is worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::RateLimited | EngineError::Network(_) | EngineError::Timeout
        )
    }

    /// Get error category for logging/metrics.
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "input",

            EngineError::RateLimited
            | EngineError::Network(_)
            | EngineError::Timeout
            | EngineError::UpstreamRejected(_) => "upstream",

            EngineError::TargetFetchFailed { .. } => "scan",

            EngineError::Cancelled => "cancelled",
        }
    }

    /// Wrap a fetch error as the scan-fatal target failure.
    pub fn target_fetch(source: EngineError) -> Self {
        EngineError::TargetFetchFailed {
            source: Box::new(source),
        }
    }
}

// Result type alias for convenience
pub type EngineResult<T> = Result<T, EngineError>;
