//! Error taxonomy for the geocoding worker.
//!
//! Per-record failures (`Fetch`, per-row `Store`) are captured in a
//! `ProcessResult` and never abort a running batch; `Config` is fatal at
//! startup; `Validation` maps to HTTP 400 with no side effects.

use thiserror::Error;

/// Failure of a single outbound geocoding request, after the retry policy
/// in `services::fetcher` has been exhausted or short-circuited.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The service answered with a non-success, non-429 status.
    #[error("geocoding service returned HTTP {status}")]
    Status { status: u16 },

    /// All retry attempts were consumed (persistent 429 or network failure).
    #[error("request failed after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },
}

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid required settings. Fatal — the worker refuses to
    /// start rather than serving requests it cannot complete.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed or missing request input.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_messages_name_the_failure() {
        let status = FetchError::Status { status: 502 };
        assert!(status.to_string().contains("502"));

        let exhausted = FetchError::Exhausted {
            attempts: 3,
            message: "HTTP 429".to_string(),
        };
        assert!(exhausted.to_string().contains("3 attempts"));
    }

    #[test]
    fn fetch_error_converts_into_worker_error() {
        let err: Error = FetchError::Status { status: 500 }.into();
        assert!(matches!(err, Error::Fetch(_)));
    }
}
