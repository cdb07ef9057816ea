//! Application-wide error types.

use thiserror::Error;

/// Application error types.
///
/// Every service error is surfaced to callers as one of these variants.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error (malformed input, out-of-range dates, over-payment).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Business rule violation on well-formed input.
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Datastore error. The message is for logs, not for end users.
    #[error("Database error: {0}")]
    Database(String),

    /// Datastore did not answer in time.
    #[error("Datastore timeout: {0}")]
    Timeout(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::BusinessRule(_) => 422,
            Self::Timeout(_) => 503,
            Self::Database(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Timeout(_) => "DATASTORE_TIMEOUT",
        }
    }

    /// Returns the message that may be shown to an end user.
    ///
    /// Datastore failures are collapsed into a generic retry message so
    /// that table names and driver details stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::BusinessRule(msg) => msg.clone(),
            Self::Database(_) | Self::Timeout(_) => {
                "The operation could not be completed, please try again".to_string()
            }
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
