//! Shared primitives for all Rust crates in Runtally.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Result type used across Runtally crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
///
/// Every category is fatal for one monitoring run; recovery is left to the
/// next scheduled invocation.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing credential or invalid run parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Upstream call failed, timed out, or returned an unusable body.
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream pagination did not add up to the reported total.
    #[error("incomplete data: {0}")]
    IncompleteData(String),

    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the process exit code for this error category.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 2,
            Self::Transport(_) => 3,
            Self::IncompleteData(_) => 4,
            Self::Validation(_) | Self::Internal(_) => 1,
        }
    }
}
