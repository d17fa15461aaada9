//! Core error handling module
//!
//! • Cheap to clone: entries hold their last failure and are snapshotted on
//!   every store transition, so variants carry `CompactString` and
//!   `io::ErrorKind` instead of boxed sources
//! • First-class `tracing` integration through [`DocError::trace`]
//! • `#[non_exhaustive]` for forward-compatible extension
use std::io::{self, ErrorKind};

use compact_str::{CompactString, ToCompactString};
use smallvec::{SmallVec, smallvec};
use thiserror::Error;
use tracing::{Level, event};

/// Convenient alias carrying our unified error type
pub type DocResult<T> = Result<T, DocError>;

/// Primary error enumeration (grouped by concern)
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocError {
    // ────────────────────────────────────────────────────────────
    // Fetch capability
    // ────────────────────────────────────────────────────────────
    #[error("Fetch failed for {locator}: {reason}")]
    FetchFailed {
        locator: CompactString,
        reason: CompactString,
    },

    #[error("Fetch of {locator} timed out after {timeout_ms} ms")]
    FetchTimeout {
        locator: CompactString,
        timeout_ms: u64,
    },

    #[error("Document not found: {0}")]
    NotFound(CompactString),

    // ────────────────────────────────────────────────────────────
    // File-system
    // ────────────────────────────────────────────────────────────
    #[error("I/O error: {kind:?}")]
    Io { kind: ErrorKind },

    // ────────────────────────────────────────────────────────────
    // Input validation
    // ────────────────────────────────────────────────────────────
    #[error("Invalid input: {field} - {message}")]
    InvalidInput {
        field: CompactString,
        message: CompactString,
    },

    // ────────────────────────────────────────────────────────────
    // Configuration
    // ────────────────────────────────────────────────────────────
    #[error("Config error: {0}")]
    Config(CompactString),
}

// ────────────────────────────────────────────────────────────────────────────
// Fast classification helpers
// ────────────────────────────────────────────────────────────────────────────
impl DocError {
    /// Determine whether the browser can keep going after this error
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed { .. }
                | Self::FetchTimeout { .. }
                | Self::NotFound(_)
                | Self::InvalidInput { .. }
        )
    }

    /// Decide if re-dispatching the same key is sensible
    #[inline]
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        matches!(
            self,
            Self::FetchTimeout { .. }
                | Self::Io {
                    kind: ErrorKind::Interrupted | ErrorKind::TimedOut,
                }
        )
    }

    #[inline]
    #[must_use]
    pub const fn operation_type(&self) -> &'static str {
        match self {
            Self::FetchFailed { .. } | Self::FetchTimeout { .. } => "fetch",

            Self::NotFound(_) | Self::Io { .. } => "file_system",

            Self::InvalidInput { .. } => "input_validation",

            Self::Config(_) => "configuration",
        }
    }

    // ────────────────────────────────────────────────────────────
    // Structured-field extraction (SmallVec avoids heap ≤4 items)
    // ────────────────────────────────────────────────────────────
    #[inline]
    #[must_use]
    pub fn extract_trace_fields(&self) -> SmallVec<[(&'static str, CompactString); 4]> {
        match self {
            Self::FetchFailed { locator, reason } => smallvec![
                ("locator", locator.clone()),
                ("reason", reason.clone()),
            ],

            Self::FetchTimeout {
                locator,
                timeout_ms,
            } => smallvec![
                ("locator", locator.clone()),
                ("timeout_ms", timeout_ms.to_compact_string()),
            ],

            Self::NotFound(path) => smallvec![("path", path.clone())],

            Self::InvalidInput { field, message } => smallvec![
                ("field", field.clone()),
                ("message", message.clone()),
            ],

            _ => smallvec![],
        }
    }

    /// Emit a single structured ERROR event and hand the error back.
    #[must_use]
    pub fn trace(self) -> Self {
        let extra: SmallVec<[(&'static str, CompactString); 4]> = self.extract_trace_fields();

        event!(
            Level::ERROR,
            marker = self.error_marker(),
            op_type = self.operation_type(),
            error = %self,
            recoverable = self.is_recoverable(),
            retry = self.should_retry(),
            extra = ?extra,
        );

        self
    }

    // ────────────────────────────────────────────────────────────
    // Lightweight smart-constructors
    // ────────────────────────────────────────────────────────────
    #[inline]
    #[must_use]
    pub fn fetch_failed(locator: &str, reason: impl ToCompactString) -> Self {
        Self::FetchFailed {
            locator: CompactString::new(locator),
            reason: reason.to_compact_string(),
        }
    }

    #[inline]
    #[must_use]
    pub fn fetch_timeout(locator: &str, timeout_ms: u64) -> Self {
        Self::FetchTimeout {
            locator: CompactString::new(locator),
            timeout_ms,
        }
    }

    #[inline]
    #[must_use]
    pub fn not_found(path: &str) -> Self {
        Self::NotFound(CompactString::new(path))
    }

    #[inline]
    #[must_use]
    pub fn invalid_input(field: &str, message: &str) -> Self {
        Self::InvalidInput {
            field: CompactString::new(field),
            message: CompactString::new(message),
        }
    }

    #[inline]
    #[must_use]
    const fn error_marker(&self) -> &'static str {
        match self {
            Self::FetchFailed { .. } => "ERROR_FETCH_FAILED",

            Self::FetchTimeout { .. } => "ERROR_FETCH_TIMEOUT",

            Self::NotFound(_) => "ERROR_NOT_FOUND",

            Self::Io { .. } => "ERROR_IO",

            Self::InvalidInput { .. } => "ERROR_INPUT_VALIDATION",

            Self::Config(_) => "ERROR_CONFIG",
        }
    }
}

impl From<io::Error> for DocError {
    fn from(err: io::Error) -> Self {
        Self::Io { kind: err.kind() }
    }
}

impl From<toml::de::Error> for DocError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_compact_string())
    }
}
