use thiserror::Error;

/// Category of a query failure.
///
/// Every [`Error`] carries exactly one code so callers can branch without
/// string matching; the `is_*` helpers on [`Error`] cover the common cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed JSONPath expression.
    InvalidPath,
    /// The document bytes could not be parsed as JSON.
    InvalidJson,
    /// A filter expression could not be parsed, or its regex failed to compile.
    InvalidFilter,
    /// Invalid parameters at an entry point.
    InvalidInput,
    /// A named member was absent (strict mode only).
    KeyNotFound,
    /// An array index fell outside `[0, len)` after normalization (strict mode only).
    IndexOutOfBounds,
    /// The node had a different shape than the step required (strict mode only).
    TypeMismatch,
    /// Recursive descent exceeded the configured depth limit.
    MaxDepthExceeded,
    /// The cancellation signal was tripped mid-query.
    Cancelled,
}

/// The error type returned by every fallible operation in this crate.
#[derive(Debug, Error)]
#[error("jsonpath: {message}")]
pub struct Error {
    code: ErrorCode,
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub(crate) fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    pub(crate) fn with_cause(
        code: ErrorCode,
        message: impl Into<String>,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    /// The category of this error.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The human-readable description, without the `jsonpath:` prefix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// True for path syntax errors.
    pub fn is_path_error(&self) -> bool {
        self.code == ErrorCode::InvalidPath
    }

    /// True when the document bytes failed to parse.
    pub fn is_json_error(&self) -> bool {
        self.code == ErrorCode::InvalidJson
    }

    /// True for filter parse or regex compile failures.
    pub fn is_filter_error(&self) -> bool {
        self.code == ErrorCode::InvalidFilter
    }

    /// True for strict-mode misses: an absent key or an out-of-range index.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::KeyNotFound | ErrorCode::IndexOutOfBounds
        )
    }

    /// True when the query was cancelled through its signal.
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }
}

pub type Result<T> = std::result::Result<T, Error>;
