use reqwest::StatusCode;
use thiserror::Error;

pub type ImportResult<T> = Result<T, ImportError>;

/// Errors that abort the whole run.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("input file has no header row")]
    MissingHeader,
    #[error("input header is missing the required '{0}' column")]
    MissingColumn(&'static str),
    #[error("input header lists '{0}' more than once")]
    DuplicateField(String),
    #[error("row {line} has {actual} fields, header defines {expected}")]
    RowWidth {
        line: u64,
        expected: usize,
        actual: usize,
    },
    #[error("unsupported password type '{0}'")]
    UnknownPasswordMode(String),
    #[error("password type {mode} requires a '{column}' column in the input")]
    MissingCredentialColumn {
        mode: &'static str,
        column: &'static str,
    },
    #[error("attribute '{0}' is present in the input but not defined in the user profile schema")]
    UnknownAttribute(String),
    #[error("failed to retrieve user schema: {0}")]
    SchemaFetch(#[source] ApiError),
    #[error("user schema request returned status {status}: {body}")]
    SchemaStatus { status: StatusCode, body: String },
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors raised while submitting a single request to the remote service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("missing or invalid rate limit header '{0}'")]
    RateLimitHeader(&'static str),
    #[error("still rate limited after waiting for the reset window")]
    RateLimited,
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Http(err)
        }
    }
}
