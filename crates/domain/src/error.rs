/// Shared error type used across all puo-assist crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// The data service could not be reached within the retry ceiling
    /// (timeouts, connection failures, 5xx responses).
    #[error("data service unavailable at {endpoint} after {attempts} attempt(s): {message}")]
    UpstreamUnavailable {
        endpoint: String,
        attempts: u32,
        message: String,
    },

    /// The data service answered with a validation-type failure (4xx).
    /// The body is carried verbatim and never retried.
    #[error("data service rejected {endpoint} ({status}): {body}")]
    UpstreamRejected {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A session id that cannot name a history file.
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("LLM {provider}: {message}")]
    Llm { provider: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short machine-readable tag, used in invocation logs and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Http(_) => "http",
            Error::Timeout(_) => "timeout",
            Error::UpstreamUnavailable { .. } => "upstream_unavailable",
            Error::UpstreamRejected { .. } => "upstream_rejected",
            Error::SessionNotFound(_) => "session_not_found",
            Error::InvalidSessionId(_) => "invalid_session_id",
            Error::Llm { .. } => "llm",
            Error::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
