use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems; all of these abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported config file format: {0:?} (supported: .yaml, .yml, .toml, .hcl)")]
    UnsupportedFormat(String),
    #[error("failed to parse config file: {0}")]
    Parse(String),
    #[error("no users defined in config")]
    NoUsers,
    #[error("user at index {index} has no name")]
    MissingName { index: usize },
    #[error("user {name} has no token")]
    MissingToken { name: String },
    #[error("user {name} is defined more than once")]
    DuplicateUser { name: String },
    #[error("invalid api_url {url:?}: {reason}")]
    InvalidApiUrl { url: String, reason: String },
    #[error("invalid listen_addr {0:?}")]
    InvalidListenAddr(String),
    #[error("invalid metrics_path {0:?}: must not be \"/\" or \"/health\"")]
    InvalidMetricsPath(String),
}

/// A failed rate-limit fetch for one account.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("token for {account} is not a valid header value")]
    InvalidToken { account: String },
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("GitHub responded {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("failed to decode rate limit response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl FetchError {
    /// Stable snake_case classification, suitable for log fields.
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::Build(_) | FetchError::InvalidToken { .. } => "client_error",
            FetchError::Transport(e) if e.is_timeout() => "timeout",
            FetchError::Transport(_) => "upstream_error",
            FetchError::Status { status, .. } => status_code_name(*status),
            FetchError::Decode(_) => "server_error",
        }
    }
}

pub fn status_code_name(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "bad_request",
        StatusCode::UNAUTHORIZED => "unauthorized",
        StatusCode::FORBIDDEN => "forbidden",
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::TOO_MANY_REQUESTS => "rate_limited",
        s if s.is_server_error() => "upstream_error",
        _ => "server_error",
    }
}
