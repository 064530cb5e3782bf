//! Failure kinds for a single asset-page request.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The page attempt did not finish within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection or I/O failure before a response was read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("asset API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not a valid asset page.
    #[error("failed to decode asset page: {0}")]
    Decode(String),

    #[error("fetch cancelled")]
    Cancelled,

    /// The cursor chain exceeded the configured page budget.
    #[error("pagination exceeded {0} pages")]
    PageLimit(usize),
}

impl FetchError {
    /// Timeouts, transport failures, 5xx and 429 are worth another attempt.
    /// Everything else aborts the cycle immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Decode(_) | Self::Cancelled | Self::PageLimit(_) => false,
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport",
            Self::Status { status, .. } if *status == 429 => "rate_limited",
            Self::Status { status, .. } if *status >= 500 => "http_5xx",
            Self::Status { .. } => "http_4xx",
            Self::Decode(_) => "decode",
            Self::Cancelled => "cancelled",
            Self::PageLimit(_) => "page_limit",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
