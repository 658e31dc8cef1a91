//! Error types for transport and content validation failures.
//!
//! Transient-origin failures ([`FetchError`]) are logged and the item is
//! skipped; they are never retried in-loop beyond the transport's own
//! attempts. Content failures ([`ContentError`]) mark the asset failed and
//! are left for the repair pass.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out after {seconds}s: {url}")]
    Timeout { url: String, seconds: u64 },

    #[error("HTTP {status}: {url}")]
    Status { status: u16, url: String },

    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("empty response body from {url}")]
    EmptyBody { url: String },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Classify a reqwest error against the URL it was issued for.
    pub fn from_reqwest(url: &str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                seconds: timeout_secs,
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// A fetched body failed signature validation. Never retried automatically
/// within the same run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("body is an HTML page masquerading as '{filename}'")]
    HtmlBody { filename: String },

    #[error("body of '{filename}' lacks the {magic} magic signature")]
    MissingMagic { filename: String, magic: String },
}
