use std::fmt;
use std::time::Duration;

use preview_core::{Anchor, ChannelId};

/// Which upstream page a fetch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageSource {
    /// A slice of the message feed under `/s/<handle>`.
    Feed(Anchor),
    /// The channel's landing page under `/<handle>`, served even when the
    /// feed preview is disabled.
    Profile,
}

impl fmt::Display for PageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSource::Feed(Anchor::Latest) => write!(f, "latest"),
            PageSource::Feed(Anchor::Before(id)) => write!(f, "before={id}"),
            PageSource::Feed(Anchor::After(id)) => write!(f, "after={id}"),
            PageSource::Feed(Anchor::Around(id)) => write!(f, "around={id}"),
            PageSource::Profile => write!(f, "profile"),
        }
    }
}

/// Decoded preview page as returned by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub channel: ChannelId,
    pub source: PageSource,
    pub html: String,
    pub metadata: FetchMetadata,
}

impl RawDocument {
    /// Feed pages that must carry the channel header: the latest page and a
    /// page opened on a single post. Paginated pages may omit it.
    pub fn expects_header(&self) -> bool {
        matches!(
            self.source,
            PageSource::Feed(Anchor::Latest | Anchor::Around(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub url: String,
    pub attempts: u32,
    pub content_type: Option<String>,
    pub encoding_label: String,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Failures worth another attempt within the retry budget.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            FailureKind::Timeout | FailureKind::Network => true,
            FailureKind::HttpStatus(code) => (500..600).contains(&code),
            _ => false,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Channel does not exist, was deleted, or has no public preview.
    NotFound,
    /// Private or restricted channel.
    Forbidden,
    RateLimited { retry_after: Option<Duration> },
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Undecodable,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NotFound => write!(f, "channel not found"),
            FailureKind::Forbidden => write!(f, "channel forbidden"),
            FailureKind::RateLimited {
                retry_after: Some(delay),
            } => write!(f, "rate limited (retry after {}s)", delay.as_secs()),
            FailureKind::RateLimited { retry_after: None } => write!(f, "rate limited"),
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Undecodable => write!(f, "undecodable body"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
