use std::time::Duration;

use preview_core::{ChannelId, InvalidChannelId, PostId};

use crate::cache::CacheableError;
use crate::parse::ParseError;
use crate::{FailureKind, FetchError};

/// Failure of a public query, as seen by callers of the service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("channel {0} not found")]
    NotFound(ChannelId),
    #[error("post {post} not found in channel {channel}")]
    PostNotFound { channel: ChannelId, post: PostId },
    #[error("channel {0} is private or restricted")]
    Forbidden(ChannelId),
    #[error("upstream rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("upstream timed out")]
    Timeout,
    #[error("preview page could not be read: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    InvalidChannel(#[from] InvalidChannelId),
    #[error("cursor belongs to channel {cursor}, not {requested}")]
    InvalidCursor {
        cursor: ChannelId,
        requested: ChannelId,
    },
}

impl QueryError {
    pub fn from_fetch(channel: &ChannelId, err: FetchError) -> Self {
        match err.kind {
            FailureKind::NotFound => Self::NotFound(channel.clone()),
            FailureKind::Forbidden => Self::Forbidden(channel.clone()),
            FailureKind::RateLimited { retry_after } => Self::RateLimited { retry_after },
            FailureKind::Timeout => Self::Timeout,
            _ => Self::Upstream(err.to_string()),
        }
    }

    /// HTTP status an outer surface should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::PostNotFound { .. } => 404,
            Self::Forbidden(_) => 403,
            Self::RateLimited { .. } => 429,
            Self::Upstream(_) | Self::Parse(_) => 502,
            Self::Timeout => 503,
            Self::InvalidChannel(_) | Self::InvalidCursor { .. } => 400,
        }
    }
}

impl CacheableError for QueryError {
    /// Missing and private channels only.
    fn is_cacheable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Forbidden(_))
    }

    fn interrupted() -> Self {
        Self::Upstream("fetch interrupted".to_string())
    }
}
