use std::time::Duration;

use futures_util::StreamExt;
use preview_core::{Anchor, ChannelId};
use preview_logging::{preview_debug, preview_warn};
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use url::Url;

use crate::decode::decode_html;
use crate::{FailureKind, FetchError, FetchMetadata, PageSource, RawDocument};

/// Bounded exponential backoff for transient upstream failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Origin serving the previews; feeds live under `{base_url}/s/{handle}`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://t.me".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(15),
            max_bytes: 4 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            user_agent: concat!("channel-preview/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch one preview page of `channel`.
    async fn fetch(
        &self,
        channel: &ChannelId,
        source: PageSource,
    ) -> Result<RawDocument, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
}

struct FetchedBody {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        // Redirects are classified, not followed: the upstream bounces
        // unknown and private channels away from the preview path.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Build the page URL:
    ///
    /// - `{base}/s/{handle}` for the latest posts,
    /// - `?before={id}` / `?after={id}` for older and newer pages,
    /// - `{base}/s/{handle}/{id}` for the page around one post,
    /// - `{base}/{handle}` for the profile page.
    pub fn page_url(&self, channel: &ChannelId, source: PageSource) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.settings.base_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                FetchError::new(FailureKind::InvalidUrl, "base url cannot hold a path")
            })?;
            segments.pop_if_empty();
            match source {
                PageSource::Profile => {
                    segments.push(channel.as_str());
                }
                PageSource::Feed(Anchor::Around(id)) => {
                    segments.extend(["s", channel.as_str(), &id.to_string()]);
                }
                PageSource::Feed(_) => {
                    segments.extend(["s", channel.as_str()]);
                }
            }
        }
        match source {
            PageSource::Feed(Anchor::Before(id)) => {
                url.query_pairs_mut().append_pair("before", &id.to_string());
            }
            PageSource::Feed(Anchor::After(id)) => {
                url.query_pairs_mut().append_pair("after", &id.to_string());
            }
            _ => {}
        }
        Ok(url)
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    async fn fetch_once(&self, url: &Url) -> Result<FetchedBody, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        classify_status(&response)?;

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedBody {
            bytes,
            content_type,
        })
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        channel: &ChannelId,
        source: PageSource,
    ) -> Result<RawDocument, FetchError> {
        let url = self.page_url(channel, source)?;
        let max_attempts = self.settings.retry.max_attempts.max(1);
        let mut attempt = 0;

        let body = loop {
            attempt += 1;
            preview_debug!("fetch {} attempt={}", url, attempt);
            match self.fetch_once(&url).await {
                Ok(body) => break body,
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.settings.retry.delay_after(attempt);
                    preview_warn!(
                        "transient failure channel={} attempt={} delay_ms={}: {}",
                        channel,
                        attempt,
                        delay.as_millis(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        };

        let decoded = decode_html(&body.bytes, body.content_type.as_deref())
            .map_err(|err| FetchError::new(FailureKind::Undecodable, err.to_string()))?;

        Ok(RawDocument {
            channel: channel.clone(),
            source,
            html: decoded.html,
            metadata: FetchMetadata {
                url: url.to_string(),
                attempts: attempt,
                content_type: body.content_type,
                encoding_label: decoded.encoding_label,
                byte_len: body.bytes.len() as u64,
            },
        })
    }
}

fn classify_status(response: &Response) -> Result<(), FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let kind = match status {
        StatusCode::NOT_FOUND => FailureKind::NotFound,
        StatusCode::FORBIDDEN => FailureKind::Forbidden,
        StatusCode::TOO_MANY_REQUESTS => FailureKind::RateLimited {
            retry_after: response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after),
        },
        status if status.is_redirection() => FailureKind::NotFound,
        status => FailureKind::HttpStatus(status.as_u16()),
    };
    Err(FetchError::new(kind, status.to_string()))
}

/// Only the delta-seconds form is honored; HTTP dates yield no hint.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
