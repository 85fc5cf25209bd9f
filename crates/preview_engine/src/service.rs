use std::sync::Arc;
use std::time::Duration;

use preview_core::{
    order_newest_first, Anchor, ChannelDescriptor, ChannelId, ChannelPage, Cursor, Post, PostId,
    PostsPage,
};
use preview_logging::{preview_info, preview_warn};

use crate::cache::{CacheSettings, PageKey, ResponseCache};
use crate::error::QueryError;
use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::ingest::ingest;
use crate::parse::{Landmark, ParseError};
use crate::{FetchError, PageSource};

pub type PageCache = ResponseCache<ChannelPage, QueryError>;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Upper bound on one query, including waiting for a shared fetch.
    pub request_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Read-only queries over public channel previews.
///
/// The first page of a channel backs both [`PreviewService::get_channel`] and
/// an uncursored [`PreviewService::get_posts`], so the two share one fetch
/// and one cache entry.
#[derive(Clone)]
pub struct PreviewService {
    fetcher: Arc<dyn Fetcher>,
    cache: PageCache,
    settings: ServiceSettings,
}

impl PreviewService {
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: PageCache, settings: ServiceSettings) -> Self {
        Self {
            fetcher,
            cache,
            settings,
        }
    }

    /// Wire the HTTP fetcher and a fresh cache.
    pub fn from_settings(
        fetch: FetchSettings,
        cache: CacheSettings,
        settings: ServiceSettings,
    ) -> Result<Self, FetchError> {
        let fetcher = ReqwestFetcher::new(fetch)?;
        Ok(Self::new(
            Arc::new(fetcher),
            ResponseCache::new(cache),
            settings,
        ))
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Channel descriptor from the feed header. Channels without a public feed
    /// are looked up on their profile page before being reported missing.
    pub async fn get_channel(&self, channel: &ChannelId) -> Result<ChannelDescriptor, QueryError> {
        match self.page(channel, PageSource::Feed(Anchor::Latest)).await {
            Ok(page) => page
                .channel
                .ok_or(QueryError::Parse(ParseError::MissingLandmark(
                    Landmark::ChannelHeader,
                ))),
            Err(QueryError::NotFound(_)) => {
                preview_info!("no feed preview for {}, trying its profile page", channel);
                let page = self.page(channel, PageSource::Profile).await?;
                page.channel
                    .ok_or_else(|| QueryError::NotFound(channel.clone()))
            }
            Err(err) => Err(err),
        }
    }

    /// One post, read from the feed page the upstream opens around it.
    pub async fn get_post(&self, channel: &ChannelId, post: PostId) -> Result<Post, QueryError> {
        let page = self
            .page(channel, PageSource::Feed(Anchor::Around(post)))
            .await?;
        page.posts
            .into_iter()
            .find(|candidate| candidate.id == post)
            .ok_or_else(|| QueryError::PostNotFound {
                channel: channel.clone(),
                post,
            })
    }

    /// Posts newest first. Without a cursor this is the most recent page;
    /// with one, the page strictly older or strictly newer than the cursor
    /// position, following the cursor's direction.
    pub async fn get_posts(
        &self,
        channel: &ChannelId,
        cursor: Option<&Cursor>,
    ) -> Result<PostsPage, QueryError> {
        if let Some(cursor) = cursor {
            if cursor.channel != *channel {
                return Err(QueryError::InvalidCursor {
                    cursor: cursor.channel.clone(),
                    requested: channel.clone(),
                });
            }
        }
        let anchor = cursor.map(Cursor::anchor).unwrap_or(Anchor::Latest);
        let page = self.page(channel, PageSource::Feed(anchor)).await?;
        let mut posts = page.posts;
        order_newest_first(&mut posts);
        Ok(PostsPage {
            posts,
            next: page.next,
        })
    }

    /// Forget every cached page of `channel`.
    pub fn invalidate(&self, channel: &ChannelId) -> usize {
        let removed = self.cache.invalidate(channel);
        preview_info!("invalidated {} cached pages of {}", removed, channel);
        removed
    }

    async fn page(
        &self,
        channel: &ChannelId,
        source: PageSource,
    ) -> Result<ChannelPage, QueryError> {
        let key = PageKey::new(channel.clone(), source);
        let fetcher = Arc::clone(&self.fetcher);
        let requested = channel.clone();
        let lookup = self.cache.get_or_fetch(key, move || async move {
            let document = fetcher
                .fetch(&requested, source)
                .await
                .map_err(|err| QueryError::from_fetch(&requested, err))?;
            let page = ingest(&document)?;
            preview_info!(
                "ingested channel={} {} posts={} attempts={}",
                requested,
                source,
                page.posts.len(),
                document.metadata.attempts
            );
            Ok(page)
        });

        match tokio::time::timeout(self.settings.request_timeout, lookup).await {
            Ok(result) => result,
            Err(_) => {
                preview_warn!("query timed out channel={} {}", channel, source);
                Err(QueryError::Timeout)
            }
        }
    }
}
