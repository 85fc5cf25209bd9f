use preview_core::{newer_cursor, next_cursor, Anchor, ChannelPage, NextPage};
use preview_logging::{preview_debug, preview_warn};
use scraper::Html;

use crate::normalize::{normalize, normalize_profile, NormalizedPage};
use crate::parse::{parse_document, parse_profile, ParseError};
use crate::{PageSource, RawDocument};

/// Parse, normalize and resolve the next cursor for one fetched page.
///
/// The parsed tree is not `Send` and never lives across an `.await`. On a
/// paginated page, posts at or past the requested position are upstream
/// boundary repeats and are dropped, so the resolved cursor always moves
/// strictly away from it. A profile page yields the descriptor alone, or no
/// descriptor when the profile is not a channel's.
pub fn ingest(document: &RawDocument) -> Result<ChannelPage, ParseError> {
    let html = Html::parse_document(&document.html);

    let anchor = match document.source {
        PageSource::Feed(anchor) => anchor,
        PageSource::Profile => {
            let profile = parse_profile(&html).inspect_err(|err| {
                preview_warn!("layout drift channel={} profile: {}", document.channel, err);
            })?;
            return Ok(ChannelPage {
                channel: profile
                    .as_ref()
                    .map(|profile| normalize_profile(profile, &document.channel)),
                posts: Vec::new(),
                next: NextPage::EndOfHistory,
            });
        }
    };

    let regions = parse_document(&html, document.expects_header()).inspect_err(|err| {
        preview_warn!(
            "layout drift channel={} {}: {}",
            document.channel,
            document.source,
            err
        );
    })?;

    let NormalizedPage { channel, mut posts } = normalize(&regions, &document.channel);

    let total = posts.len();
    match anchor {
        Anchor::Before(before) => posts.retain(|post| post.id < before),
        Anchor::After(after) => posts.retain(|post| post.id > after),
        Anchor::Latest | Anchor::Around(_) => {}
    }
    if posts.len() < total {
        preview_debug!(
            "dropped {} boundary posts at {} channel={}",
            total - posts.len(),
            document.source,
            document.channel
        );
    }

    let next = match anchor {
        Anchor::After(_) => newer_cursor(&document.channel, &posts),
        _ => next_cursor(&document.channel, &posts),
    };
    Ok(ChannelPage {
        channel,
        posts,
        next,
    })
}
