use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset};
use preview_core::{
    parse_count, ChannelDescriptor, ChannelId, ForwardedFrom, InlineButton, Post, PostId,
};
use preview_logging::{preview_debug, preview_warn};
use scraper::{ElementRef, Selector};

use crate::media::normalize_media;
use crate::parse::{HeaderFragment, ParsedRegions, PostFragment, ProfileFragment};
use crate::rich_text;

/// Header labels that mark a channel as flagged or limited.
const RESTRICTED_LABELS: &[&str] = &["scam", "fake", "restricted"];

/// Descriptor and posts of one page, before pagination is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPage {
    pub channel: Option<ChannelDescriptor>,
    /// Document order, first occurrence of each id kept.
    pub posts: Vec<Post>,
}

struct FieldSelectors {
    counter_value: Selector,
    counter_type: Selector,
    reaction_symbol: Selector,
}

static SELECTORS: LazyLock<FieldSelectors> = LazyLock::new(|| FieldSelectors {
    counter_value: Selector::parse(".counter_value").expect("static selector"),
    counter_type: Selector::parse(".counter_type").expect("static selector"),
    reaction_symbol: Selector::parse("tg-emoji, i, b").expect("static selector"),
});

/// Map parsed regions into the channel model.
///
/// Never fails: a field that cannot be read becomes unknown, and a post block
/// without a readable identifier is skipped. `channel` is the handle the page
/// was requested for, used when the markup does not name one.
pub fn normalize(regions: &ParsedRegions<'_>, channel: &ChannelId) -> NormalizedPage {
    let descriptor = regions
        .header
        .as_ref()
        .map(|header| normalize_header(header, channel));

    let mut seen = HashSet::new();
    let mut posts = Vec::with_capacity(regions.posts.len());
    for fragment in &regions.posts {
        let Some(post) = normalize_post(fragment, channel) else {
            continue;
        };
        if seen.insert(post.id) {
            posts.push(post);
        } else {
            preview_debug!("duplicate post channel={} id={} dropped", channel, post.id);
        }
    }

    NormalizedPage {
        channel: descriptor,
        posts,
    }
}

fn normalize_header(header: &HeaderFragment<'_>, requested: &ChannelId) -> ChannelDescriptor {
    let handle = header
        .username
        .map(element_text)
        .and_then(|text| ChannelId::parse(&text).ok())
        .unwrap_or_else(|| requested.clone());

    let display_name = header
        .title
        .map(element_text)
        .filter(|title| !title.is_empty())
        .or_else(|| header.og_title.map(|title| title.trim().to_string()))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| handle.to_string());

    let mut counters = BTreeMap::new();
    let mut subscribers_text = None;
    for counter in &header.counters {
        let value = counter
            .select(&SELECTORS.counter_value)
            .next()
            .map(element_text);
        let kind = counter
            .select(&SELECTORS.counter_type)
            .next()
            .map(element_text);
        if let (Some(value), Some(kind)) = (value, kind) {
            let key = kind.to_lowercase();
            if key.starts_with("subscriber") {
                subscribers_text = Some(format!("{value} {kind}"));
            }
            counters.insert(key, value);
        }
    }

    let (labels, verified, restricted) = channel_flags(&header.labels, header.root);

    ChannelDescriptor {
        handle,
        display_name,
        avatar_url: header
            .avatar
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string),
        subscribers: subscribers_text.as_deref().and_then(parse_count),
        subscribers_text,
        verified,
        restricted,
        description: header
            .description
            .map(rich_text::plain_text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()),
        counters,
        labels,
    }
}

/// Map a profile page onto the same descriptor a feed header yields.
///
/// Profiles render their counter as one line (`12 345 subscribers`), so the
/// value and kind are split at the last space. The handle is the requested
/// one: profiles do not print it.
pub fn normalize_profile(profile: &ProfileFragment<'_>, channel: &ChannelId) -> ChannelDescriptor {
    let display_name = profile
        .title
        .map(element_text)
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| channel.to_string());

    let subscribers_text = profile
        .extra
        .map(element_text)
        .map(|extra| extra.split(',').next().unwrap_or_default().trim().to_string())
        .filter(|extra| !extra.is_empty());

    let mut counters = BTreeMap::new();
    if let Some((value, kind)) = subscribers_text
        .as_deref()
        .and_then(|text| text.rsplit_once(' '))
    {
        counters.insert(kind.to_lowercase(), value.trim().to_string());
    }

    let (labels, verified, restricted) = channel_flags(&profile.labels, profile.root);

    ChannelDescriptor {
        handle: channel.clone(),
        display_name,
        avatar_url: profile
            .avatar
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string),
        subscribers: subscribers_text.as_deref().and_then(parse_count),
        subscribers_text,
        verified,
        restricted,
        description: profile
            .description
            .map(rich_text::plain_text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()),
        counters,
        labels,
    }
}

/// Label names (`verified-icon` reads as `verified`) plus the verified and
/// restricted flags derived from them.
fn channel_flags(labels: &[ElementRef<'_>], root: ElementRef<'_>) -> (Vec<String>, bool, bool) {
    let labels: Vec<String> = labels
        .iter()
        .filter_map(|label| label.value().classes().next())
        .map(|class| class.split('-').next().unwrap_or(class).to_string())
        .collect();
    let verified = labels.iter().any(|label| label == "verified")
        || root
            .descendants()
            .filter_map(ElementRef::wrap)
            .any(|el| el.value().classes().any(|class| class == "verified-icon"));
    let restricted = labels
        .iter()
        .any(|label| RESTRICTED_LABELS.contains(&label.as_str()));
    (labels, verified, restricted)
}

fn normalize_post(fragment: &PostFragment<'_>, requested: &ChannelId) -> Option<Post> {
    let Some((channel, id)) = fragment.post_ref.and_then(split_post_ref) else {
        preview_warn!(
            "post block without readable data-post on channel={} skipped",
            requested
        );
        return None;
    };
    let channel = channel.unwrap_or_else(|| requested.clone());

    let permalink = fragment
        .date_link
        .and_then(|link| link.value().attr("href"))
        .map(str::to_string);

    let published_at = fragment
        .time
        .and_then(|time| time.value().attr("datetime"))
        .and_then(parse_timestamp);
    if published_at.is_none() {
        preview_debug!("post channel={} id={} has no readable timestamp", channel, id);
    }

    let media = fragment
        .media
        .iter()
        .map(|media| normalize_media(media, permalink.as_deref()))
        .collect();

    Some(Post {
        id,
        published_at,
        author: fragment
            .author
            .map(element_text)
            .filter(|author| !author.is_empty()),
        edited: fragment
            .meta
            .map(|meta| meta.text().any(|text| text.contains("edited")))
            .unwrap_or(false),
        text: fragment.text.map(rich_text::segments).unwrap_or_default(),
        media,
        forwarded_from: fragment.forwarded_from.map(forwarded_from),
        views: fragment
            .views
            .map(element_text)
            .as_deref()
            .and_then(parse_count),
        reactions: reactions(&fragment.reactions),
        inline_buttons: fragment
            .inline_buttons
            .iter()
            .map(|button| InlineButton {
                text: element_text(*button),
                url: button.value().attr("href").map(str::to_string),
            })
            .collect(),
        permalink,
        channel,
    })
}

/// `durov/123` to its handle (when valid) and the post number.
fn split_post_ref(post_ref: &str) -> Option<(Option<ChannelId>, PostId)> {
    let (handle, id) = post_ref.trim().rsplit_once('/')?;
    let id = id.parse::<PostId>().ok()?;
    Some((ChannelId::parse(handle).ok(), id))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .or_else(|_| DateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
}

fn forwarded_from(element: ElementRef<'_>) -> ForwardedFrom {
    let url = element.value().attr("href").map(str::to_string);
    ForwardedFrom {
        name: element_text(element),
        channel: url.as_deref().and_then(ChannelId::from_link),
        url,
    }
}

/// Tally reactions. The symbol is the emoji markup, the count is the bare
/// text beside it; entries without a readable count are left out.
///
/// Paid reactions render an icon with no text, so an empty symbol falls back
/// to the icon's class, then to the reaction's own modifier class.
fn reactions(elements: &[ElementRef<'_>]) -> BTreeMap<String, u64> {
    let mut tally = BTreeMap::new();
    for reaction in elements {
        let icon = reaction.select(&SELECTORS.reaction_symbol).next();
        let symbol = icon
            .map(|emoji| {
                let text = element_text(emoji);
                match emoji.value().attr("emoji-id") {
                    Some(id) if text.is_empty() => id.to_string(),
                    _ => text,
                }
            })
            .filter(|symbol| !symbol.is_empty())
            .or_else(|| icon.and_then(icon_class))
            .or_else(|| {
                reaction
                    .value()
                    .classes()
                    .find_map(|class| class.strip_prefix("tgme_reaction_"))
                    .map(str::to_string)
            });
        let count: String = reaction
            .children()
            .filter_map(|node| node.value().as_text().map(|text| text.to_string()))
            .collect();
        match (symbol, parse_count(&count)) {
            (Some(symbol), Some(count)) => {
                *tally.entry(symbol).or_insert(0) += count;
            }
            _ => preview_debug!("unreadable reaction skipped: {:?}", reaction.html()),
        }
    }
    tally
}

/// `icon icon-reaction-star` to `icon-reaction-star`.
fn icon_class(icon: ElementRef<'_>) -> Option<String> {
    icon.value()
        .classes()
        .find(|class| !matches!(*class, "icon" | "emoji"))
        .map(str::to_string)
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use preview_core::PostId;

    use super::{parse_timestamp, split_post_ref};

    #[test]
    fn post_ref_splits_handle_and_number() {
        let (channel, id) = split_post_ref("durov/123").unwrap();
        assert_eq!(channel.unwrap().as_str(), "durov");
        assert_eq!(id, PostId(123));
        assert!(split_post_ref("durov").is_none());
        assert!(split_post_ref("durov/abc").is_none());
    }

    #[test]
    fn timestamps_accept_both_offset_styles() {
        assert!(parse_timestamp("2024-03-01T12:30:00+00:00").is_some());
        assert!(parse_timestamp("2024-03-01T12:30:00+0000").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
