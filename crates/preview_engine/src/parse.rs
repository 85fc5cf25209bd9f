use std::fmt;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

/// Structural markers that must exist for a page to be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landmark {
    /// `.tgme_channel_history`, the feed container. Present even when empty.
    FeedContainer,
    /// `.tgme_channel_info`, the channel identity block of a first page.
    ChannelHeader,
    /// `.tgme_page`, the body of a `/<handle>` profile page.
    ProfilePage,
}

impl fmt::Display for Landmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Landmark::FeedContainer => write!(f, "feed container"),
            Landmark::ChannelHeader => write!(f, "channel header"),
            Landmark::ProfilePage => write!(f, "profile page"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The upstream layout changed; distinct from a legitimately empty feed.
    #[error("missing landmark: {0}")]
    MissingLandmark(Landmark),
}

/// Regions of one preview page, as handles into the parsed tree.
#[derive(Debug)]
pub struct ParsedRegions<'a> {
    pub header: Option<HeaderFragment<'a>>,
    pub posts: Vec<PostFragment<'a>>,
}

#[derive(Debug)]
pub struct HeaderFragment<'a> {
    pub root: ElementRef<'a>,
    pub title: Option<ElementRef<'a>>,
    pub og_title: Option<&'a str>,
    pub username: Option<ElementRef<'a>>,
    pub avatar: Option<ElementRef<'a>>,
    pub description: Option<ElementRef<'a>>,
    pub counters: Vec<ElementRef<'a>>,
    pub labels: Vec<ElementRef<'a>>,
}

/// Identity block of a `/<handle>` profile page.
#[derive(Debug)]
pub struct ProfileFragment<'a> {
    pub root: ElementRef<'a>,
    pub title: Option<ElementRef<'a>>,
    pub avatar: Option<ElementRef<'a>>,
    pub description: Option<ElementRef<'a>>,
    /// `.tgme_page_extra`, e.g. `12 345 subscribers`.
    pub extra: Option<ElementRef<'a>>,
    pub labels: Vec<ElementRef<'a>>,
}

#[derive(Debug)]
pub struct PostFragment<'a> {
    pub root: ElementRef<'a>,
    /// Raw `data-post` attribute, `<handle>/<id>`.
    pub post_ref: Option<&'a str>,
    pub text: Option<ElementRef<'a>>,
    pub time: Option<ElementRef<'a>>,
    pub date_link: Option<ElementRef<'a>>,
    pub views: Option<ElementRef<'a>>,
    pub author: Option<ElementRef<'a>>,
    pub meta: Option<ElementRef<'a>>,
    pub forwarded_from: Option<ElementRef<'a>>,
    pub reactions: Vec<ElementRef<'a>>,
    pub inline_buttons: Vec<ElementRef<'a>>,
    pub media: Vec<MediaFragment<'a>>,
}

/// An attachment block and the kind its class marks it as.
#[derive(Debug)]
pub struct MediaFragment<'a> {
    /// `photo`, `video`, `poll`, ... or whatever unknown kind the markup names.
    pub discriminant: String,
    pub element: ElementRef<'a>,
    /// The message bubble, for details rendered outside the block itself.
    pub scope: ElementRef<'a>,
}

const MESSAGE_CLASS_PREFIX: &str = "tgme_widget_message_";

/// Class stems with a `_wrap`/`_player` suffix that are layout, not media.
const LAYOUT_STEMS: &[&str] = &["grouped", "bubble", "text", "link_preview", "inline"];

/// Blocks that never contain attachments of the post itself.
const OPAQUE_CLASSES: &[&str] = &[
    "tgme_widget_message_text",
    "tgme_widget_message_reply",
    "tgme_widget_message_link_preview",
    "tgme_widget_message_footer",
    "tgme_widget_message_info",
    "tgme_widget_message_author",
    "tgme_widget_message_forwarded_from",
];

struct Selectors {
    feed: Selector,
    header: Selector,
    message: Selector,
    og_title: Selector,
    header_title: Selector,
    header_username: Selector,
    header_avatar: Selector,
    header_description: Selector,
    header_counter: Selector,
    labels: Selector,
    bubble: Selector,
    text: Selector,
    time: Selector,
    date_link: Selector,
    views: Selector,
    author: Selector,
    meta: Selector,
    forwarded_from: Selector,
    reaction: Selector,
    inline_button: Selector,
    profile: Selector,
    profile_context: Selector,
    profile_title: Selector,
    profile_avatar: Selector,
    profile_description: Selector,
    profile_extra: Selector,
    profile_labels: Selector,
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static SELECTORS: LazyLock<Selectors> = LazyLock::new(|| Selectors {
    feed: selector(".tgme_channel_history"),
    header: selector(".tgme_channel_info"),
    message: selector(".tgme_widget_message"),
    og_title: selector(r#"meta[property="og:title"]"#),
    header_title: selector(".tgme_channel_info_header_title"),
    header_username: selector(".tgme_channel_info_header_username a"),
    header_avatar: selector(".tgme_page_photo_image img"),
    header_description: selector(".tgme_channel_info_description"),
    header_counter: selector(".tgme_channel_info_counter"),
    labels: selector(".tgme_header_labels > i, .tgme_channel_info_header_labels > i"),
    bubble: selector(".tgme_widget_message_bubble"),
    text: selector(".tgme_widget_message_text"),
    time: selector(".tgme_widget_message_date time, time.time[datetime]"),
    date_link: selector("a.tgme_widget_message_date"),
    views: selector(".tgme_widget_message_views"),
    author: selector(".tgme_widget_message_from_author"),
    meta: selector(".tgme_widget_message_meta"),
    forwarded_from: selector(".tgme_widget_message_forwarded_from_name"),
    reaction: selector(".tgme_widget_message_reactions .tgme_reaction"),
    inline_button: selector(".tgme_widget_message_inline_button"),
    profile: selector(".tgme_page"),
    profile_context: selector(".tgme_page_context_link"),
    profile_title: selector(".tgme_page_title"),
    profile_avatar: selector("img.tgme_page_photo_image"),
    profile_description: selector(".tgme_page_description"),
    profile_extra: selector(".tgme_page_extra"),
    profile_labels: selector(".tgme_page_title i"),
});

/// Locate the channel header and the post blocks of a preview page.
///
/// The feed container is mandatory. The header is mandatory only when
/// `expect_header` is set (first pages); older pages may omit it. Everything
/// below the landmarks is optional and unknown markup is ignored.
pub fn parse_document(html: &Html, expect_header: bool) -> Result<ParsedRegions<'_>, ParseError> {
    let sel = &*SELECTORS;

    let feed = html
        .select(&sel.feed)
        .next()
        .ok_or(ParseError::MissingLandmark(Landmark::FeedContainer))?;

    let header = html.select(&sel.header).next();
    if expect_header && header.is_none() {
        return Err(ParseError::MissingLandmark(Landmark::ChannelHeader));
    }
    let header = header.map(|root| HeaderFragment {
        root,
        title: root.select(&sel.header_title).next(),
        og_title: html
            .select(&sel.og_title)
            .next()
            .and_then(|meta| meta.value().attr("content")),
        username: root.select(&sel.header_username).next(),
        avatar: root.select(&sel.header_avatar).next(),
        description: root.select(&sel.header_description).next(),
        counters: root.select(&sel.header_counter).collect(),
        labels: html.select(&sel.labels).collect(),
    });

    let posts = feed.select(&sel.message).map(post_fragment).collect();

    Ok(ParsedRegions { header, posts })
}

/// Locate the channel block of a `/<handle>` profile page.
///
/// `Ok(None)` when the page is a profile but not a channel's: users, groups
/// and bots share the layout. A channel page either links to its preview or
/// counts subscribers.
pub fn parse_profile(html: &Html) -> Result<Option<ProfileFragment<'_>>, ParseError> {
    let sel = &*SELECTORS;

    let root = html
        .select(&sel.profile)
        .next()
        .ok_or(ParseError::MissingLandmark(Landmark::ProfilePage))?;

    let extra = root.select(&sel.profile_extra).next();
    let links_preview = root
        .select(&sel.profile_context)
        .any(|link| text_of(link).eq_ignore_ascii_case("preview channel"));
    let counts_subscribers =
        extra.is_some_and(|extra| text_of(extra).to_lowercase().contains("subscriber"));
    if !links_preview && !counts_subscribers {
        return Ok(None);
    }

    Ok(Some(ProfileFragment {
        root,
        title: root.select(&sel.profile_title).next(),
        avatar: root.select(&sel.profile_avatar).next(),
        description: root.select(&sel.profile_description).next(),
        extra,
        labels: root.select(&sel.profile_labels).collect(),
    }))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn post_fragment(root: ElementRef<'_>) -> PostFragment<'_> {
    let sel = &*SELECTORS;
    let bubble = root.select(&sel.bubble).next().unwrap_or(root);

    let mut media = Vec::new();
    collect_media(bubble, bubble, &mut media);

    PostFragment {
        root,
        post_ref: root.value().attr("data-post"),
        text: bubble
            .select(&sel.text)
            .find(|text| !within_class(*text, bubble, "tgme_widget_message_reply")),
        time: bubble.select(&sel.time).next(),
        date_link: bubble.select(&sel.date_link).next(),
        views: bubble.select(&sel.views).next(),
        author: bubble.select(&sel.author).next(),
        meta: bubble.select(&sel.meta).next(),
        forwarded_from: root.select(&sel.forwarded_from).next(),
        reactions: root.select(&sel.reaction).collect(),
        inline_buttons: root.select(&sel.inline_button).collect(),
        media,
    }
}

/// Depth-first walk collecting attachment blocks in document order. A matched
/// block is not descended into: players nest their own `_wrap` elements.
fn collect_media<'a>(element: ElementRef<'a>, scope: ElementRef<'a>, out: &mut Vec<MediaFragment<'a>>) {
    for child in element.children().filter_map(ElementRef::wrap) {
        if let Some(discriminant) = media_discriminant(child) {
            out.push(MediaFragment {
                discriminant,
                element: child,
                scope,
            });
        } else if !child.value().classes().any(|class| OPAQUE_CLASSES.contains(&class)) {
            collect_media(child, scope, out);
        }
    }
}

/// Map a block's classes to a media kind, looking at every class token so the
/// order of classes in the attribute does not matter.
pub fn media_discriminant(element: ElementRef<'_>) -> Option<String> {
    element.value().classes().find_map(|class| {
        if class == "message_media_not_supported_wrap" {
            return Some("not_supported".to_string());
        }
        let stem = class.strip_prefix(MESSAGE_CLASS_PREFIX)?;
        if stem == "poll" {
            return Some(stem.to_string());
        }
        let stem = stem
            .strip_suffix("_wrap")
            .or_else(|| stem.strip_suffix("_player"))?;
        (!stem.is_empty() && !LAYOUT_STEMS.contains(&stem)).then(|| stem.to_string())
    })
}

/// Whether `element` sits inside a block with `class`, looking no further up
/// than `boundary`.
fn within_class(element: ElementRef<'_>, boundary: ElementRef<'_>, class: &str) -> bool {
    element
        .ancestors()
        .take_while(|node| node.id() != boundary.id())
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().classes().any(|c| c == class))
}
