use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelId;
use crate::media::Media;

/// Upstream message number. Monotonic within a channel, so it orders posts
/// and identifies boundary duplicates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PostId(pub u64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PostId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(PostId)
    }
}

/// One run of rich text. A post's text is the concatenation of its segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Plain { text: String },
    LineBreak,
    Link { text: String, url: String },
    Mention { handle: String, url: String },
    Hashtag { tag: String },
    Bold { text: String },
    Italic { text: String },
    Underline { text: String },
    Strikethrough { text: String },
    Code { text: String },
    Pre { text: String },
    Spoiler { text: String },
    Quote { text: String },
    CustomEmoji { text: String, emoji_id: Option<String> },
}

impl Segment {
    /// Visible text of the segment.
    pub fn text(&self) -> &str {
        match self {
            Segment::LineBreak => "\n",
            Segment::Plain { text }
            | Segment::Link { text, .. }
            | Segment::Bold { text }
            | Segment::Italic { text }
            | Segment::Underline { text }
            | Segment::Strikethrough { text }
            | Segment::Code { text }
            | Segment::Pre { text }
            | Segment::Spoiler { text }
            | Segment::Quote { text }
            | Segment::CustomEmoji { text, .. } => text,
            Segment::Mention { handle, .. } => handle,
            Segment::Hashtag { tag } => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardedFrom {
    pub name: String,
    pub url: Option<String>,
    /// Set when the source is itself a public channel with a readable link.
    pub channel: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub url: Option<String>,
}

/// A normalized post. Built once per fetch and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: PostId,
    pub channel: ChannelId,
    /// `None` when the page carried no readable timestamp.
    pub published_at: Option<DateTime<FixedOffset>>,
    pub permalink: Option<String>,
    pub author: Option<String>,
    pub edited: bool,
    pub text: Vec<Segment>,
    pub media: Vec<Media>,
    pub forwarded_from: Option<ForwardedFrom>,
    /// `None` means unknown, which is not the same as zero views.
    pub views: Option<u64>,
    pub reactions: BTreeMap<String, u64>,
    pub inline_buttons: Vec<InlineButton>,
}

impl Post {
    /// Flattened visible text.
    pub fn plain_text(&self) -> String {
        self.text.iter().map(Segment::text).collect()
    }
}
