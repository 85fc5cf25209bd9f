use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelId, InvalidChannelId};
use crate::post::{Post, PostId};

/// Which way a cursor pages through a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Older posts, strictly below the position.
    Before,
    /// Newer posts, strictly above the position.
    After,
}

/// The slice of a channel feed one upstream page covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "post", rename_all = "snake_case")]
pub enum Anchor {
    /// The most recent posts.
    Latest,
    Before(PostId),
    After(PostId),
    /// The page surrounding one post.
    Around(PostId),
}

/// Pagination token: fetch the posts of `channel` past `position`.
///
/// The string form is `<handle>:<id>` for older posts and `<handle>:><id>`
/// for newer ones. Callers hand it back to page on and should treat it as
/// opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    pub channel: ChannelId,
    pub position: PostId,
    pub direction: Direction,
}

impl Cursor {
    /// Cursor towards posts older than `before`.
    pub fn new(channel: ChannelId, before: PostId) -> Self {
        Self {
            channel,
            position: before,
            direction: Direction::Before,
        }
    }

    /// Cursor towards posts newer than `after`.
    pub fn after(channel: ChannelId, after: PostId) -> Self {
        Self {
            channel,
            position: after,
            direction: Direction::After,
        }
    }

    pub fn anchor(&self) -> Anchor {
        match self.direction {
            Direction::Before => Anchor::Before(self.position),
            Direction::After => Anchor::After(self.position),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidCursorToken {
    #[error("cursor token is missing the ':' separator")]
    Malformed,
    #[error(transparent)]
    Channel(#[from] InvalidChannelId),
    #[error("cursor position is not a post number")]
    Position,
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Before => write!(f, "{}:{}", self.channel, self.position),
            Direction::After => write!(f, "{}:>{}", self.channel, self.position),
        }
    }
}

impl FromStr for Cursor {
    type Err = InvalidCursorToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (channel, position) = s.rsplit_once(':').ok_or(InvalidCursorToken::Malformed)?;
        let channel = ChannelId::parse(channel)?;
        let (direction, position) = match position.strip_prefix('>') {
            Some(rest) => (Direction::After, rest),
            None => (Direction::Before, position),
        };
        let position = position
            .parse::<PostId>()
            .map_err(|_| InvalidCursorToken::Position)?;
        Ok(Self {
            channel,
            position,
            direction,
        })
    }
}

/// What to fetch after a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "cursor", rename_all = "snake_case")]
pub enum NextPage {
    More(Cursor),
    /// Terminal: the page was empty, there is nothing further in the
    /// direction it was paged.
    EndOfHistory,
}

impl NextPage {
    pub fn cursor(&self) -> Option<&Cursor> {
        match self {
            NextPage::More(cursor) => Some(cursor),
            NextPage::EndOfHistory => None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, NextPage::EndOfHistory)
    }
}

/// Resolve the cursor for the page after `posts`.
///
/// Uses the minimum identifier rather than the last element, so any ordering
/// of the page (or any truncation that keeps its oldest post) resolves to the
/// same cursor. An empty page is always the end of history.
pub fn next_cursor(channel: &ChannelId, posts: &[Post]) -> NextPage {
    match posts.iter().map(|post| post.id).min() {
        Some(oldest) => NextPage::More(Cursor::new(channel.clone(), oldest)),
        None => NextPage::EndOfHistory,
    }
}

/// Counterpart of [`next_cursor`] when paging towards newer posts: the
/// maximum identifier, or the end once a page comes back empty.
pub fn newer_cursor(channel: &ChannelId, posts: &[Post]) -> NextPage {
    match posts.iter().map(|post| post.id).max() {
        Some(newest) => NextPage::More(Cursor::after(channel.clone(), newest)),
        None => NextPage::EndOfHistory,
    }
}
