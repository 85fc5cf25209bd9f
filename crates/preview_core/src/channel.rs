use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

const MIN_HANDLE_LEN: usize = 3;
const MAX_HANDLE_LEN: usize = 32;

/// Public handle of a channel, e.g. `durov`.
///
/// Only ASCII letters, digits and `_` are accepted, 3 to 32 characters long.
/// Everything that reaches the fetcher has been through this check, so the
/// handle can be placed in a URL path without escaping. Handles are stored
/// lowercased: the upstream resolves them case-insensitively, so `Durov` and
/// `durov` are the same channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid channel handle {0:?}")]
pub struct InvalidChannelId(pub String);

impl ChannelId {
    pub fn parse(raw: &str) -> Result<Self, InvalidChannelId> {
        let handle = raw.trim().trim_start_matches('@');
        let valid_len = (MIN_HANDLE_LEN..=MAX_HANDLE_LEN).contains(&handle.len());
        let valid_chars = handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid_len && valid_chars {
            Ok(Self(handle.to_ascii_lowercase()))
        } else {
            Err(InvalidChannelId(raw.to_string()))
        }
    }

    /// Extract the handle from a channel or post link such as
    /// `https://t.me/durov/123` or `https://t.me/s/durov`.
    pub fn from_link(link: &str) -> Option<Self> {
        let url = Url::parse(link).ok()?;
        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let first = segments.next()?;
        let handle = if first == "s" { segments.next()? } else { first };
        Self::parse(handle).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChannelId {
    type Err = InvalidChannelId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ChannelId {
    type Error = InvalidChannelId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ChannelId> for String {
    fn from(value: ChannelId) -> Self {
        value.0
    }
}

/// Channel identity block as shown at the top of a preview page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelDescriptor {
    pub handle: ChannelId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    /// Subscriber counter exactly as rendered, e.g. `12.3K subscribers`.
    pub subscribers_text: Option<String>,
    /// `None` when the counter is missing or unreadable; never defaulted to zero.
    pub subscribers: Option<u64>,
    pub verified: bool,
    pub restricted: bool,
    pub description: Option<String>,
    /// Every header counter by type (`subscribers`, `photos`, `links`, ...).
    pub counters: BTreeMap<String, String>,
    pub labels: Vec<String>,
}
