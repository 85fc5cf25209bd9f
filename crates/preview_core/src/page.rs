use std::cmp::Reverse;

use serde::Serialize;

use crate::channel::ChannelDescriptor;
use crate::cursor::NextPage;
use crate::post::Post;

/// Everything one upstream page yielded, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelPage {
    /// Present on first pages; later pages may omit the header.
    pub channel: Option<ChannelDescriptor>,
    /// Document order, deduplicated.
    pub posts: Vec<Post>,
    pub next: NextPage,
}

/// A page of posts as handed to API callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostsPage {
    /// Newest first.
    pub posts: Vec<Post>,
    pub next: NextPage,
}

/// Sort newest to oldest: descending id, with posts of unknown timestamp
/// after every dated post of the page.
pub fn order_newest_first(posts: &mut [Post]) {
    posts.sort_by_key(|post| (post.published_at.is_none(), Reverse(post.id)));
}
