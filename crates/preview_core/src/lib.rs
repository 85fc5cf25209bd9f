//! Preview core: the normalized channel/post model and pure pagination helpers.
mod channel;
mod count;
mod cursor;
mod media;
mod page;
mod post;

pub use channel::{ChannelDescriptor, ChannelId, InvalidChannelId};
pub use count::parse_count;
pub use cursor::{
    newer_cursor, next_cursor, Anchor, Cursor, Direction, InvalidCursorToken, NextPage,
};
pub use media::{Media, PollOption};
pub use page::{order_newest_first, ChannelPage, PostsPage};
pub use post::{ForwardedFrom, InlineButton, Post, PostId, Segment};
