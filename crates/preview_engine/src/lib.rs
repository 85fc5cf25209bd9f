//! Preview engine: fetching, parsing and caching of public channel previews.
mod cache;
mod decode;
mod error;
mod fetch;
mod ingest;
mod media;
mod normalize;
mod parse;
mod rich_text;
mod service;
mod types;

pub use cache::{CacheSettings, CacheableError, PageKey, ResponseCache};
pub use decode::{decode_html, DecodeError, DecodedHtml};
pub use error::QueryError;
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher, RetryPolicy};
pub use ingest::ingest;
pub use media::normalize_media;
pub use normalize::{normalize, normalize_profile, NormalizedPage};
pub use parse::{
    media_discriminant, parse_document, parse_profile, HeaderFragment, Landmark, MediaFragment,
    ParseError, ParsedRegions, PostFragment, ProfileFragment,
};
pub use rich_text::{plain_text, segments};
pub use service::{PageCache, PreviewService, ServiceSettings};
pub use types::{FailureKind, FetchError, FetchMetadata, PageSource, RawDocument};
