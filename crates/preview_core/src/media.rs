use serde::Serialize;

/// Attachment of a post, one variant per upstream media kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Media {
    Photo {
        url: String,
        /// Width divided by height, when the page renders the box geometry.
        aspect_ratio: Option<f32>,
    },
    /// Clips without a duration badge are animations (GIFs).
    Video {
        url: String,
        duration_secs: Option<u32>,
        thumbnail: Option<String>,
    },
    Voice {
        url: String,
        duration_secs: Option<u32>,
    },
    RoundVideo {
        url: String,
        duration_secs: Option<u32>,
        thumbnail: Option<String>,
    },
    Document {
        title: String,
        extra: Option<String>,
        url: Option<String>,
    },
    Poll {
        question: String,
        kind: Option<String>,
        voters: Option<u64>,
        options: Vec<PollOption>,
    },
    Sticker {
        url: String,
        thumbnail: Option<String>,
    },
    /// Anything the normalizer could not map. Carries enough to link out.
    Unsupported {
        discriminant: String,
        reference: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollOption {
    pub text: String,
    pub percent: Option<u8>,
}

impl Media {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Media::Unsupported { .. })
    }
}
