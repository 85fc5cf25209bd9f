use std::sync::LazyLock;

use preview_core::{parse_count, Media, PollOption};
use scraper::{ElementRef, Selector};

use crate::parse::MediaFragment;

struct MediaSelectors {
    photo_box: Selector,
    video: Selector,
    video_thumb: Selector,
    video_duration: Selector,
    voice: Selector,
    voice_duration: Selector,
    roundvideo: Selector,
    roundvideo_thumb: Selector,
    roundvideo_duration: Selector,
    sticker_source: Selector,
    sticker_image: Selector,
    sticker_video: Selector,
    sticker_thumb: Selector,
    document_title: Selector,
    document_extra: Selector,
    link: Selector,
    poll_question: Selector,
    poll_type: Selector,
    poll_voters: Selector,
    poll_option: Selector,
    poll_option_text: Selector,
    poll_option_percent: Selector,
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static SELECTORS: LazyLock<MediaSelectors> = LazyLock::new(|| MediaSelectors {
    photo_box: selector(".tgme_widget_message_photo"),
    video: selector("video"),
    video_thumb: selector(".tgme_widget_message_video_thumb"),
    video_duration: selector(".message_video_duration"),
    voice: selector(".tgme_widget_message_voice"),
    voice_duration: selector(".tgme_widget_message_voice_duration"),
    roundvideo: selector("video.tgme_widget_message_roundvideo, video"),
    roundvideo_thumb: selector(".tgme_widget_message_roundvideo_thumb"),
    roundvideo_duration: selector(".tgme_widget_message_roundvideo_duration"),
    sticker_source: selector("picture source[srcset]"),
    sticker_image: selector("i.tgme_widget_message_sticker[data-webp]"),
    sticker_video: selector("video[src]"),
    sticker_thumb: selector("img[src]"),
    document_title: selector(".tgme_widget_message_document_title"),
    document_extra: selector(".tgme_widget_message_document_extra"),
    link: selector("a[href]"),
    poll_question: selector(".tgme_widget_message_poll_question"),
    poll_type: selector(".tgme_widget_message_poll_type"),
    poll_voters: selector(".tgme_widget_message_voters"),
    poll_option: selector(".tgme_widget_message_poll_option"),
    poll_option_text: selector(".tgme_widget_message_poll_option_text"),
    poll_option_percent: selector(".tgme_widget_message_poll_option_percent"),
});

/// Map one attachment block to its media variant.
///
/// Unknown discriminants, and known ones missing a required field, become
/// `Media::Unsupported` pointing at the block's own link or the post.
pub fn normalize_media(fragment: &MediaFragment<'_>, permalink: Option<&str>) -> Media {
    let element = fragment.element;
    let known = match fragment.discriminant.as_str() {
        "photo" => photo(element),
        "video" => video(element),
        "voice" => voice(element),
        "roundvideo" => round_video(element),
        "sticker" => sticker(element),
        "document" => document(element),
        "poll" => poll(element, fragment.scope),
        _ => None,
    };
    known.unwrap_or_else(|| Media::Unsupported {
        discriminant: fragment.discriminant.clone(),
        reference: attr(element, "href")
            .map(absolute_url)
            .or_else(|| permalink.map(str::to_string)),
    })
}

fn photo(element: ElementRef<'_>) -> Option<Media> {
    let url = attr(element, "style").and_then(background_image_url)?;
    let aspect_ratio = element
        .select(&SELECTORS.photo_box)
        .next()
        .and_then(|inner| attr(inner, "style"))
        .and_then(padding_top_ratio);
    Some(Media::Photo { url, aspect_ratio })
}

fn video(element: ElementRef<'_>) -> Option<Media> {
    let url = first_attr(element, &SELECTORS.video, "src")?;
    Some(Media::Video {
        url,
        duration_secs: first_text(element, &SELECTORS.video_duration)
            .as_deref()
            .and_then(parse_duration),
        thumbnail: first_style_image(element, &SELECTORS.video_thumb),
    })
}

fn voice(element: ElementRef<'_>) -> Option<Media> {
    let url = first_attr(element, &SELECTORS.voice, "src")?;
    Some(Media::Voice {
        url,
        duration_secs: first_text(element, &SELECTORS.voice_duration)
            .as_deref()
            .and_then(parse_duration),
    })
}

fn round_video(element: ElementRef<'_>) -> Option<Media> {
    let url = first_attr(element, &SELECTORS.roundvideo, "src")?;
    Some(Media::RoundVideo {
        url,
        duration_secs: first_text(element, &SELECTORS.roundvideo_duration)
            .as_deref()
            .and_then(parse_duration),
        thumbnail: first_style_image(element, &SELECTORS.roundvideo_thumb),
    })
}

fn sticker(element: ElementRef<'_>) -> Option<Media> {
    let sel = &*SELECTORS;
    let url = first_attr(element, &sel.sticker_source, "srcset")
        .or_else(|| first_attr(element, &sel.sticker_image, "data-webp"))
        .or_else(|| first_attr(element, &sel.sticker_video, "src"))?;
    Some(Media::Sticker {
        url,
        thumbnail: first_attr(element, &sel.sticker_thumb, "src"),
    })
}

fn document(element: ElementRef<'_>) -> Option<Media> {
    let title = first_text(element, &SELECTORS.document_title)?;
    let url = attr(element, "href")
        .map(absolute_url)
        .or_else(|| first_attr(element, &SELECTORS.link, "href"));
    Some(Media::Document {
        title,
        extra: first_text(element, &SELECTORS.document_extra),
        url,
    })
}

fn poll(element: ElementRef<'_>, scope: ElementRef<'_>) -> Option<Media> {
    let sel = &*SELECTORS;
    let question = first_text(element, &sel.poll_question)?;
    let voters = first_text(element, &sel.poll_voters)
        .or_else(|| first_text(scope, &sel.poll_voters))
        .as_deref()
        .and_then(parse_count);
    let options = element
        .select(&sel.poll_option)
        .filter_map(|option| {
            let text = first_text(option, &sel.poll_option_text)?;
            let percent = first_text(option, &sel.poll_option_percent)
                .and_then(|raw| raw.trim_end_matches('%').trim().parse::<u8>().ok());
            Some(PollOption { text, percent })
        })
        .collect();
    Some(Media::Poll {
        question,
        kind: first_text(element, &sel.poll_type),
        voters,
        options,
    })
}

fn attr<'a>(element: ElementRef<'a>, name: &str) -> Option<&'a str> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn first_attr(element: ElementRef<'_>, selector: &Selector, name: &str) -> Option<String> {
    element
        .select(selector)
        .find_map(|found| attr(found, name))
        .map(absolute_url)
}

fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|found| found.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn first_style_image(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|found| attr(found, "style"))
        .and_then(background_image_url)
}

/// Pull the URL out of `background-image:url('...')`.
pub(crate) fn background_image_url(style: &str) -> Option<String> {
    let start = style.find("url(")? + "url(".len();
    let rest = &style[start..];
    let end = rest.find(')')?;
    let url = rest[..end].trim().trim_matches(['\'', '"']);
    (!url.is_empty()).then(|| absolute_url(url))
}

/// `padding-top:56.25%` renders a box whose height is 56.25% of its width.
fn padding_top_ratio(style: &str) -> Option<f32> {
    let start = style.find("padding-top:")? + "padding-top:".len();
    let percent: f32 = style[start..]
        .split(['%', ';'])
        .next()?
        .trim()
        .parse()
        .ok()?;
    (percent > 0.0).then(|| 100.0 / percent)
}

/// `0:15`, `12:04` or `1:02:03` to seconds.
pub(crate) fn parse_duration(text: &str) -> Option<u32> {
    text.trim()
        .split(':')
        .try_fold((0u32, 0usize), |(total, parts), part| {
            let value: u32 = part.trim().parse().ok()?;
            Some((total.checked_mul(60)?.checked_add(value)?, parts + 1))
        })
        .filter(|(_, parts)| (2..=3).contains(parts))
        .map(|(total, _)| total)
}

/// The upstream emits scheme-relative CDN links.
fn absolute_url(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}
