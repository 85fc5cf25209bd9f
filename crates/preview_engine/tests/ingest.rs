mod common;

use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

use preview_core::{
    Anchor, ChannelId, Cursor, ForwardedFrom, InlineButton, Media, NextPage, PollOption, PostId,
    Segment,
};
use preview_engine::{ingest, FetchMetadata, Landmark, PageSource, ParseError, RawDocument};

use common::{
    first_page, older_page, page_with_header, post, posts, profile_page, without_feed,
    HeaderMarkup, PostMarkup,
};

fn demo() -> ChannelId {
    ChannelId::parse("demo").unwrap()
}

fn raw(before: Option<u64>, html: String) -> RawDocument {
    let anchor = before.map_or(Anchor::Latest, |before| Anchor::Before(PostId(before)));
    raw_from(PageSource::Feed(anchor), html)
}

fn raw_from(source: PageSource, html: String) -> RawDocument {
    RawDocument {
        channel: demo(),
        source,
        metadata: FetchMetadata {
            url: "https://t.me/s/demo".to_string(),
            attempts: 1,
            content_type: Some("text/html; charset=utf-8".to_string()),
            encoding_label: "UTF-8".to_string(),
            byte_len: html.len() as u64,
        },
        html,
    }
}

fn ids(page: &preview_core::ChannelPage) -> Vec<u64> {
    page.posts.iter().map(|post| post.id.0).collect()
}

#[test]
fn first_page_yields_descriptor_posts_and_cursor() {
    let html = first_page("demo", "Demo Channel", &posts("demo", 91..=100));
    let page = ingest(&raw(None, html)).expect("ingest");

    let channel = page.channel.as_ref().expect("descriptor");
    assert_eq!(channel.handle, demo());
    assert_eq!(channel.display_name, "Demo Channel");
    assert_eq!(channel.avatar_url.as_deref(), Some("https://cdn.example/demo.jpg"));
    assert_eq!(channel.subscribers, Some(1200));
    assert_eq!(channel.subscribers_text.as_deref(), Some("1.2K subscribers"));
    assert_eq!(channel.counters.get("photos").map(String::as_str), Some("340"));
    assert_eq!(channel.description.as_deref(), Some("News and notes"));
    assert!(channel.verified);
    assert!(!channel.restricted);

    // Document order is kept until the service orders the page.
    assert_eq!(ids(&page), (91..=100).collect::<Vec<_>>());
    assert_eq!(
        page.next,
        NextPage::More(Cursor::new(demo(), PostId(91)))
    );
}

#[test]
fn post_fields_are_normalized() {
    let html = first_page("demo", "Demo", &posts("demo", [7]));
    let page = ingest(&raw(None, html)).expect("ingest");
    let post = &page.posts[0];

    assert_eq!(post.id, PostId(7));
    assert_eq!(post.channel, demo());
    assert_eq!(post.views, Some(1200));
    assert_eq!(post.permalink.as_deref(), Some("https://t.me/demo/7"));
    assert_eq!(
        post.published_at.map(|at| at.to_rfc3339()),
        Some("2024-03-01T12:00:00+00:00".to_string())
    );
    assert_eq!(post.text, vec![Segment::Plain { text: "hello".into() }]);
    assert!(post.media.is_empty());
    assert!(!post.edited);
}

#[test]
fn unreadable_counts_and_timestamps_become_unknown() {
    let markup = PostMarkup {
        views: None,
        datetime: Some("not a date"),
        ..PostMarkup::new("demo", 3)
    }
    .render();
    let page = ingest(&raw(None, first_page("demo", "Demo", &[markup]))).expect("ingest");

    assert_eq!(page.posts[0].views, None);
    assert_eq!(page.posts[0].published_at, None);
}

#[test]
fn first_page_without_header_is_layout_drift() {
    let err = ingest(&raw(None, older_page(&posts("demo", [1, 2])))).unwrap_err();
    assert_eq!(err, ParseError::MissingLandmark(Landmark::ChannelHeader));
}

#[test]
fn missing_feed_container_is_layout_drift() {
    let err = ingest(&raw(None, without_feed("demo"))).unwrap_err();
    assert_eq!(err, ParseError::MissingLandmark(Landmark::FeedContainer));
}

#[test]
fn empty_feed_is_end_of_history() {
    let page = ingest(&raw(None, first_page("demo", "Demo", &[]))).expect("ingest");
    assert!(page.posts.is_empty());
    assert_eq!(page.next, NextPage::EndOfHistory);
    assert!(page.channel.is_some());
}

#[test]
fn older_page_may_omit_header() {
    let page = ingest(&raw(Some(91), older_page(&posts("demo", 81..=90)))).expect("ingest");
    assert!(page.channel.is_none());
    assert_eq!(page.next, NextPage::More(Cursor::new(demo(), PostId(81))));
}

#[test]
fn older_page_drops_posts_at_or_above_before() {
    let page = ingest(&raw(Some(91), older_page(&posts("demo", 85..=93)))).expect("ingest");
    assert_eq!(ids(&page), (85..=90).collect::<Vec<_>>());
}

#[test]
fn older_page_with_only_boundary_repeats_ends_history() {
    let page = ingest(&raw(Some(91), older_page(&posts("demo", [91, 92])))).expect("ingest");
    assert!(page.posts.is_empty());
    assert_eq!(page.next, NextPage::EndOfHistory);
}

#[test]
fn duplicate_posts_keep_first_occurrence() {
    let first = PostMarkup {
        text: "original",
        ..PostMarkup::new("demo", 5)
    }
    .render();
    let repeat = PostMarkup {
        text: "repeat",
        ..PostMarkup::new("demo", 5)
    }
    .render();
    let html = first_page("demo", "Demo", &[first, post("demo", 6), repeat]);
    let page = ingest(&raw(None, html)).expect("ingest");

    assert_eq!(ids(&page), vec![5, 6]);
    assert_eq!(page.posts[0].plain_text(), "original");
}

#[test]
fn post_without_identifier_is_skipped() {
    let broken = post("demo", 9).replace(r#" data-post="demo/9""#, "");
    let html = first_page("demo", "Demo", &[broken, post("demo", 10)]);
    let page = ingest(&raw(None, html)).expect("ingest");
    assert_eq!(ids(&page), vec![10]);
}

#[test]
fn attachments_are_typed_or_unsupported() {
    let attachments = r#"
      <a class="tgme_widget_message_photo_wrap" href="https://t.me/demo/4?single" style="width:800px;background-image:url('https://cdn.example/p.jpg')">
        <div class="tgme_widget_message_photo" style="padding-top:50%"></div>
      </a>
      <div class="tgme_widget_message_hologram_wrap"></div>
      <div class="tgme_widget_message_document_wrap">
        <div class="tgme_widget_message_document_title">report.pdf</div>
        <div class="tgme_widget_message_document_extra">1.2 MB</div>
      </div>"#;
    let markup = PostMarkup {
        attachments,
        ..PostMarkup::new("demo", 4)
    }
    .render();
    let page = ingest(&raw(None, first_page("demo", "Demo", &[markup]))).expect("ingest");

    assert_eq!(
        page.posts[0].media,
        vec![
            Media::Photo {
                url: "https://cdn.example/p.jpg".into(),
                aspect_ratio: Some(2.0),
            },
            Media::Unsupported {
                discriminant: "hologram".into(),
                reference: Some("https://t.me/demo/4".into()),
            },
            Media::Document {
                title: "report.pdf".into(),
                extra: Some("1.2 MB".into()),
                url: None,
            },
        ]
    );
}

#[test]
fn known_media_missing_required_field_degrades() {
    let attachments = r#"<a class="tgme_widget_message_video_player" href="https://t.me/demo/8"></a>"#;
    let markup = PostMarkup {
        attachments,
        ..PostMarkup::new("demo", 8)
    }
    .render();
    let page = ingest(&raw(None, first_page("demo", "Demo", &[markup]))).expect("ingest");

    assert_eq!(
        page.posts[0].media,
        vec![Media::Unsupported {
            discriminant: "video".into(),
            reference: Some("https://t.me/demo/8".into()),
        }]
    );
}

fn single(markup: PostMarkup<'_>) -> preview_core::Post {
    let page = ingest(&raw(None, first_page("demo", "Demo", &[markup.render()]))).expect("ingest");
    page.posts.into_iter().next().expect("one post")
}

#[test]
fn video_carries_duration_and_thumbnail() {
    let post = single(PostMarkup {
        attachments: r#"
      <a class="tgme_widget_message_video_player js-message_video_player" href="https://t.me/demo/11">
        <i class="tgme_widget_message_video_thumb" style="background-image:url('https://cdn.example/v.jpg')"></i>
        <div class="tgme_widget_message_video_wrap">
          <video class="tgme_widget_message_video js-message_video" src="https://cdn.example/v.mp4" width="100%" height="100%"></video>
        </div>
        <div class="message_video_play"></div>
        <time class="message_video_duration js-message_video_duration">0:15</time>
      </a>"#,
        ..PostMarkup::new("demo", 11)
    });

    assert_eq!(
        post.media,
        vec![Media::Video {
            url: "https://cdn.example/v.mp4".into(),
            duration_secs: Some(15),
            thumbnail: Some("https://cdn.example/v.jpg".into()),
        }]
    );
}

#[test]
fn poll_keeps_option_order_and_voters() {
    let post = single(PostMarkup {
        attachments: r#"
      <div class="tgme_widget_message_poll js-poll">
        <div class="tgme_widget_message_poll_question">Ship it?</div>
        <div class="tgme_widget_message_poll_type">anonymous poll</div>
        <div class="tgme_widget_message_poll_options">
          <div class="tgme_widget_message_poll_option">
            <div class="tgme_widget_message_poll_option_percent">60%</div>
            <div class="tgme_widget_message_poll_option_value"><div class="tgme_widget_message_poll_option_text">Yes</div></div>
          </div>
          <div class="tgme_widget_message_poll_option">
            <div class="tgme_widget_message_poll_option_percent">40%</div>
            <div class="tgme_widget_message_poll_option_value"><div class="tgme_widget_message_poll_option_text">No</div></div>
          </div>
        </div>
      </div>"#,
        info: r#"<span class="tgme_widget_message_voters">1.1K votes</span>"#,
        text: "",
        ..PostMarkup::new("demo", 12)
    });

    assert_eq!(
        post.media,
        vec![Media::Poll {
            question: "Ship it?".into(),
            kind: Some("anonymous poll".into()),
            voters: Some(1100),
            options: vec![
                PollOption {
                    text: "Yes".into(),
                    percent: Some(60),
                },
                PollOption {
                    text: "No".into(),
                    percent: Some(40),
                },
            ],
        }]
    );
}

#[test]
fn sticker_voice_and_round_video_are_typed() {
    let post = single(PostMarkup {
        attachments: r#"
      <div class="tgme_widget_message_sticker_wrap media_supported_cont">
        <a class="tgme_widget_message_sticker_link" href="https://t.me/addstickers/pack">
          <i class="tgme_widget_message_sticker js-sticker_image" data-webp="//cdn.example/s.webp" style="width:256px;"></i>
        </a>
      </div>
      <a class="tgme_widget_message_voice_player js-message_voice_player">
        <audio class="tgme_widget_message_voice js-message_voice" src="https://cdn.example/a.ogg" preload="none"></audio>
        <time class="tgme_widget_message_voice_duration js-message_voice_duration">0:07</time>
      </a>
      <div class="tgme_widget_message_roundvideo_player js-message_roundvideo_player">
        <i class="tgme_widget_message_roundvideo_thumb" style="background-image:url('https://cdn.example/r.jpg')"></i>
        <video class="tgme_widget_message_roundvideo js-message_roundvideo" src="https://cdn.example/r.mp4"></video>
        <time class="tgme_widget_message_roundvideo_duration">0:12</time>
      </div>"#,
        ..PostMarkup::new("demo", 13)
    });

    assert_eq!(
        post.media,
        vec![
            Media::Sticker {
                url: "https://cdn.example/s.webp".into(),
                thumbnail: None,
            },
            Media::Voice {
                url: "https://cdn.example/a.ogg".into(),
                duration_secs: Some(7),
            },
            Media::RoundVideo {
                url: "https://cdn.example/r.mp4".into(),
                duration_secs: Some(12),
                thumbnail: Some("https://cdn.example/r.jpg".into()),
            },
        ]
    );
}

#[test]
fn reactions_are_tallied_by_symbol() {
    let post = single(PostMarkup {
        tail: r#"
    <div class="tgme_widget_message_reactions js-message_reactions">
      <span class="tgme_reaction"><i class="emoji" style="background-image:url('//cdn.example/e1.png')"><b>👍</b></i>1.2K</span>
      <span class="tgme_reaction"><i class="emoji"><b>🔥</b></i>7</span>
      <span class="tgme_reaction tgme_reaction_paid"><i class="icon icon-reaction-star"></i>15</span>
      <span class="tgme_reaction"><i class="emoji"><b>🎉</b></i></span>
    </div>"#,
        ..PostMarkup::new("demo", 14)
    });

    assert_eq!(
        post.reactions,
        BTreeMap::from([
            ("👍".to_string(), 1200),
            ("🔥".to_string(), 7),
            ("icon-reaction-star".to_string(), 15),
        ])
    );
}

#[test]
fn paid_reaction_without_icon_uses_its_modifier() {
    let post = single(PostMarkup {
        tail: r#"
    <div class="tgme_widget_message_reactions">
      <span class="tgme_reaction tgme_reaction_paid">3</span>
    </div>"#,
        ..PostMarkup::new("demo", 15)
    });

    assert_eq!(post.reactions, BTreeMap::from([("paid".to_string(), 3)]));
}

#[test]
fn forwarded_source_and_inline_buttons_are_kept() {
    let post = single(PostMarkup {
        lead: r#"<div class="tgme_widget_message_forwarded_from accent_color">Forwarded from <a class="tgme_widget_message_forwarded_from_name" href="https://t.me/source_chan/12"><span dir="auto">Source Chan</span></a></div>"#,
        tail: r#"
    <div class="tgme_widget_message_inline_keyboard">
      <div class="tgme_widget_message_inline_row">
        <a class="tgme_widget_message_inline_button url_button" href="https://example.com/join"><div class="tgme_widget_message_inline_button_text">Join</div></a>
      </div>
    </div>"#,
        ..PostMarkup::new("demo", 16)
    });

    assert_eq!(
        post.forwarded_from,
        Some(ForwardedFrom {
            name: "Source Chan".into(),
            url: Some("https://t.me/source_chan/12".into()),
            channel: Some(ChannelId::parse("source_chan").unwrap()),
        })
    );
    assert_eq!(
        post.inline_buttons,
        vec![InlineButton {
            text: "Join".into(),
            url: Some("https://example.com/join".into()),
        }]
    );
    assert!(post.media.is_empty());
}

#[test]
fn scam_label_marks_channel_restricted() {
    let header = HeaderMarkup {
        labels: &["scam-icon"],
        ..HeaderMarkup::new("demo", "Demo")
    };
    let page = ingest(&raw(None, page_with_header(&header, &[]))).expect("ingest");
    let channel = page.channel.expect("descriptor");

    assert!(channel.restricted);
    assert!(!channel.verified);
    assert_eq!(channel.labels, vec!["scam".to_string()]);
}

#[test]
fn single_subscriber_keeps_the_rendered_wording() {
    let header = HeaderMarkup {
        subscribers: "1",
        subscribers_kind: "subscriber",
        ..HeaderMarkup::new("demo", "Demo")
    };
    let page = ingest(&raw(None, page_with_header(&header, &[]))).expect("ingest");
    let channel = page.channel.expect("descriptor");

    assert_eq!(channel.subscribers_text.as_deref(), Some("1 subscriber"));
    assert_eq!(channel.subscribers, Some(1));
    assert_eq!(channel.counters.get("subscriber").map(String::as_str), Some("1"));
}

#[test]
fn newer_page_keeps_posts_above_after_and_points_forward() {
    let source = PageSource::Feed(Anchor::After(PostId(90)));
    let page = ingest(&raw_from(source, older_page(&posts("demo", 88..=95)))).expect("ingest");

    assert_eq!(ids(&page), (91..=95).collect::<Vec<_>>());
    assert_eq!(page.next, NextPage::More(Cursor::after(demo(), PostId(95))));
}

#[test]
fn newer_page_past_the_latest_post_ends() {
    let source = PageSource::Feed(Anchor::After(PostId(100)));
    let page = ingest(&raw_from(source, older_page(&posts("demo", [99, 100])))).expect("ingest");

    assert!(page.posts.is_empty());
    assert_eq!(page.next, NextPage::EndOfHistory);
}

#[test]
fn page_around_a_post_needs_the_header() {
    let source = PageSource::Feed(Anchor::Around(PostId(42)));
    let err = ingest(&raw_from(source, older_page(&posts("demo", 40..=44)))).unwrap_err();
    assert_eq!(err, ParseError::MissingLandmark(Landmark::ChannelHeader));

    let html = first_page("demo", "Demo", &posts("demo", 40..=44));
    let page = ingest(&raw_from(source, html)).expect("ingest");
    assert_eq!(ids(&page), (40..=44).collect::<Vec<_>>());
}

#[test]
fn channel_profile_page_yields_descriptor() {
    let html = profile_page("Demo Channel", "12 345 subscribers", Some("Preview channel"));
    let page = ingest(&raw_from(PageSource::Profile, html)).expect("ingest");
    let channel = page.channel.expect("descriptor");

    assert_eq!(channel.handle, demo());
    assert_eq!(channel.display_name, "Demo Channel");
    assert_eq!(channel.subscribers, Some(12345));
    assert_eq!(channel.subscribers_text.as_deref(), Some("12 345 subscribers"));
    assert_eq!(channel.counters.get("subscribers").map(String::as_str), Some("12 345"));
    assert_eq!(channel.avatar_url.as_deref(), Some("https://cdn.example/profile.jpg"));
    assert_eq!(channel.description.as_deref(), Some("Daily links"));
    assert!(channel.verified);
    assert!(page.posts.is_empty());
    assert_eq!(page.next, NextPage::EndOfHistory);
}

#[test]
fn group_profile_page_is_not_a_channel() {
    let html = profile_page("Demo Chat", "812 members, 20 online", None);
    let page = ingest(&raw_from(PageSource::Profile, html)).expect("ingest");
    assert!(page.channel.is_none());
}
