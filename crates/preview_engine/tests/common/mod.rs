//! Preview page markup shaped like the upstream widget pages.
#![allow(dead_code)]

pub struct PostMarkup<'a> {
    pub handle: &'a str,
    pub id: u64,
    pub text: &'a str,
    pub views: Option<&'a str>,
    pub datetime: Option<&'a str>,
    pub attachments: &'a str,
    /// Bubble content above the attachments, such as the forwarded-from line.
    pub lead: &'a str,
    /// Extra footer info next to the views, such as poll voters.
    pub info: &'a str,
    /// Message content below the bubble: reactions, inline keyboards.
    pub tail: &'a str,
}

impl<'a> PostMarkup<'a> {
    pub fn new(handle: &'a str, id: u64) -> Self {
        Self {
            handle,
            id,
            text: "hello",
            views: Some("1.2K"),
            datetime: Some("2024-03-01T12:00:00+00:00"),
            attachments: "",
            lead: "",
            info: "",
            tail: "",
        }
    }

    pub fn render(&self) -> String {
        let views = self
            .views
            .map(|views| format!(r#"<span class="tgme_widget_message_views">{views}</span>"#))
            .unwrap_or_default();
        let time = self
            .datetime
            .map(|datetime| format!(r#"<time datetime="{datetime}" class="time">12:00</time>"#))
            .unwrap_or_default();
        format!(
            r#"<div class="tgme_widget_message_wrap js-widget_message_wrap">
  <div class="tgme_widget_message js-widget_message" data-post="{handle}/{id}">
    <div class="tgme_widget_message_bubble">
      {lead}
      {attachments}
      <div class="tgme_widget_message_text js-message_text" dir="auto">{text}</div>
      <div class="tgme_widget_message_footer compact js-message_footer">
        <div class="tgme_widget_message_info short js-message_info">
          {info}
          {views}
          <span class="tgme_widget_message_meta"><a class="tgme_widget_message_date" href="https://t.me/{handle}/{id}">{time}</a></span>
        </div>
      </div>
    </div>
    {tail}
  </div>
</div>"#,
            handle = self.handle,
            id = self.id,
            lead = self.lead,
            info = self.info,
            tail = self.tail,
            attachments = self.attachments,
            text = self.text,
        )
    }
}

pub fn post(handle: &str, id: u64) -> String {
    PostMarkup::new(handle, id).render()
}

/// Channel identity block of a first page.
pub struct HeaderMarkup<'a> {
    pub handle: &'a str,
    pub title: &'a str,
    /// Classes of the `<i>` labels beside the title.
    pub labels: &'a [&'a str],
    pub subscribers: &'a str,
    pub subscribers_kind: &'a str,
}

impl<'a> HeaderMarkup<'a> {
    pub fn new(handle: &'a str, title: &'a str) -> Self {
        Self {
            handle,
            title,
            labels: &["verified-icon"],
            subscribers: "1.2K",
            subscribers_kind: "subscribers",
        }
    }

    pub fn render(&self) -> String {
        let labels: String = self
            .labels
            .iter()
            .map(|class| format!(r#"<i class="{class}"></i>"#))
            .collect();
        format!(
            r#"<div class="tgme_channel_info">
  <div class="tgme_channel_info_header">
    <i class="tgme_page_photo_image"><img src="https://cdn.example/{handle}.jpg"></i>
    <div class="tgme_channel_info_header_title"><span dir="auto">{title}</span></div>
    <div class="tgme_channel_info_header_labels">{labels}</div>
    <div class="tgme_channel_info_header_username"><a href="https://t.me/{handle}">@{handle}</a></div>
  </div>
  <div class="tgme_channel_info_counters">
    <div class="tgme_channel_info_counter"><span class="counter_value">{subscribers}</span> <span class="counter_type">{kind}</span></div>
    <div class="tgme_channel_info_counter"><span class="counter_value">340</span> <span class="counter_type">photos</span></div>
  </div>
  <div class="tgme_channel_info_description">News and <b>notes</b></div>
</div>"#,
            handle = self.handle,
            title = self.title,
            subscribers = self.subscribers,
            kind = self.subscribers_kind,
        )
    }
}

fn header(handle: &str, title: &str) -> String {
    HeaderMarkup::new(handle, title).render()
}

fn document(head: &str, header: &str, feed: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8">{head}</head>
<body class="widget_frame_base">
{header}
<main class="tgme_main">
  <section class="tgme_channel_history js-message_history">
{feed}
  </section>
</main>
</body></html>"#
    )
}

/// First page: header plus posts in upstream (oldest first) order.
pub fn first_page(handle: &str, title: &str, posts: &[String]) -> String {
    document(
        &format!(r#"<meta property="og:title" content="{title}">"#),
        &header(handle, title),
        &posts.concat(),
    )
}

/// First page with a customized header.
pub fn page_with_header(header: &HeaderMarkup<'_>, posts: &[String]) -> String {
    document(
        &format!(r#"<meta property="og:title" content="{}">"#, header.title),
        &header.render(),
        &posts.concat(),
    )
}

/// Older page as served for `?before=`: same feed, header optional.
pub fn older_page(posts: &[String]) -> String {
    document("", "", &posts.concat())
}

/// `/<handle>` landing page. `context` is the preview link text, if any.
pub fn profile_page(title: &str, extra: &str, context: Option<&str>) -> String {
    let context = context
        .map(|text| format!(r#"<a class="tgme_page_context_link" href="/s/demo">{text}</a>"#))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html><head><meta property="og:title" content="{title}"></head>
<body class="no_transition">
<div class="tgme_page_wrap">
  <div class="tgme_page">
    <div class="tgme_page_photo"><a href="tg://resolve?domain=demo"><img class="tgme_page_photo_image" src="https://cdn.example/profile.jpg"></a></div>
    <div class="tgme_page_title"><span dir="auto">{title}</span><i class="verified-icon"></i></div>
    <div class="tgme_page_extra">{extra}</div>
    <div class="tgme_page_description">Daily <a href="https://example.com">links</a></div>
    <div class="tgme_page_action"><a class="tgme_action_button_new" href="tg://resolve?domain=demo">View in Telegram</a></div>
    <div class="tgme_page_context_link_wrap">{context}</div>
  </div>
</div>
</body></html>"#
    )
}

pub fn without_feed(handle: &str) -> String {
    format!(
        r#"<html><head></head><body>{}<div class="tgme_page">gone</div></body></html>"#,
        header(handle, handle)
    )
}

/// Posts `ids` rendered in ascending order, as the upstream lays them out.
pub fn posts(handle: &str, ids: impl IntoIterator<Item = u64>) -> Vec<String> {
    let mut ids: Vec<u64> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.into_iter().map(|id| post(handle, id)).collect()
}
