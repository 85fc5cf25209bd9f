use ego_tree::NodeRef;
use preview_core::Segment;
use scraper::node::Node;
use scraper::ElementRef;

/// Turn a message text block into ordered segments.
///
/// Known inline tags map to typed segments, wrappers (`span`, `div`, `p`)
/// are transparent, and unknown tags keep their inner text as plain text.
/// Nothing visible is dropped.
pub fn segments(block: ElementRef<'_>) -> Vec<Segment> {
    let mut ctx = SegmentContext::default();
    for child in block.children() {
        visit_node(child, &mut ctx);
    }
    ctx.into_segments()
}

/// Visible text of a block with `<br>` rendered as newlines.
pub fn plain_text(block: ElementRef<'_>) -> String {
    segments(block).iter().map(Segment::text).collect()
}

fn visit_node(node: NodeRef<'_, Node>, ctx: &mut SegmentContext) {
    match node.value() {
        Node::Text(text) => ctx.append_text(text),
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                visit_element(element, ctx);
            }
        }
        _ => {}
    }
}

fn visit_element(element: ElementRef<'_>, ctx: &mut SegmentContext) {
    let tag = element.value().name().to_ascii_lowercase();
    match tag.as_str() {
        "br" => ctx.push(Segment::LineBreak),
        "a" => handle_anchor(element, ctx),
        "b" | "strong" => ctx.push_text(element, |text| Segment::Bold { text }),
        "i" if has_class(element, "emoji") => ctx.append_text(&inner_text(element)),
        "i" | "em" => ctx.push_text(element, |text| Segment::Italic { text }),
        "u" | "ins" => ctx.push_text(element, |text| Segment::Underline { text }),
        "s" | "del" | "strike" => ctx.push_text(element, |text| Segment::Strikethrough { text }),
        "code" => ctx.push_text(element, |text| Segment::Code { text }),
        "pre" => ctx.push_text(element, |text| Segment::Pre { text }),
        "blockquote" => ctx.push_text(element, |text| Segment::Quote { text }),
        "tg-spoiler" => ctx.push_text(element, |text| Segment::Spoiler { text }),
        "span" if has_class(element, "tg-spoiler") => {
            ctx.push_text(element, |text| Segment::Spoiler { text })
        }
        "tg-emoji" => {
            let emoji_id = element.value().attr("emoji-id").map(str::to_string);
            ctx.push_text(element, |text| Segment::CustomEmoji { text, emoji_id })
        }
        "span" | "div" | "p" => {
            for child in element.children() {
                visit_node(child, ctx);
            }
        }
        "script" | "style" | "template" => {
            // not visible text
        }
        _ => ctx.append_text(&inner_text(element)),
    }
}

fn handle_anchor(element: ElementRef<'_>, ctx: &mut SegmentContext) {
    let text = inner_text(element);
    let href = element.value().attr("href").map(str::trim);
    match href {
        _ if text.starts_with('#') => ctx.push(Segment::Hashtag { tag: text }),
        Some(url) if text.starts_with('@') => ctx.push(Segment::Mention {
            handle: text,
            url: url.to_string(),
        }),
        Some(url) if !url.is_empty() => ctx.push(Segment::Link {
            text,
            url: url.to_string(),
        }),
        _ => ctx.append_text(&text),
    }
}

fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn inner_text(element: ElementRef<'_>) -> String {
    let mut ctx = SegmentContext::default();
    for child in element.children() {
        visit_node(child, &mut ctx);
    }
    ctx.into_segments().iter().map(Segment::text).collect()
}

#[derive(Default)]
struct SegmentContext {
    segments: Vec<Segment>,
    plain: String,
}

impl SegmentContext {
    fn append_text(&mut self, text: &str) {
        self.plain.push_str(text);
    }

    fn push_text(&mut self, element: ElementRef<'_>, build: impl FnOnce(String) -> Segment) {
        let text = inner_text(element);
        if !text.is_empty() {
            self.push(build(text));
        }
    }

    fn push(&mut self, segment: Segment) {
        self.flush_plain();
        self.segments.push(segment);
    }

    fn flush_plain(&mut self) {
        if !self.plain.is_empty() {
            let text = std::mem::take(&mut self.plain);
            self.segments.push(Segment::Plain { text });
        }
    }

    fn into_segments(mut self) -> Vec<Segment> {
        self.flush_plain();
        self.segments
    }
}
