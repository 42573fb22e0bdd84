//! Card markup: markdown to a full-frame HTML page.
//!
//! The stylesheet here is what the cost model in `layout::cost_model` is
//! calibrated against. Measurement reads the scroll height of `.card-inner`;
//! the page number is absolutely positioned and never affects it.

use pulldown_cmark::{html, Event, Options, Parser};
use serde::Serialize;

use crate::document::Metadata;
use crate::layout::cost_model::CardBudget;
use crate::models::FenceRepair;

/// CSS selector of the element whose height the oracle reports.
pub const MEASURE_SELECTOR: &str = ".card-inner";

const DEFAULT_COVER_EMOJI: &str = "📝";
const COVER_TEXT_LIMIT: usize = 15;

/// Fully rendered markup for one card, plus the markdown it was rendered
/// from (after fence repair).
///
/// `source` lets offline oracles measure without parsing HTML back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardMarkup {
    pub html: String,
    pub source: String,
}

/// Builds card and cover pages for a fixed frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardTemplate {
    width: u32,
    height: u32,
}

impl CardTemplate {
    pub fn new(budget: &CardBudget) -> Self {
        Self {
            width: budget.frame_width,
            height: budget.frame_height,
        }
    }

    /// Frame size in pixels, `(width, height)`.
    pub fn frame(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Markup used for measurement. Always numbered `1/1`, which renders no
    /// page label.
    pub fn measurement(&self, content: &str, repair: &FenceRepair) -> CardMarkup {
        self.card(content, repair, 1, 1)
    }

    /// Markup for the final raster of card `page` of `total`.
    pub fn card(&self, content: &str, repair: &FenceRepair, page: usize, total: usize) -> CardMarkup {
        let markdown = repair_fences(content.trim(), repair);
        let (body, tags) = split_trailing_tags(&markdown);

        let mut inner = markdown_to_html(body);
        if !tags.is_empty() {
            inner.push_str("<div class=\"tags-container\">");
            for tag in &tags {
                inner.push_str(&format!("<span class=\"tag\">#{}</span>", escape_html(tag)));
            }
            inner.push_str("</div>");
        }

        let page_text = if total > 1 {
            format!("{page}/{total}")
        } else {
            String::new()
        };

        let html = format!(
            r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width={width}">
<style>{css}</style>
</head>
<body>
<div class="card-container">
<div class="card-inner"><div class="card-content">
{inner}
</div></div>
<div class="page-number">{page_text}</div>
</div>
</body>
</html>"#,
            width = self.width,
            css = self.card_css(),
        );

        CardMarkup {
            html,
            source: markdown,
        }
    }

    /// Cover page, produced only when the document declares a title or an icon.
    pub fn cover(&self, metadata: &Metadata) -> Option<CardMarkup> {
        if metadata.title.is_none() && metadata.emoji.is_none() {
            return None;
        }
        let emoji = metadata.emoji.as_deref().unwrap_or(DEFAULT_COVER_EMOJI);
        let title = truncate_chars(metadata.title.as_deref().unwrap_or(""), COVER_TEXT_LIMIT);
        let subtitle = truncate_chars(
            metadata.subtitle.as_deref().unwrap_or(""),
            COVER_TEXT_LIMIT,
        );

        let html = format!(
            r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width={width}, height={height}">
<style>{css}</style>
</head>
<body>
<div class="cover-container"><div class="cover-inner">
<div class="cover-emoji">{emoji}</div>
<div class="cover-title">{title}</div>
<div class="cover-subtitle">{subtitle}</div>
</div></div>
</body>
</html>"#,
            width = self.width,
            height = self.height,
            css = self.cover_css(),
            emoji = escape_html(emoji),
            title = escape_html(title),
            subtitle = escape_html(subtitle),
        );

        let source = [metadata.title.as_deref(), metadata.subtitle.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n");
        Some(CardMarkup { html, source })
    }

    fn card_css(&self) -> String {
        let (w, h) = (self.width, self.height);
        format!(
            "*{{margin:0;padding:0;box-sizing:border-box}}\
body{{font-family:'Noto Sans SC','PingFang SC',sans-serif;width:{w}px;min-height:{h}px;overflow:hidden}}\
.card-container{{width:{w}px;min-height:{h}px;position:relative;padding:50px;overflow:hidden;\
background:linear-gradient(135deg,#667eea 0%,#764ba2 100%)}}\
.card-inner{{background:rgba(255,255,255,0.95);border-radius:20px;padding:60px;min-height:calc({h}px - 100px)}}\
.card-content{{color:#475569;font-size:42px;line-height:1.7}}\
.card-content h1{{font-size:72px;font-weight:700;margin-bottom:40px;line-height:1.3}}\
.card-content h2{{font-size:56px;font-weight:600;margin:50px 0 25px 0;line-height:1.4}}\
.card-content h3,.card-content h4,.card-content h5,.card-content h6{{font-size:48px;font-weight:600;margin:40px 0 20px 0}}\
.card-content p{{margin-bottom:35px}}\
.card-content ul,.card-content ol{{margin:30px 0;padding-left:60px}}\
.card-content li{{margin-bottom:20px;line-height:1.6}}\
.card-content blockquote{{border-left:8px solid #6366f1;padding:25px 30px 25px 40px;margin:35px 0;\
background:#f1f5f9;color:#64748b;font-style:italic}}\
.card-content blockquote p{{margin:0}}\
.card-content pre{{background:#1e293b;color:#e2e8f0;padding:40px;border-radius:16px;margin:35px 0;\
white-space:pre-wrap;word-break:break-all;font-size:36px;line-height:1.5}}\
.card-content img{{max-width:100%;height:auto;border-radius:16px;margin:35px auto;display:block}}\
.tags-container{{margin-top:50px;padding-top:30px;border-top:2px solid #e2e8f0}}\
.tag{{display:inline-block;background:#6366f1;color:#fff;padding:12px 28px;border-radius:30px;\
font-size:34px;margin:10px 15px 10px 0}}\
.page-number{{position:absolute;bottom:80px;right:80px;font-size:36px;color:rgba(255,255,255,0.8)}}"
        )
    }

    fn cover_css(&self) -> String {
        let (w, h) = (self.width, self.height);
        format!(
            "*{{margin:0;padding:0;box-sizing:border-box}}\
body{{font-family:'Noto Sans SC','PingFang SC',sans-serif;width:{w}px;height:{h}px;overflow:hidden}}\
.cover-container{{width:{w}px;height:{h}px;position:relative;overflow:hidden;\
background:linear-gradient(180deg,#3450E4 0%,#D266DA 100%)}}\
.cover-inner{{position:absolute;left:65px;top:65px;width:calc(100% - 130px);height:calc(100% - 130px);\
background:#F3F3F3;border-radius:25px;display:flex;flex-direction:column;padding:80px 85px}}\
.cover-emoji{{font-size:180px;line-height:1.2;margin-bottom:50px}}\
.cover-title{{font-weight:900;font-size:130px;line-height:1.4;flex:1;word-break:break-all}}\
.cover-subtitle{{font-weight:350;font-size:72px;line-height:1.4;margin-top:auto}}"
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Markdown helpers
// ────────────────────────────────────────────────────────────────────────────

/// Converts markdown to HTML. Single newlines render as line breaks.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, parser);
    out
}

/// Wraps a card cut inside a code block with the fences it lost.
fn repair_fences(content: &str, repair: &FenceRepair) -> String {
    let mut out = String::with_capacity(content.len() + 16);
    if let Some(open) = &repair.open {
        out.push_str(open);
        out.push('\n');
    }
    out.push_str(content);
    if let Some(close) = &repair.close {
        out.push('\n');
        out.push_str(close);
    }
    out
}

/// Splits a trailing hashtag line (`#tag #tag2`) off the card body.
///
/// Returns the remaining body and the tag names without `#`.
fn split_trailing_tags(markdown: &str) -> (&str, Vec<&str>) {
    let trimmed = markdown.trim_end();
    let (body, last_line) = match trimmed.rfind('\n') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("", trimmed),
    };

    let tags: Option<Vec<&str>> = last_line
        .split_whitespace()
        .map(|token| {
            token
                .strip_prefix('#')
                .filter(|name| !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_'))
        })
        .collect();

    match tags {
        Some(tags) if !tags.is_empty() => (body, tags),
        _ => (markdown, Vec::new()),
    }
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
