//! Rich-text rendering into text frames.
//!
//! Replacement values carry a tiny emphasis grammar: `***x***`, `**x**`,
//! `__x__`, `*x*` and `_x_`. Every emphasised span becomes a bold run with the
//! markers removed; slides in this template family use bold, never italic,
//! for emphasis. Anything the tokenizer cannot pair stays literal.
//!
//! Two substitution paths exist:
//!
//! * **Whole-shape**: the token is the shape's entire content. The frame's
//!   paragraph list is replaced wholesale, one paragraph per line, and the
//!   body is set to wrap, shrink on overflow and use the standard insets.
//! * **Inline**: the token sits among other text. Each paragraph holding it
//!   has the token substituted in its concatenated text and is re-rendered
//!   through the same emphasis pass, keeping the paragraph's alignment and
//!   the first run's size, colour and face.

use crate::deck::{
    Alignment, Anchor, AutoFit, BodyProps, Font, Insets, Paragraph, Presentation, Rgb, Run,
    TextFrame,
};
use crate::pipeline::locate::{find_shapes_containing, shape_at_mut, shape_is_exactly, token_frame_mut};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use tracing::debug;

/// Standard text-body insets: 0.25 in top, 0.2 in sides, 0.1 in bottom.
pub const BODY_INSETS: Insets = Insets {
    left: 182_880,
    top: 228_600,
    right: 182_880,
    bottom: 91_440,
};

/// Formatting applied to every run a render produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextStyle {
    pub size_pt: Option<f32>,
    /// Force every run bold regardless of markers.
    pub bold: bool,
    /// `None` keeps the frame's first paragraph alignment (left if unset).
    pub alignment: Option<Alignment>,
    pub color: Option<Rgb>,
    pub typeface: Option<String>,
}

impl TextStyle {
    pub fn sized(size_pt: f32) -> Self {
        Self {
            size_pt: Some(size_pt),
            ..Self::default()
        }
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    pub fn aligned(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn color(mut self, color: Option<Rgb>) -> Self {
        self.color = color;
        self
    }

    pub fn typeface(mut self, face: impl Into<String>) -> Self {
        self.typeface = Some(face.into());
        self
    }

    fn font(&self, emphasised: bool) -> Font {
        Font {
            size_pt: self.size_pt,
            bold: Some(self.bold || emphasised),
            italic: None,
            color: self.color,
            typeface: self.typeface.clone(),
        }
    }
}

// ── Emphasis tokenizer ───────────────────────────────────────────────────

/// A span of one line: literal or emphasised text, markers removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub emphasised: bool,
}

const MARKERS: [&str; 5] = ["***", "**", "__", "*", "_"];

fn at(chars: &[char], i: usize, marker: &str) -> bool {
    marker
        .chars()
        .enumerate()
        .all(|(k, m)| chars.get(i + k) == Some(&m))
}

fn can_open(chars: &[char], i: usize, marker: &str) -> bool {
    let len = marker.chars().count();
    let Some(&next) = chars.get(i + len) else {
        return false;
    };
    let mc = chars[i];
    if next.is_whitespace() || (len == 1 && next == mc) {
        return false;
    }
    if mc == '_' && i > 0 && chars[i - 1].is_alphanumeric() {
        return false;
    }
    true
}

fn can_close(chars: &[char], j: usize, marker: &str) -> bool {
    let len = marker.chars().count();
    let mc = chars[j];
    let prev = chars[j - 1];
    if prev.is_whitespace() {
        return false;
    }
    let after = chars.get(j + len).copied();
    if len == 1 && (prev == mc || after == Some(mc)) {
        return false;
    }
    if mc == '_' && after.is_some_and(char::is_alphanumeric) {
        return false;
    }
    true
}

/// Split one line into literal and emphasised segments.
pub fn tokenize(line: &str) -> Vec<Segment> {
    let chars: Vec<char> = line.chars().collect();
    let mut out: Vec<Segment> = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    'scan: while i < chars.len() {
        for marker in MARKERS {
            if !at(&chars, i, marker) || !can_open(&chars, i, marker) {
                continue;
            }
            let len = marker.chars().count();
            // Content must be non-empty, so the closer starts at i + len + 1 at the earliest.
            let close = (i + len + 1..chars.len())
                .find(|&j| at(&chars, j, marker) && can_close(&chars, j, marker));
            if let Some(j) = close {
                push(&mut out, std::mem::take(&mut literal), false);
                let inner: String = chars[i + len..j].iter().collect();
                let text: String = tokenize(&inner).into_iter().map(|s| s.text).collect();
                push(&mut out, text, true);
                i = j + len;
                continue 'scan;
            }
        }
        literal.push(chars[i]);
        i += 1;
    }
    push(&mut out, literal, false);
    out
}

fn push(out: &mut Vec<Segment>, text: String, emphasised: bool) {
    if text.is_empty() {
        return;
    }
    match out.last_mut() {
        Some(last) if last.emphasised == emphasised => last.text.push_str(&text),
        _ => out.push(Segment { text, emphasised }),
    }
}

// ── Label heuristic ──────────────────────────────────────────────────────

static RE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<lead>\s*(?:[-*•–]\s+|\d+[.)]\s+)?)(?P<label>[^\s:*_][^:*_]{0,59}):(?P<rest>\s.*)?$")
        .unwrap()
});

/// Wrap a leading `Label:` in bold markers.
///
/// Applies to `Label: value`, `- Label: value` and `1. Label: value` lines,
/// with labels up to 60 characters. Lines that already use markers in the
/// label, or where the colon is not followed by whitespace (`10:30`, URLs),
/// are left alone.
pub fn emphasise_label(line: &str) -> String {
    match RE_LABEL.captures(line) {
        Some(c) => format!(
            "{}**{}:**{}",
            &c["lead"],
            c["label"].trim_end(),
            c.name("rest").map_or("", |m| m.as_str())
        ),
        None => line.to_string(),
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

fn line_runs(line: &str, style: &TextStyle) -> Vec<Run> {
    tokenize(&emphasise_label(line))
        .into_iter()
        .map(|seg| Run {
            font: style.font(seg.emphasised),
            text: seg.text,
        })
        .collect()
}

fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(|l| l.trim_end_matches('\r'))
}

/// Replace a frame's content with `text`.
///
/// One paragraph per `\n`-separated line; empty lines become empty
/// paragraphs. Empty `text` still clears the frame, leaving one paragraph
/// with one empty run.
pub fn render(frame: &mut TextFrame, text: &str, style: &TextStyle) {
    let alignment = style
        .alignment
        .or_else(|| frame.paragraphs().first().and_then(Paragraph::alignment))
        .unwrap_or_default();

    let paragraphs: Vec<Paragraph> = if text.is_empty() {
        vec![Paragraph::new(vec![Run {
            text: String::new(),
            font: style.font(false),
        }])
        .with_alignment(alignment)]
    } else {
        lines(text)
            .map(|line| Paragraph::new(line_runs(line, style)).with_alignment(alignment))
            .collect()
    };
    frame.replace_paragraphs(paragraphs);

    *frame.body_mut() = BodyProps {
        word_wrap: Some(true),
        insets: Some(BODY_INSETS),
        anchor: Some(if alignment == Alignment::Center {
            Anchor::Middle
        } else {
            Anchor::Top
        }),
        autofit: Some(AutoFit::Shrink),
    };
}

/// A regex for the token that tolerates whitespace anywhere inside it.
fn token_regex(name: &str) -> Option<Regex> {
    let pattern = format!("{{{{{name}}}}}")
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| regex::escape(&c.to_string()))
        .collect::<Vec<_>>()
        .join(r"\s*");
    Regex::new(&pattern).ok()
}

/// Substitute the token inside mixed content. Returns occurrences replaced.
fn render_inline(frame: &mut TextFrame, token: &Regex, value: &str, style: &TextStyle) -> usize {
    let mut count = 0;
    let mut rebuilt = Vec::with_capacity(frame.paragraphs().len());

    for p in frame.paragraphs() {
        let text = p.text();
        let hits = token.find_iter(&text).count();
        if hits == 0 {
            rebuilt.push(p.clone());
            continue;
        }
        count += hits;

        let first = p.runs().first().map(|r| r.font.clone()).unwrap_or_default();
        let inherited = TextStyle {
            size_pt: style.size_pt.or(first.size_pt),
            bold: style.bold || first.bold == Some(true),
            alignment: p.alignment().or(style.alignment),
            color: style.color.or(first.color),
            typeface: style.typeface.clone().or(first.typeface),
        };
        let replaced = token.replace_all(&text, NoExpand(value));
        for line in lines(&replaced) {
            let mut para = Paragraph::new(line_runs(line, &inherited));
            para.set_alignment(inherited.alignment);
            rebuilt.push(para);
        }
    }

    if count > 0 {
        frame.replace_paragraphs(rebuilt);
    }
    count
}

/// Replace every `{{name}}` in the deck. Returns the number of locations
/// changed; zero means the template has no such token.
pub fn replace_placeholder(pres: &mut Presentation, name: &str, value: &str, style: &TextStyle) -> usize {
    let Some(token) = token_regex(name) else {
        return 0;
    };
    let mut count = 0;
    for at in find_shapes_containing(pres, name) {
        let Some(shape) = shape_at_mut(pres, at) else {
            continue;
        };
        let exact = shape_is_exactly(shape, name);
        let Some(frame) = token_frame_mut(shape) else {
            continue;
        };
        if exact {
            render(frame, value, style);
            count += 1;
        } else {
            count += render_inline(frame, &token, value, style);
        }
    }
    debug!("{{{{{name}}}}} replaced at {count} locations");
    count
}

/// Remove every `{{name}}` from the deck.
pub fn clear_placeholder(pres: &mut Presentation, name: &str) -> usize {
    replace_placeholder(pres, name, "", &TextStyle::default())
}
