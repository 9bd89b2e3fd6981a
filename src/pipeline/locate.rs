//! Placeholder lookup over the shape tree.
//!
//! A token is `{{name}}`. Matching ignores all whitespace on both sides, so a
//! token that an earlier edit split across runs (`{{ company` + `_name}}`) or
//! that the author typed as `{{ name }}` is still found. Text shapes are
//! searched in full; tables only in their top-left cell.

use crate::deck::{Presentation, Shape, ShapeKind, TextFrame};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Position of a shape: slide index and index within [`crate::deck::Slide::shapes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ShapeRef {
    pub slide: usize,
    pub shape: usize,
}

/// The literal form of a token.
pub fn token_pattern(name: &str) -> String {
    format!("{{{{{name}}}}}")
}

fn squash(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// The frame a token is searched in: the body of a text shape, or the
/// top-left cell of a table.
pub fn token_frame(shape: &Shape) -> Option<&TextFrame> {
    match &shape.kind {
        ShapeKind::Text(frame) => Some(frame),
        ShapeKind::Table(table) => table.cell(0, 0).map(|c| &c.frame),
        _ => None,
    }
}

pub fn token_frame_mut(shape: &mut Shape) -> Option<&mut TextFrame> {
    match &mut shape.kind {
        ShapeKind::Text(frame) => Some(frame),
        ShapeKind::Table(table) => table.cell_mut(0, 0).map(|c| &mut c.frame),
        _ => None,
    }
}

/// `true` when the frame's text, whitespace removed, contains the token.
pub fn frame_contains(frame: &TextFrame, name: &str) -> bool {
    squash(&frame.text()).contains(&squash(&token_pattern(name)))
}

/// Every shape whose searchable text contains `{{name}}`, in slide order.
pub fn find_shapes_containing(pres: &Presentation, name: &str) -> Vec<ShapeRef> {
    let mut found = Vec::new();
    for (si, slide) in pres.slides().iter().enumerate() {
        for (hi, shape) in slide.shapes().iter().enumerate() {
            if token_frame(shape).is_some_and(|f| frame_contains(f, name)) {
                found.push(ShapeRef { slide: si, shape: hi });
            }
        }
    }
    found
}

/// `true` when the token is the shape's entire content, whitespace ignored.
pub fn shape_is_exactly(shape: &Shape, name: &str) -> bool {
    token_frame(shape).is_some_and(|f| squash(&f.text()) == squash(&token_pattern(name)))
}

/// First table whose top-left cell holds the token.
pub fn find_table_with_token(pres: &Presentation, name: &str) -> Option<ShapeRef> {
    find_shapes_containing(pres, name)
        .into_iter()
        .find(|r| pres.slides()[r.slide].shapes()[r.shape].has_table())
}

pub fn shape_at<'p>(pres: &'p Presentation, at: ShapeRef) -> Option<&'p Shape> {
    pres.slide(at.slide).and_then(|s| s.shape(at.shape))
}

pub fn shape_at_mut<'p>(pres: &'p mut Presentation, at: ShapeRef) -> Option<&'p mut Shape> {
    pres.slide_mut(at.slide).and_then(|s| s.shape_mut(at.shape))
}

// ── Inventory ────────────────────────────────────────────────────────────

static RE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").unwrap());

/// Where a token was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiteKind {
    Text,
    TableCell { row: usize, col: usize },
}

/// One token occurrence in a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceholderSite {
    /// 0-based slide index.
    pub slide: usize,
    pub shape_name: String,
    #[serde(flatten)]
    pub kind: SiteKind,
    pub token: String,
    /// The token is the shape's whole content.
    pub standalone: bool,
}

/// Every token in the template, including tokens in any table cell.
pub fn list_placeholders(pres: &Presentation) -> Vec<PlaceholderSite> {
    let mut sites = Vec::new();
    for (si, slide) in pres.slides().iter().enumerate() {
        for shape in slide.shapes() {
            let mut push = |frame: &TextFrame, kind: SiteKind| {
                let text = frame.text();
                for caps in RE_TOKEN.captures_iter(&text) {
                    let token = caps[1].to_string();
                    let standalone = squash(&text) == squash(&token_pattern(&token));
                    sites.push(PlaceholderSite {
                        slide: si,
                        shape_name: shape.name.clone(),
                        kind: kind.clone(),
                        token,
                        standalone,
                    });
                }
            };
            match &shape.kind {
                ShapeKind::Text(frame) => push(frame, SiteKind::Text),
                ShapeKind::Table(table) => {
                    for (row, col, cell) in table.cells() {
                        push(&cell.frame, SiteKind::TableCell { row, col });
                    }
                }
                _ => {}
            }
        }
    }
    sites
}
