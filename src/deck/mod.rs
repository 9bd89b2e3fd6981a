//! In-memory presentation model.
//!
//! Shapes are classified once, when a slide is parsed, into the tagged union
//! [`ShapeKind`]; callers test capabilities through [`Shape::has_text`],
//! [`Shape::has_table`] and [`Shape::has_picture`] instead of probing markup
//! at every access site. Group shapes are flattened into their slide so the
//! locator sees one list per slide.
//!
//! Lengths are EMU (914 400 per inch), font sizes are points.

mod package;
pub(crate) mod xml;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

pub(crate) use package::Package;

pub const EMU_PER_INCH: i64 = 914_400;

/// Default slide size when `sldSz` is absent: 10 × 7.5 in.
pub const DEFAULT_SLIDE_SIZE: (i64, i64) = (9_144_000, 6_858_000);

// ── Geometry ─────────────────────────────────────────────────────────────

/// An axis-aligned rectangle in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn from_inches(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left: inches_to_emu(left),
            top: inches_to_emu(top),
            width: inches_to_emu(width),
            height: inches_to_emu(height),
        }
    }
}

pub fn inches_to_emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH as f64).round() as i64
}

/// Fractions trimmed from each edge of a picture, 0.0–1.0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Crop {
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub bottom: f64,
}

impl Crop {
    /// A crop is usable when every edge is within 0–1 and opposite edges
    /// leave something visible.
    pub fn is_valid(&self) -> bool {
        let edges = [self.left, self.top, self.right, self.bottom];
        edges.iter().all(|e| e.is_finite() && (0.0..1.0).contains(e))
            && self.left + self.right < 1.0
            && self.top + self.bottom < 1.0
    }

    /// DrawingML stores crop edges in 1/100 000ths.
    pub(crate) fn to_attr(fraction: f64) -> i64 {
        (fraction * 100_000.0).round() as i64
    }

    pub(crate) fn from_attr(value: Option<i64>) -> f64 {
        value.map(|v| v as f64 / 100_000.0).unwrap_or(0.0)
    }
}

// ── Text formatting ──────────────────────────────────────────────────────

/// An sRGB colour, written as `RRGGBB` in configuration and markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("'{s}' is not an RRGGBB colour"));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| e.to_string());
        Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_hex()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub(crate) fn as_attr(self) -> &'static str {
        match self {
            Alignment::Left => "l",
            Alignment::Center => "ctr",
            Alignment::Right => "r",
            Alignment::Justify => "just",
        }
    }

    pub(crate) fn from_attr(s: &str) -> Option<Self> {
        match s {
            "l" => Some(Alignment::Left),
            "ctr" => Some(Alignment::Center),
            "r" => Some(Alignment::Right),
            "just" | "dist" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

/// Vertical anchor of a text body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Top,
    Middle,
    Bottom,
}

impl Anchor {
    pub(crate) fn as_attr(self) -> &'static str {
        match self {
            Anchor::Top => "t",
            Anchor::Middle => "ctr",
            Anchor::Bottom => "b",
        }
    }

    pub(crate) fn from_attr(s: &str) -> Option<Self> {
        match s {
            "t" => Some(Anchor::Top),
            "ctr" => Some(Anchor::Middle),
            "b" => Some(Anchor::Bottom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoFit {
    /// Shrink text on overflow (`normAutofit`).
    Shrink,
    /// Grow the shape to fit (`spAutoFit`).
    Resize,
    Off,
}

/// Inner margins of a text body, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insets {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

/// Text-body properties (`a:bodyPr`). `None` leaves the inherited value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyProps {
    pub word_wrap: Option<bool>,
    pub insets: Option<Insets>,
    pub anchor: Option<Anchor>,
    pub autofit: Option<AutoFit>,
}

/// Character formatting of one run. `None` inherits from the template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Font {
    pub size_pt: Option<f32>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub color: Option<Rgb>,
    pub typeface: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Run {
    pub text: String,
    pub font: Font,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: Font::default(),
        }
    }

    pub fn is_bold(&self) -> bool {
        self.font.bold == Some(true)
    }
}

/// A paragraph: ordered runs plus alignment.
///
/// Paragraphs read from a template keep their original markup and are
/// written back verbatim until something mutates them.
#[derive(Debug, Clone, Default)]
pub struct Paragraph {
    runs: Vec<Run>,
    alignment: Option<Alignment>,
    raw: Option<String>,
}

impl PartialEq for Paragraph {
    fn eq(&self, other: &Self) -> bool {
        self.runs == other.runs && self.alignment == other.alignment
    }
}

impl Paragraph {
    pub fn new(runs: Vec<Run>) -> Self {
        Self {
            runs,
            alignment: None,
            raw: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn parsed(runs: Vec<Run>, alignment: Option<Alignment>, raw: String) -> Self {
        Self {
            runs,
            alignment,
            raw: Some(raw),
        }
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn runs_mut(&mut self) -> &mut Vec<Run> {
        self.raw = None;
        &mut self.runs
    }

    pub fn alignment(&self) -> Option<Alignment> {
        self.alignment
    }

    pub fn set_alignment(&mut self, alignment: Option<Alignment>) {
        self.raw = None;
        self.alignment = alignment;
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    /// Concatenated run text.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    pub(crate) fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

/// Where a text body lives in the slide markup.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TextSite {
    /// Byte range of an existing `txBody` element.
    Body(Range<usize>),
    /// No body yet; a new one is written at this offset.
    InsertAt(usize),
}

/// A text container: a slide shape's body or a table cell's body.
#[derive(Debug, Clone)]
pub struct TextFrame {
    paragraphs: Vec<Paragraph>,
    body: BodyProps,
    pub(crate) site: Option<TextSite>,
    pub(crate) tag: String,
    pub(crate) body_raw: Option<String>,
    pub(crate) list_style_raw: Option<String>,
    dirty: bool,
    body_dirty: bool,
}

impl Default for TextFrame {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TextFrame {
    /// A detached frame, not backed by template markup.
    pub fn new(paragraphs: Vec<Paragraph>) -> Self {
        Self {
            paragraphs,
            body: BodyProps::default(),
            site: None,
            tag: "p:txBody".to_string(),
            body_raw: None,
            list_style_raw: None,
            dirty: false,
            body_dirty: false,
        }
    }

    /// A detached frame with one plain run per line.
    pub fn from_text(text: &str) -> Self {
        Self::new(
            text.split('\n')
                .map(|line| Paragraph::new(vec![Run::plain(line)]))
                .collect(),
        )
    }

    pub(crate) fn parsed(
        paragraphs: Vec<Paragraph>,
        body: BodyProps,
        site: TextSite,
        tag: String,
        body_raw: Option<String>,
        list_style_raw: Option<String>,
    ) -> Self {
        Self {
            paragraphs,
            body,
            site: Some(site),
            tag,
            body_raw,
            list_style_raw,
            dirty: false,
            body_dirty: false,
        }
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn paragraphs_mut(&mut self) -> &mut Vec<Paragraph> {
        self.dirty = true;
        &mut self.paragraphs
    }

    /// Replace the whole paragraph list; no stale paragraphs remain.
    pub fn replace_paragraphs(&mut self, paragraphs: Vec<Paragraph>) {
        self.dirty = true;
        self.paragraphs = paragraphs;
    }

    pub fn body(&self) -> &BodyProps {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut BodyProps {
        self.dirty = true;
        self.body_dirty = true;
        &mut self.body
    }

    /// Visible text, paragraphs joined with `\n`.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Serialise as a complete `txBody` element.
    pub(crate) fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push('<');
        out.push_str(&self.tag);
        out.push('>');
        match (&self.body_raw, self.body_dirty) {
            (Some(raw), false) => out.push_str(raw),
            _ => xml::write_body_props(&mut out, &self.body),
        }
        out.push_str(self.list_style_raw.as_deref().unwrap_or("<a:lstStyle/>"));
        if self.paragraphs.is_empty() {
            // txBody requires at least one paragraph.
            out.push_str("<a:p/>");
        }
        for p in &self.paragraphs {
            xml::write_paragraph(&mut out, p);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
        out
    }
}

// ── Tables ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TableCell {
    pub frame: TextFrame,
    pub col_span: u32,
    pub row_span: u32,
    /// Covered by a neighbouring merged cell.
    pub merged: bool,
}

impl TableCell {
    pub fn new(frame: TextFrame) -> Self {
        Self {
            frame,
            col_span: 1,
            row_span: 1,
            merged: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    rows: Vec<Vec<TableCell>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<TableCell>>) -> Self {
        Self { rows }
    }

    /// A detached table of plain-text cells.
    pub fn from_rows(rows: &[Vec<&str>]) -> Self {
        Self::new(
            rows.iter()
                .map(|r| r.iter().map(|t| TableCell::new(TextFrame::from_text(t))).collect())
                .collect(),
        )
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&TableCell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut TableCell> {
        self.rows.get_mut(row).and_then(|r| r.get_mut(col))
    }

    /// Text of a cell, `None` when the coordinates fall outside the grid.
    pub fn cell_text(&self, row: usize, col: usize) -> Option<String> {
        self.cell(row, col).map(|c| c.frame.text())
    }

    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, &TableCell)> {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, row)| row.iter().enumerate().map(move |(c, cell)| (r, c, cell)))
    }

    pub(crate) fn cells_mut(&mut self) -> impl Iterator<Item = &mut TableCell> {
        self.rows.iter_mut().flatten()
    }
}

// ── Pictures ─────────────────────────────────────────────────────────────

/// Encoded image bytes ready to be stored as a media part.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePart {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub content_type: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaRef {
    /// Relationship id of an image already in the package.
    Embedded(String),
    /// Inserted during this pass; written as a new media part on save.
    Pending(ImagePart),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub media: MediaRef,
    pub crop: Option<Crop>,
}

// ── Shapes ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ShapeKind {
    Text(TextFrame),
    Table(Table),
    Picture(Picture),
    Other,
}

#[derive(Debug, Clone)]
pub struct Shape {
    pub id: u32,
    pub name: String,
    /// `None` when geometry is inherited from the layout.
    pub rect: Option<Rect>,
    pub kind: ShapeKind,
    pub(crate) inserted: bool,
}

impl Shape {
    pub fn new(id: u32, name: impl Into<String>, rect: Option<Rect>, kind: ShapeKind) -> Self {
        Self {
            id,
            name: name.into(),
            rect,
            kind,
            inserted: false,
        }
    }

    pub fn has_text(&self) -> bool {
        matches!(self.kind, ShapeKind::Text(_))
    }

    pub fn has_table(&self) -> bool {
        matches!(self.kind, ShapeKind::Table(_))
    }

    pub fn has_picture(&self) -> bool {
        matches!(self.kind, ShapeKind::Picture(_))
    }

    pub fn text_frame(&self) -> Option<&TextFrame> {
        match &self.kind {
            ShapeKind::Text(f) => Some(f),
            _ => None,
        }
    }

    pub fn text_frame_mut(&mut self) -> Option<&mut TextFrame> {
        match &mut self.kind {
            ShapeKind::Text(f) => Some(f),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<&Table> {
        match &self.kind {
            ShapeKind::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn table_mut(&mut self) -> Option<&mut Table> {
        match &mut self.kind {
            ShapeKind::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn picture(&self) -> Option<&Picture> {
        match &self.kind {
            ShapeKind::Picture(p) => Some(p),
            _ => None,
        }
    }

    pub fn was_inserted(&self) -> bool {
        self.inserted
    }
}

// ── Slides ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Slide {
    pub(crate) part_name: String,
    pub(crate) xml: Option<String>,
    /// Offset of `</p:spTree>`, where inserted shapes are appended.
    pub(crate) tree_end: usize,
    shapes: Vec<Shape>,
}

impl Slide {
    /// A detached slide holding the given shapes.
    pub fn new(shapes: Vec<Shape>) -> Self {
        Self {
            shapes,
            ..Self::default()
        }
    }

    pub(crate) fn parsed(part_name: String, xml: String, tree_end: usize, shapes: Vec<Shape>) -> Self {
        Self {
            part_name,
            xml: Some(xml),
            tree_end,
            shapes,
        }
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shapes_mut(&mut self) -> &mut [Shape] {
        &mut self.shapes
    }

    pub fn shape(&self, index: usize) -> Option<&Shape> {
        self.shapes.get(index)
    }

    pub fn shape_mut(&mut self, index: usize) -> Option<&mut Shape> {
        self.shapes.get_mut(index)
    }

    /// Append a picture; returns its index in [`Slide::shapes`].
    pub fn add_picture(&mut self, image: ImagePart, rect: Rect, crop: Option<Crop>) -> usize {
        let id = self.shapes.iter().map(|s| s.id).max().unwrap_or(1) + 1;
        let mut shape = Shape::new(
            id,
            format!("Picture {id}"),
            Some(rect),
            ShapeKind::Picture(Picture {
                media: MediaRef::Pending(image),
                crop,
            }),
        );
        shape.inserted = true;
        self.shapes.push(shape);
        self.shapes.len() - 1
    }

    pub(crate) fn is_modified(&self) -> bool {
        self.shapes.iter().any(|s| {
            s.inserted
                || match &s.kind {
                    ShapeKind::Text(f) => f.is_dirty(),
                    ShapeKind::Table(t) => t.cells().any(|(_, _, c)| c.frame.is_dirty()),
                    _ => false,
                }
        })
    }
}

// ── Presentation ─────────────────────────────────────────────────────────

/// An opened deck. Each generation pass owns its own instance.
#[derive(Debug, Clone)]
pub struct Presentation {
    slides: Vec<Slide>,
    slide_size: (i64, i64),
    pub(crate) package: Option<Package>,
}

impl Presentation {
    /// A detached presentation with no backing package.
    pub fn from_slides(slides: Vec<Slide>) -> Self {
        Self {
            slides,
            slide_size: DEFAULT_SLIDE_SIZE,
            package: None,
        }
    }

    pub(crate) fn with_package(slides: Vec<Slide>, slide_size: (i64, i64), package: Package) -> Self {
        Self {
            slides,
            slide_size,
            package: Some(package),
        }
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slides_mut(&mut self) -> &mut [Slide] {
        &mut self.slides
    }

    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    pub fn slide_mut(&mut self, index: usize) -> Option<&mut Slide> {
        self.slides.get_mut(index)
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Slide width and height in EMU.
    pub fn slide_size(&self) -> (i64, i64) {
        self.slide_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_parses_hex() {
        assert_eq!("1F3864".parse::<Rgb>().unwrap(), Rgb(0x1F, 0x38, 0x64));
        assert_eq!("#ff0000".parse::<Rgb>().unwrap(), Rgb(255, 0, 0));
        assert!("red".parse::<Rgb>().is_err());
    }

    #[test]
    fn crop_validation() {
        assert!(Crop { left: 0.1, right: 0.2, ..Crop::default() }.is_valid());
        assert!(!Crop { left: 0.6, right: 0.5, ..Crop::default() }.is_valid());
        assert!(!Crop { top: -0.1, ..Crop::default() }.is_valid());
    }

    #[test]
    fn inches_convert_to_emu() {
        let r = Rect::from_inches(1.0, 0.5, 4.8, 2.2);
        assert_eq!(r.left, 914_400);
        assert_eq!(r.top, 457_200);
        assert_eq!(r.width, 4_389_120);
        assert_eq!(r.height, 2_011_680);
    }

    #[test]
    fn mutating_runs_drops_raw_markup() {
        let mut p = Paragraph::parsed(vec![Run::plain("x")], None, "<a:p/>".into());
        assert!(p.raw().is_some());
        p.runs_mut().push(Run::plain("y"));
        assert!(p.raw().is_none());
        assert_eq!(p.text(), "xy");
    }

    #[test]
    fn table_lookups_are_optional() {
        let t = Table::from_rows(&[vec!["a", "b"], vec!["c"]]);
        assert_eq!(t.cell_text(0, 1).as_deref(), Some("b"));
        assert_eq!(t.cell_text(1, 1), None);
        assert_eq!(t.column_count(), 2);
    }

    #[test]
    fn added_picture_gets_next_id() {
        let mut slide = Slide::new(vec![Shape::new(4, "Title", None, ShapeKind::Other)]);
        let image = ImagePart {
            bytes: vec![1, 2, 3],
            extension: "png",
            content_type: "image/png",
        };
        let idx = slide.add_picture(image, Rect::default(), None);
        let shape = slide.shape(idx).unwrap();
        assert_eq!(shape.id, 5);
        assert!(shape.has_picture());
        assert!(shape.was_inserted());
    }
}
