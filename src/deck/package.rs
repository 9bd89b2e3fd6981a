//! `.pptx` package I/O: open an OPC zip, parse slides, splice edits on save.

use super::xml::{self, parse_tree, Element};
use super::{
    AutoFit, BodyProps, Crop, Font, ImagePart, Insets, MediaRef, Paragraph, Picture,
    Presentation, Rect, Run, Shape, ShapeKind, Slide, Table, TableCell, TextFrame, TextSite,
    DEFAULT_SLIDE_SIZE,
};
use crate::error::DeckError;
use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";
const CONTENT_TYPES: &str = "[Content_Types].xml";
const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const EMPTY_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\"></Relationships>";

/// Every part of the source package, in archive order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    fn read(bytes: &[u8]) -> Result<Self, DeckError> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| DeckError::malformed("zip", e))?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| DeckError::malformed("zip", e))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| DeckError::malformed(name.as_str(), e))?;
            parts.push((name, data));
        }
        Ok(Self { parts })
    }

    fn get(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }

    fn text(&self, name: &str) -> Result<Option<String>, DeckError> {
        match self.get(name) {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| DeckError::malformed(name, e)),
            None => Ok(None),
        }
    }

    fn require_text(&self, name: &str) -> Result<String, DeckError> {
        self.text(name)?.ok_or_else(|| DeckError::MissingPart {
            part: name.to_string(),
        })
    }
}

// ── Opening ──────────────────────────────────────────────────────────────

impl Presentation {
    /// Open a `.pptx` file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeckError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DeckError::TemplateNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => DeckError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => DeckError::Internal(format!("reading {}: {e}", path.display())),
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parse a `.pptx` package held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeckError> {
        let package = Package::read(bytes)?;

        let pres_xml = package.require_text(PRESENTATION_PART)?;
        let pres = parse_tree(&pres_xml, PRESENTATION_PART)?;
        let slide_size = pres
            .child("sldSz")
            .and_then(|s| Some((s.attr_i64("cx")?, s.attr_i64("cy")?)))
            .unwrap_or(DEFAULT_SLIDE_SIZE);

        let rels_xml = package.require_text(PRESENTATION_RELS)?;
        let targets = relationship_targets(&rels_xml, PRESENTATION_RELS)?;

        let mut slides = Vec::new();
        if let Some(list) = pres.child("sldIdLst") {
            for sld in list.children_named("sldId") {
                let rid = sld.attr("r:id").ok_or_else(|| {
                    DeckError::malformed(PRESENTATION_PART, "sldId without r:id")
                })?;
                let target = targets.get(rid).ok_or_else(|| {
                    DeckError::malformed(PRESENTATION_RELS, format!("no relationship '{rid}'"))
                })?;
                let part_name = resolve_target("ppt", target);
                let slide_xml = package.require_text(&part_name)?;
                slides.push(parse_slide(part_name, slide_xml)?);
            }
        }
        debug!("Opened presentation with {} slides", slides.len());

        Ok(Presentation::with_package(slides, slide_size, package))
    }
}

fn relationship_targets(xml: &str, part: &str) -> Result<BTreeMap<String, String>, DeckError> {
    let root = parse_tree(xml, part)?;
    Ok(root
        .children_named("Relationship")
        .filter_map(|r| Some((r.attr("Id")?.to_string(), r.attr("Target")?.to_string())))
        .collect())
}

/// Resolve a relationship target against the source part's directory.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

fn rels_part_for(part_name: &str) -> String {
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_name}.rels"),
    }
}

// ── Slide parsing ────────────────────────────────────────────────────────

/// Maps child-space coordinates of a group into slide space.
#[derive(Debug, Clone, Copy)]
struct GroupTransform {
    off: (i64, i64),
    ch_off: (i64, i64),
    scale: (f64, f64),
}

impl GroupTransform {
    /// Nest `inner` (a group inside this one).
    fn compose(self, inner: GroupTransform) -> GroupTransform {
        let origin = self.apply(Rect {
            left: inner.off.0,
            top: inner.off.1,
            ..Rect::default()
        });
        GroupTransform {
            off: (origin.left, origin.top),
            ch_off: inner.ch_off,
            scale: (inner.scale.0 * self.scale.0, inner.scale.1 * self.scale.1),
        }
    }

    fn apply(&self, r: Rect) -> Rect {
        Rect {
            left: self.off.0 + ((r.left - self.ch_off.0) as f64 * self.scale.0).round() as i64,
            top: self.off.1 + ((r.top - self.ch_off.1) as f64 * self.scale.1).round() as i64,
            width: (r.width as f64 * self.scale.0).round() as i64,
            height: (r.height as f64 * self.scale.1).round() as i64,
        }
    }
}

fn parse_slide(part_name: String, slide_xml: String) -> Result<Slide, DeckError> {
    let root = parse_tree(&slide_xml, &part_name)?;
    let tree = root
        .child("cSld")
        .and_then(|c| c.child("spTree"))
        .ok_or_else(|| DeckError::malformed(part_name.as_str(), "slide has no spTree"))?;

    let mut shapes = Vec::new();
    collect_shapes(tree, &slide_xml, None, &mut shapes);
    let tree_end = tree.inner.end;

    Ok(Slide::parsed(part_name, slide_xml, tree_end, shapes))
}

fn collect_shapes(
    tree: &Element,
    src: &str,
    transform: Option<GroupTransform>,
    out: &mut Vec<Shape>,
) {
    for el in &tree.children {
        let kind = match el.local() {
            "sp" => match el.child("txBody") {
                Some(body) => ShapeKind::Text(parse_text_frame(body, src)),
                None => ShapeKind::Other,
            },
            "graphicFrame" => match el.descendant("tbl") {
                Some(tbl) => ShapeKind::Table(parse_table(tbl, src)),
                None => ShapeKind::Other,
            },
            "pic" => parse_picture(el).map_or(ShapeKind::Other, ShapeKind::Picture),
            "grpSp" => {
                let group = el.child("grpSpPr").and_then(|p| p.child("xfrm"));
                let inner = group.and_then(group_transform);
                let combined = match (transform, inner) {
                    (Some(outer), Some(inner)) => Some(outer.compose(inner)),
                    (outer, inner) => inner.or(outer),
                };
                collect_shapes(el, src, combined, out);
                continue;
            }
            "cxnSp" | "contentPart" => ShapeKind::Other,
            _ => continue,
        };

        let c_nv_pr = el.descendant("cNvPr");
        let id = c_nv_pr
            .and_then(|c| c.attr("id"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let name = c_nv_pr
            .and_then(|c| c.attr("name"))
            .unwrap_or_default()
            .to_string();
        let xfrm = el
            .child("spPr")
            .and_then(|p| p.child("xfrm"))
            .or_else(|| el.child("xfrm"));
        let rect = xfrm
            .and_then(parse_xfrm)
            .map(|r| transform.map_or(r, |t| t.apply(r)));

        out.push(Shape::new(id, name, rect, kind));
    }
}

fn parse_xfrm(xfrm: &Element) -> Option<Rect> {
    let off = xfrm.child("off")?;
    let ext = xfrm.child("ext")?;
    Some(Rect {
        left: off.attr_i64("x")?,
        top: off.attr_i64("y")?,
        width: ext.attr_i64("cx")?,
        height: ext.attr_i64("cy")?,
    })
}

fn group_transform(xfrm: &Element) -> Option<GroupTransform> {
    let outer = parse_xfrm(xfrm)?;
    let ch_off = xfrm.child("chOff")?;
    let ch_ext = xfrm.child("chExt")?;
    let (cx, cy) = (ch_ext.attr_i64("cx")?, ch_ext.attr_i64("cy")?);
    let scale = |ext: i64, ch: i64| if ch == 0 { 1.0 } else { ext as f64 / ch as f64 };
    Some(GroupTransform {
        off: (outer.left, outer.top),
        ch_off: (ch_off.attr_i64("x")?, ch_off.attr_i64("y")?),
        scale: (scale(outer.width, cx), scale(outer.height, cy)),
    })
}

fn parse_text_frame(body: &Element, src: &str) -> TextFrame {
    let body_pr = body.child("bodyPr");
    let props = body_pr.map(parse_body_props).unwrap_or_default();
    let paragraphs = body
        .children_named("p")
        .map(|p| parse_paragraph(p, src))
        .collect();
    TextFrame::parsed(
        paragraphs,
        props,
        TextSite::Body(body.span.clone()),
        body.name.clone(),
        body_pr.map(|b| b.source(src).to_string()),
        body.child("lstStyle").map(|l| l.source(src).to_string()),
    )
}

fn parse_body_props(body_pr: &Element) -> BodyProps {
    let insets = ["lIns", "tIns", "rIns", "bIns"]
        .iter()
        .any(|k| body_pr.attr(k).is_some())
        .then(|| Insets {
            left: body_pr.attr_i64("lIns").unwrap_or(91_440),
            top: body_pr.attr_i64("tIns").unwrap_or(45_720),
            right: body_pr.attr_i64("rIns").unwrap_or(91_440),
            bottom: body_pr.attr_i64("bIns").unwrap_or(45_720),
        });
    let autofit = if body_pr.child("normAutofit").is_some() {
        Some(AutoFit::Shrink)
    } else if body_pr.child("spAutoFit").is_some() {
        Some(AutoFit::Resize)
    } else if body_pr.child("noAutofit").is_some() {
        Some(AutoFit::Off)
    } else {
        None
    };
    BodyProps {
        word_wrap: body_pr.attr("wrap").map(|w| w != "none"),
        insets,
        anchor: xml::parse_anchor(body_pr),
        autofit,
    }
}

fn parse_paragraph(p: &Element, src: &str) -> Paragraph {
    let runs = p
        .children
        .iter()
        .filter(|c| matches!(c.local(), "r" | "fld"))
        .map(|r| Run {
            text: r.child("t").map(|t| t.text(src)).unwrap_or_default(),
            font: r.child("rPr").map(parse_font).unwrap_or_default(),
        })
        .collect();
    Paragraph::parsed(
        runs,
        xml::parse_alignment(p.child("pPr")),
        p.source(src).to_string(),
    )
}

fn parse_font(r_pr: &Element) -> Font {
    let flag = |k: &str| r_pr.attr(k).map(|v| v == "1" || v == "true");
    Font {
        size_pt: r_pr.attr_i64("sz").map(|sz| sz as f32 / 100.0),
        bold: flag("b"),
        italic: flag("i"),
        color: r_pr
            .child("solidFill")
            .and_then(|f| f.child("srgbClr"))
            .and_then(|c| c.attr("val"))
            .and_then(|v| v.parse().ok()),
        typeface: r_pr
            .child("latin")
            .and_then(|l| l.attr("typeface"))
            .map(str::to_string),
    }
}

fn parse_table(tbl: &Element, src: &str) -> Table {
    let rows = tbl
        .children_named("tr")
        .map(|tr| {
            tr.children_named("tc")
                .map(|tc| {
                    let frame = match tc.child("txBody") {
                        Some(body) => parse_text_frame(body, src),
                        None => {
                            let mut f = TextFrame::new(Vec::new());
                            // Self-closing cells have nowhere to write a body.
                            if tc.inner.start != tc.span.end {
                                f.site = Some(TextSite::InsertAt(tc.inner.start));
                            }
                            f.tag = "a:txBody".to_string();
                            f
                        }
                    };
                    let flag = |k: &str| tc.attr(k).is_some_and(|v| v == "1" || v == "true");
                    TableCell {
                        frame,
                        col_span: tc.attr_i64("gridSpan").unwrap_or(1).max(1) as u32,
                        row_span: tc.attr_i64("rowSpan").unwrap_or(1).max(1) as u32,
                        merged: flag("hMerge") || flag("vMerge"),
                    }
                })
                .collect()
        })
        .collect();
    Table::new(rows)
}

fn parse_picture(pic: &Element) -> Option<Picture> {
    let fill = pic.child("blipFill")?;
    let rid = fill.child("blip").and_then(|b| b.attr("r:embed"))?;
    let crop = fill.child("srcRect").map(|s| Crop {
        left: Crop::from_attr(s.attr_i64("l")),
        top: Crop::from_attr(s.attr_i64("t")),
        right: Crop::from_attr(s.attr_i64("r")),
        bottom: Crop::from_attr(s.attr_i64("b")),
    });
    Some(Picture {
        media: MediaRef::Embedded(rid.to_string()),
        crop,
    })
}

// ── Saving ───────────────────────────────────────────────────────────────

/// Media parts and relationships produced while saving one deck.
struct MediaPlan {
    taken: HashSet<String>,
    next_index: usize,
    added: Vec<(String, Vec<u8>)>,
    extensions: BTreeMap<&'static str, &'static str>,
}

impl MediaPlan {
    fn new(package: &Package) -> Self {
        Self {
            taken: package.parts.iter().map(|(n, _)| n.clone()).collect(),
            next_index: 1,
            added: Vec::new(),
            extensions: BTreeMap::new(),
        }
    }

    /// Reserve a fresh `ppt/media/imageN.ext` name for `image`.
    fn add(&mut self, image: &ImagePart) -> String {
        loop {
            let name = format!("ppt/media/image{}.{}", self.next_index, image.extension);
            self.next_index += 1;
            if self.taken.insert(name.clone()) {
                self.added.push((name.clone(), image.bytes.clone()));
                self.extensions.insert(image.extension, image.content_type);
                return name;
            }
        }
    }
}

impl Presentation {
    /// Serialise the deck back into `.pptx` bytes.
    ///
    /// Only slides that were modified are rewritten; every other part is
    /// copied byte-for-byte. Calling this twice yields identical output.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DeckError> {
        let package = self.package.as_ref().ok_or_else(|| DeckError::MissingPart {
            part: CONTENT_TYPES.to_string(),
        })?;

        let mut replaced: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        let mut media = MediaPlan::new(package);

        for slide in self.slides() {
            if !slide.is_modified() {
                continue;
            }
            let Some(src) = slide.xml.as_deref() else {
                continue;
            };
            let rels_name = rels_part_for(&slide.part_name);
            let mut rels = match package.text(&rels_name)? {
                Some(r) => r,
                None => EMPTY_RELS.to_string(),
            };
            let (slide_xml, rels_changed) = render_slide(slide, src, &mut rels, &rels_name, &mut media)?;
            replaced.insert(slide.part_name.clone(), slide_xml.into_bytes());
            if rels_changed {
                replaced.insert(rels_name, rels.into_bytes());
            }
        }

        if !media.extensions.is_empty() {
            let mut types = package.require_text(CONTENT_TYPES)?;
            for (ext, content_type) in &media.extensions {
                ensure_default_content_type(&mut types, ext, content_type)?;
            }
            replaced.insert(CONTENT_TYPES.to_string(), types.into_bytes());
        }

        write_zip(package, &replaced, &media.added)
    }

    /// Write the deck to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DeckError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| DeckError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Apply text edits and picture insertions to one slide's markup.
fn render_slide(
    slide: &Slide,
    src: &str,
    rels: &mut String,
    rels_name: &str,
    media: &mut MediaPlan,
) -> Result<(String, bool), DeckError> {
    let mut edits: Vec<(std::ops::Range<usize>, String)> = Vec::new();
    let mut appended = String::new();
    let mut rels_changed = false;

    for shape in slide.shapes() {
        match &shape.kind {
            ShapeKind::Text(frame) => push_frame_edit(frame, &mut edits),
            ShapeKind::Table(table) => {
                for (_, _, cell) in table.cells() {
                    push_frame_edit(&cell.frame, &mut edits);
                }
            }
            ShapeKind::Picture(pic) if shape.inserted => {
                let MediaRef::Pending(image) = &pic.media else {
                    continue;
                };
                let Some(rect) = shape.rect else {
                    continue;
                };
                let media_name = media.add(image);
                let rel_id = add_image_relationship(rels, rels_name, &media_name)?;
                rels_changed = true;
                xml::write_picture(&mut appended, shape.id, &shape.name, &rel_id, rect, pic.crop);
            }
            _ => {}
        }
    }

    if !appended.is_empty() {
        edits.push((slide.tree_end..slide.tree_end, appended));
    }

    // Apply back to front so earlier offsets stay valid.
    edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    let mut out = src.to_string();
    for (range, text) in edits {
        out.replace_range(range, &text);
    }
    Ok((out, rels_changed))
}

fn push_frame_edit(frame: &TextFrame, edits: &mut Vec<(std::ops::Range<usize>, String)>) {
    if !frame.is_dirty() {
        return;
    }
    match &frame.site {
        Some(TextSite::Body(range)) => edits.push((range.clone(), frame.to_xml())),
        Some(TextSite::InsertAt(at)) => edits.push((*at..*at, frame.to_xml())),
        None => debug!("Skipping detached text frame on save"),
    }
}

/// Add an image relationship and return its id.
fn add_image_relationship(rels: &mut String, rels_name: &str, media_name: &str) -> Result<String, DeckError> {
    let root = parse_tree(rels, rels_name)?;
    let next = root
        .children_named("Relationship")
        .filter_map(|r| r.attr("Id"))
        .filter_map(|id| id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
        .max()
        .unwrap_or(0)
        + 1;
    let rel_id = format!("rId{next}");
    let target = media_name
        .strip_prefix("ppt/")
        .map(|m| format!("../{m}"))
        .unwrap_or_else(|| format!("/{media_name}"));
    let entry = format!("<Relationship Id=\"{rel_id}\" Type=\"{IMAGE_REL_TYPE}\" Target=\"{target}\"/>");

    if root.inner.start == root.span.end {
        // `<Relationships .../>` with no children.
        let open = rels[root.span.clone()].trim_end_matches("/>").to_string();
        rels.replace_range(root.span.clone(), &format!("{open}>{entry}</Relationships>"));
    } else {
        rels.insert_str(root.inner.end, &entry);
    }
    Ok(rel_id)
}

fn ensure_default_content_type(types: &mut String, ext: &str, content_type: &str) -> Result<(), DeckError> {
    let root = parse_tree(types, CONTENT_TYPES)?;
    let present = root
        .children_named("Default")
        .filter_map(|d| d.attr("Extension"))
        .any(|e| e.eq_ignore_ascii_case(ext));
    if !present {
        let entry = format!("<Default Extension=\"{ext}\" ContentType=\"{content_type}\"/>");
        types.insert_str(root.inner.end, &entry);
    }
    Ok(())
}

fn write_zip(
    package: &Package,
    replaced: &BTreeMap<String, Vec<u8>>,
    added: &[(String, Vec<u8>)],
) -> Result<Vec<u8>, DeckError> {
    let zip_err = |e: zip::result::ZipError| DeckError::Internal(format!("zip write: {e}"));
    let io_err = |e: std::io::Error| DeckError::Internal(format!("zip write: {e}"));

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, data) in &package.parts {
        let data = replaced.get(name).unwrap_or(data);
        let opts = if name.starts_with("ppt/media/") { stored } else { deflated };
        zip.start_file(name.as_str(), opts).map_err(zip_err)?;
        zip.write_all(data).map_err(io_err)?;
    }
    for (name, data) in added {
        zip.start_file(name.as_str(), stored).map_err(zip_err)?;
        zip.write_all(data).map_err(io_err)?;
    }

    Ok(zip.finish().map_err(zip_err)?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_targets() {
        assert_eq!(resolve_target("ppt", "slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(resolve_target("ppt/slides", "../media/image1.png"), "ppt/media/image1.png");
        assert_eq!(resolve_target("ppt", "/ppt/slides/slide2.xml"), "ppt/slides/slide2.xml");
    }

    #[test]
    fn rels_part_name() {
        assert_eq!(
            rels_part_for("ppt/slides/slide3.xml"),
            "ppt/slides/_rels/slide3.xml.rels"
        );
    }

    #[test]
    fn image_relationship_gets_next_id() {
        let mut rels = String::from(
            "<Relationships xmlns=\"x\"><Relationship Id=\"rId1\" Type=\"t\" Target=\"../slideLayouts/slideLayout1.xml\"/>\
<Relationship Id=\"rId4\" Type=\"t\" Target=\"x\"/></Relationships>",
        );
        let id = add_image_relationship(&mut rels, "r", "ppt/media/image2.png").unwrap();
        assert_eq!(id, "rId5");
        assert!(rels.contains("Target=\"../media/image2.png\""));
        assert!(rels.ends_with("</Relationships>"));
    }

    #[test]
    fn empty_relationships_element_is_expanded() {
        let mut rels = String::from("<Relationships xmlns=\"x\"/>");
        let id = add_image_relationship(&mut rels, "r", "ppt/media/image1.jpeg").unwrap();
        assert_eq!(id, "rId1");
        assert!(rels.starts_with("<Relationships xmlns=\"x\"><Relationship Id=\"rId1\""));
    }

    #[test]
    fn content_type_added_once() {
        let mut types = String::from("<Types xmlns=\"x\"><Default Extension=\"PNG\" ContentType=\"image/png\"/></Types>");
        ensure_default_content_type(&mut types, "png", "image/png").unwrap();
        assert_eq!(types.matches("Extension=").count(), 1);
        ensure_default_content_type(&mut types, "jpeg", "image/jpeg").unwrap();
        assert!(types.contains("Extension=\"jpeg\""));
    }

    #[test]
    fn group_children_map_to_slide_space() {
        let t = GroupTransform {
            off: (1000, 2000),
            ch_off: (0, 0),
            scale: (2.0, 0.5),
        };
        let r = t.apply(Rect { left: 10, top: 10, width: 100, height: 100 });
        assert_eq!(r, Rect { left: 1020, top: 2005, width: 200, height: 50 });
    }
}
