//! Minimal XML element tree with byte spans, plus DrawingML writers.
//!
//! Slides are parsed once into [`Element`] trees that remember where each
//! element starts and ends in the source text. Saving splices freshly
//! serialised fragments into those spans and copies everything else
//! verbatim, so markup this crate does not model (animations, extension
//! lists, custom geometry) survives a round trip untouched.

use crate::deck::{Alignment, Anchor, AutoFit, BodyProps, Crop, Paragraph, Rect, Run};
use crate::error::DeckError;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Write as _;
use std::ops::Range;

/// One parsed element: qualified name, attributes, children and spans.
#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// From `<` of the start tag to `>` of the end tag.
    pub span: Range<usize>,
    /// Content between the start and end tag (empty for `<x/>`).
    pub inner: Range<usize>,
}

/// Strip the namespace prefix from a qualified name.
pub(crate) fn local_name(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

impl Element {
    fn open(e: &BytesStart<'_>, span: Range<usize>, part: &str) -> Result<Self, DeckError> {
        let name = std::str::from_utf8(e.name().as_ref())
            .map_err(|err| DeckError::malformed(part, err))?
            .to_string();
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| DeckError::malformed(part, err))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|err| DeckError::malformed(part, err))?;
            let raw = std::str::from_utf8(&attr.value).map_err(|err| DeckError::malformed(part, err))?;
            let value = unescape(raw).map_err(|err| DeckError::malformed(part, err))?;
            attrs.push((key.to_string(), value.into_owned()));
        }
        let end = span.end;
        Ok(Self {
            name,
            attrs,
            children: Vec::new(),
            span,
            inner: end..end,
        })
    }

    pub fn local(&self) -> &str {
        local_name(&self.name)
    }

    /// Attribute by qualified name, falling back to its local part.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .or_else(|| self.attrs.iter().find(|(k, _)| local_name(k) == key))
            .map(|(_, v)| v.as_str())
    }

    pub fn attr_i64(&self, key: &str) -> Option<i64> {
        self.attr(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn child(&self, local: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.local() == local)
    }

    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.local() == local)
    }

    /// Depth-first search for the first descendant with this local name.
    pub fn descendant(&self, local: &str) -> Option<&Element> {
        for c in &self.children {
            if c.local() == local {
                return Some(c);
            }
            if let Some(found) = c.descendant(local) {
                return Some(found);
            }
        }
        None
    }

    /// The element's source text.
    pub fn source<'s>(&self, xml: &'s str) -> &'s str {
        &xml[self.span.clone()]
    }

    /// Unescaped text content (used for `a:t`).
    pub fn text(&self, xml: &str) -> String {
        let raw = &xml[self.inner.clone()];
        match unescape(raw) {
            Ok(s) => s.into_owned(),
            Err(_) => raw.to_string(),
        }
    }
}

/// Parse an XML part into its root element.
pub(crate) fn parse_tree(xml: &str, part: &str) -> Result<Element, DeckError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| DeckError::malformed(part, e))?;
        let end = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => stack.push(Element::open(&e, start..end, part)?),
            Event::Empty(e) => {
                let el = Element::open(&e, start..end, part)?;
                attach(&mut stack, &mut root, el);
            }
            Event::End(_) => {
                let mut el = stack
                    .pop()
                    .ok_or_else(|| DeckError::malformed(part, "unbalanced end tag"))?;
                el.inner = el.inner.start..start;
                el.span = el.span.start..end;
                attach(&mut stack, &mut root, el);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DeckError::malformed(part, "unclosed element at end of part"));
    }
    root.ok_or_else(|| DeckError::malformed(part, "part has no root element"))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => *root = Some(el),
    }
}

// ── Writers ──────────────────────────────────────────────────────────────

pub(crate) fn write_body_props(out: &mut String, body: &BodyProps) {
    out.push_str("<a:bodyPr");
    if let Some(wrap) = body.word_wrap {
        out.push_str(if wrap { " wrap=\"square\"" } else { " wrap=\"none\"" });
    }
    if let Some(ins) = body.insets {
        let _ = write!(
            out,
            " lIns=\"{}\" tIns=\"{}\" rIns=\"{}\" bIns=\"{}\"",
            ins.left, ins.top, ins.right, ins.bottom
        );
    }
    if let Some(anchor) = body.anchor {
        let _ = write!(out, " anchor=\"{}\"", anchor.as_attr());
    }
    match body.autofit {
        Some(AutoFit::Shrink) => out.push_str("><a:normAutofit/></a:bodyPr>"),
        Some(AutoFit::Resize) => out.push_str("><a:spAutoFit/></a:bodyPr>"),
        Some(AutoFit::Off) => out.push_str("><a:noAutofit/></a:bodyPr>"),
        None => out.push_str("/>"),
    }
}

pub(crate) fn write_paragraph(out: &mut String, p: &Paragraph) {
    if let Some(raw) = p.raw() {
        out.push_str(raw);
        return;
    }
    out.push_str("<a:p>");
    if let Some(align) = p.alignment() {
        let _ = write!(out, "<a:pPr algn=\"{}\"/>", align.as_attr());
    }
    for run in p.runs() {
        write_run(out, run);
    }
    out.push_str("</a:p>");
}

fn write_run(out: &mut String, run: &Run) {
    let f = &run.font;
    out.push_str("<a:r><a:rPr lang=\"en-US\"");
    if let Some(size) = f.size_pt {
        let _ = write!(out, " sz=\"{}\"", (size * 100.0).round() as i64);
    }
    if let Some(b) = f.bold {
        out.push_str(if b { " b=\"1\"" } else { " b=\"0\"" });
    }
    if let Some(i) = f.italic {
        out.push_str(if i { " i=\"1\"" } else { " i=\"0\"" });
    }
    out.push_str(" dirty=\"0\"");
    if f.color.is_none() && f.typeface.is_none() {
        out.push_str("/>");
    } else {
        out.push('>');
        if let Some(color) = f.color {
            let _ = write!(
                out,
                "<a:solidFill><a:srgbClr val=\"{}\"/></a:solidFill>",
                color.to_hex()
            );
        }
        if let Some(face) = &f.typeface {
            let _ = write!(out, "<a:latin typeface=\"{}\"/>", escape(face.as_str()));
        }
        out.push_str("</a:rPr>");
    }
    let _ = write!(out, "<a:t>{}</a:t></a:r>", escape(run.text.as_str()));
}

/// Serialise a newly inserted picture shape.
pub(crate) fn write_picture(
    out: &mut String,
    id: u32,
    name: &str,
    rel_id: &str,
    rect: Rect,
    crop: Option<Crop>,
) {
    let _ = write!(
        out,
        "<p:pic><p:nvPicPr><p:cNvPr id=\"{id}\" name=\"{}\"/>\
<p:cNvPicPr><a:picLocks noChangeAspect=\"1\"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>\
<p:blipFill><a:blip r:embed=\"{}\"/>",
        escape(name),
        escape(rel_id)
    );
    if let Some(c) = crop {
        let _ = write!(
            out,
            "<a:srcRect l=\"{}\" t=\"{}\" r=\"{}\" b=\"{}\"/>",
            Crop::to_attr(c.left),
            Crop::to_attr(c.top),
            Crop::to_attr(c.right),
            Crop::to_attr(c.bottom)
        );
    }
    let _ = write!(
        out,
        "<a:stretch><a:fillRect/></a:stretch></p:blipFill>\
<p:spPr><a:xfrm><a:off x=\"{}\" y=\"{}\"/><a:ext cx=\"{}\" cy=\"{}\"/></a:xfrm>\
<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr></p:pic>",
        rect.left, rect.top, rect.width, rect.height
    );
}

pub(crate) fn parse_alignment(p_pr: Option<&Element>) -> Option<Alignment> {
    p_pr.and_then(|p| p.attr("algn")).and_then(Alignment::from_attr)
}

pub(crate) fn parse_anchor(body: &Element) -> Option<Anchor> {
    body.attr("anchor").and_then(Anchor::from_attr)
}
