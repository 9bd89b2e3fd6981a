//! In-memory `.pptx` fixtures for integration tests.
//!
//! Builds just enough of an OPC package for the reader: content types,
//! package relationships, `presentation.xml` with its slide list, and one
//! part per slide. Shapes carry an explicit `xfrm` so token placement has a
//! rectangle to work with.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const NS: &str = "xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" \
xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\"";

const EMU_PER_INCH: i64 = 914_400;

/// Position and size in inches.
#[derive(Debug, Clone, Copy)]
pub struct Box4(pub f64, pub f64, pub f64, pub f64);

impl Box4 {
    fn xfrm(self, prefix: &str) -> String {
        let emu = |v: f64| (v * EMU_PER_INCH as f64).round() as i64;
        format!(
            "<{prefix}:xfrm><a:off x=\"{}\" y=\"{}\"/><a:ext cx=\"{}\" cy=\"{}\"/></{prefix}:xfrm>",
            emu(self.0),
            emu(self.1),
            emu(self.2),
            emu(self.3)
        )
    }
}

#[derive(Debug, Default)]
pub struct DeckBuilder {
    slides: Vec<Vec<String>>,
    next_id: u32,
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self {
            slides: Vec::new(),
            next_id: 2,
        }
    }

    /// Start a new slide; following shapes go on it.
    pub fn slide(mut self) -> Self {
        self.slides.push(Vec::new());
        self
    }

    /// A text box whose single paragraph is `text`.
    pub fn text(mut self, name: &str, text: &str, at: Box4) -> Self {
        let id = self.id();
        let shape = format!(
            "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"{name}\"/><p:cNvSpPr txBox=\"1\"/><p:nvPr/></p:nvSpPr>\
<p:spPr>{}<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr>\
<p:txBody><a:bodyPr wrap=\"square\"/><a:lstStyle/>{}</p:txBody></p:sp>",
            at.xfrm("a"),
            paragraph(text)
        );
        self.push(shape);
        self
    }

    /// A `rows × cols` table with `corner` in the top-left cell and empty
    /// cells elsewhere.
    pub fn table(mut self, name: &str, rows: usize, cols: usize, corner: &str, at: Box4) -> Self {
        let id = self.id();
        let col_w = (at.2 * EMU_PER_INCH as f64 / cols as f64).round() as i64;
        let row_h = (at.3 * EMU_PER_INCH as f64 / rows as f64).round() as i64;
        let grid: String = (0..cols).map(|_| format!("<a:gridCol w=\"{col_w}\"/>")).collect();
        let body: String = (0..rows)
            .map(|r| {
                let cells: String = (0..cols)
                    .map(|c| {
                        let text = if r == 0 && c == 0 { corner } else { "" };
                        format!(
                            "<a:tc><a:txBody><a:bodyPr/><a:lstStyle/>{}</a:txBody><a:tcPr/></a:tc>",
                            paragraph(text)
                        )
                    })
                    .collect();
                format!("<a:tr h=\"{row_h}\">{cells}</a:tr>")
            })
            .collect();
        let shape = format!(
            "<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id=\"{id}\" name=\"{name}\"/>\
<p:cNvGraphicFramePr><a:graphicFrameLocks noGrp=\"1\"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr>\
{}<a:graphic><a:graphicData uri=\"http://schemas.openxmlformats.org/drawingml/2006/table\">\
<a:tbl><a:tblPr firstRow=\"1\"/><a:tblGrid>{grid}</a:tblGrid>{body}</a:tbl>\
</a:graphicData></a:graphic></p:graphicFrame>",
            at.xfrm("p")
        );
        self.push(shape);
        self
    }

    fn id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn push(&mut self, shape: String) {
        if self.slides.is_empty() {
            self.slides.push(Vec::new());
        }
        if let Some(slide) = self.slides.last_mut() {
            slide.push(shape);
        }
    }

    /// Serialise the package.
    pub fn build(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        let mut put = |name: &str, body: &str| {
            zip.start_file(name, opts).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        };

        let overrides: String = (1..=self.slides.len())
            .map(|n| {
                format!(
                    "<Override PartName=\"/ppt/slides/slide{n}.xml\" \
ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>"
                )
            })
            .collect();
        put(
            "[Content_Types].xml",
            &format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/ppt/presentation.xml\" \
ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>\
{overrides}</Types>"
            ),
        );
        put(
            "_rels/.rels",
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" \
Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" \
Target=\"ppt/presentation.xml\"/></Relationships>",
        );

        let ids: String = (1..=self.slides.len())
            .map(|n| format!("<p:sldId id=\"{}\" r:id=\"rId{n}\"/>", 255 + n))
            .collect();
        put(
            "ppt/presentation.xml",
            &format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<p:presentation {NS}><p:sldIdLst>{ids}</p:sldIdLst>\
<p:sldSz cx=\"9144000\" cy=\"5143500\"/><p:notesSz cx=\"5143500\" cy=\"9144000\"/></p:presentation>"
            ),
        );
        let rels: String = (1..=self.slides.len())
            .map(|n| {
                format!(
                    "<Relationship Id=\"rId{n}\" \
Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide\" \
Target=\"slides/slide{n}.xml\"/>"
                )
            })
            .collect();
        put(
            "ppt/_rels/presentation.xml.rels",
            &format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{rels}</Relationships>"
            ),
        );

        for (i, shapes) in self.slides.iter().enumerate() {
            put(
                &format!("ppt/slides/slide{}.xml", i + 1),
                &format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<p:sld {NS}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
<p:grpSpPr/>{}</p:spTree></p:cSld></p:sld>",
                    shapes.concat()
                ),
            );
        }

        zip.finish().unwrap().into_inner()
    }

    /// Write the package to `dir/name` and return its path.
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

fn paragraph(text: &str) -> String {
    if text.is_empty() {
        return "<a:p><a:endParaRPr lang=\"en-US\"/></a:p>".to_string();
    }
    format!("<a:p><a:r><a:rPr lang=\"en-US\" sz=\"1200\"/><a:t>{}</a:t></a:r></a:p>", escape(text))
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// A small solid PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 90, 160]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Names of every part in a package.
pub fn part_names(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    archive.file_names().map(str::to_string).collect()
}
