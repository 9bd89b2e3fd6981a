//! Image preparation: raw downloaded bytes → a media part PowerPoint accepts.
//!
//! Chart hosts serve PNG, JPEG, GIF and increasingly WebP. PowerPoint renders
//! the first three natively, so their bytes are embedded untouched; anything
//! else is decoded and re-encoded as PNG. Every image is fully decoded once,
//! which both rejects truncated or mislabelled downloads early and yields the
//! pixel size needed for aspect-preserving slots.

use crate::deck::ImagePart;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// A decoded, embeddable image.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub part: ImagePart,
    pub width_px: u32,
    pub height_px: u32,
}

impl PreparedImage {
    /// Height / width.
    pub fn aspect(&self) -> f64 {
        if self.width_px == 0 {
            1.0
        } else {
            self.height_px as f64 / self.width_px as f64
        }
    }
}

/// Decode `bytes` and choose how to embed them.
///
/// Errors are human-readable strings; the caller wraps them in a
/// field-level error that names the field.
pub fn prepare_image(bytes: &[u8]) -> Result<PreparedImage, String> {
    let format = image::guess_format(bytes).map_err(|e| e.to_string())?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(|e| e.to_string())?;
    let (width_px, height_px) = (img.width(), img.height());

    let part = match format {
        ImageFormat::Png => native(bytes, "png", "image/png"),
        ImageFormat::Jpeg => native(bytes, "jpeg", "image/jpeg"),
        ImageFormat::Gif => native(bytes, "gif", "image/gif"),
        other => {
            debug!("Transcoding {other:?} image to PNG");
            ImagePart {
                bytes: encode_png(&img).map_err(|e| e.to_string())?,
                extension: "png",
                content_type: "image/png",
            }
        }
    };
    debug!("Prepared {width_px}×{height_px} {} ({} bytes)", part.extension, part.bytes.len());

    Ok(PreparedImage {
        part,
        width_px,
        height_px,
    })
}

fn native(bytes: &[u8], extension: &'static str, content_type: &'static str) -> ImagePart {
    ImagePart {
        bytes: bytes.to_vec(),
        extension,
        content_type,
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 90, 200, 255])));
        encode_png(&img).unwrap()
    }

    #[test]
    fn png_is_embedded_verbatim() {
        let bytes = png(40, 20);
        let prepared = prepare_image(&bytes).unwrap();
        assert_eq!(prepared.part.bytes, bytes);
        assert_eq!(prepared.part.content_type, "image/png");
        assert_eq!((prepared.width_px, prepared.height_px), (40, 20));
        assert!((prepared.aspect() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn html_error_page_is_rejected() {
        let err = prepare_image(b"<html><body>404</body></html>").unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn truncated_png_is_rejected() {
        let bytes = png(40, 20);
        assert!(prepare_image(&bytes[..bytes.len() / 2]).is_err());
    }
}
