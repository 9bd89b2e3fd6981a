//! Image retrieval and placement.
//!
//! Two placement mechanisms exist. Token placement finds a text shape holding
//! `{{field}}`, removes the token, and puts the picture over the shape's
//! rectangle, so template authors position charts by drawing a box. Slot
//! placement uses a fixed [`ImageSlot`] from the config and remains for
//! fields whose templates predate tokens. Every failure here is a
//! [`FieldError`]; one broken chart never stops the pass.

use crate::config::{emu_to_inches, ImageSlot};
use crate::deck::{Crop, Presentation};
use crate::error::{DeckError, FieldError};
use crate::pipeline::encode::{prepare_image, PreparedImage};
use crate::pipeline::locate::{find_shapes_containing, shape_at, ShapeRef};
use crate::pipeline::richtext::clear_placeholder;
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::{debug, info};

/// Fetches image bytes for a URL.
///
/// Errors leave `field` empty; the orchestrator fills it in with
/// [`FieldError::for_field`].
pub trait ImageFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FieldError>>;
}

/// [`ImageFetcher`] over HTTP(S) with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpImageFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, DeckError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DeckError::Internal(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, FieldError> {
        let failed = |detail: String| FieldError::DownloadFailed {
            field: String::new(),
            url: url.to_string(),
            detail,
        };
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FieldError::DownloadTimeout {
                    field: String::new(),
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                failed(e.to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FieldError::HttpStatus {
                field: String::new(),
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        debug!("Fetched {} bytes from {url}", bytes.len());
        Ok(bytes.to_vec())
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FieldError>> {
        Box::pin(self.get(url))
    }
}

// ── Slot placement ───────────────────────────────────────────────────────

/// Decode `bytes` and insert them at a fixed slot.
pub fn place_image(pres: &mut Presentation, slot: &ImageSlot, bytes: &[u8]) -> Result<ShapeRef, FieldError> {
    let image = prepare_image(bytes).map_err(|detail| FieldError::UndecodableImage {
        field: String::new(),
        detail,
    })?;
    place_prepared(pres, slot, &image)
}

/// Insert an already-decoded image at a fixed slot.
pub fn place_prepared(
    pres: &mut Presentation,
    slot: &ImageSlot,
    image: &PreparedImage,
) -> Result<ShapeRef, FieldError> {
    let total = pres.slide_count();
    let slide = pres
        .slide_mut(slot.slide)
        .ok_or_else(|| FieldError::SlideOutOfRange {
            field: String::new(),
            slide: slot.slide,
            total,
        })?;
    let rect = slot.rect(image.aspect());
    let shape = slide.add_picture(image.part.clone(), rect, slot.crop);
    info!(
        "Placed image on slide {} at {:.2}×{:.2} in",
        slot.slide + 1,
        emu_to_inches(rect.width),
        emu_to_inches(rect.height)
    );
    Ok(ShapeRef {
        slide: slot.slide,
        shape,
    })
}

// ── Token placement ──────────────────────────────────────────────────────

/// Put the image wherever a text shape holds `{{name}}`.
///
/// Each such shape loses the token (a token-only shape is emptied) and gets
/// the picture at its own rectangle. Returns the number of pictures placed;
/// zero means no text shape holds the token. Shapes without explicit geometry
/// are skipped, and if that leaves nothing the result is
/// [`FieldError::NoGeometry`].
pub fn replace_placeholder_with_image(
    pres: &mut Presentation,
    name: &str,
    image: &PreparedImage,
    crop: Option<Crop>,
) -> Result<usize, FieldError> {
    let targets: Vec<(ShapeRef, String, Option<_>)> = find_shapes_containing(pres, name)
        .into_iter()
        .filter_map(|at| {
            let shape = shape_at(pres, at)?;
            shape
                .has_text()
                .then(|| (at, shape.name.clone(), shape.rect))
        })
        .collect();
    if targets.is_empty() {
        return Ok(0);
    }

    clear_placeholder(pres, name);

    let mut placed = 0;
    let mut first_without_rect = None;
    for (at, shape_name, rect) in targets {
        let Some(rect) = rect else {
            debug!("{{{{{name}}}}} shape '{shape_name}' has inherited geometry; skipped");
            first_without_rect.get_or_insert(shape_name);
            continue;
        };
        if let Some(slide) = pres.slide_mut(at.slide) {
            slide.add_picture(image.part.clone(), rect, crop);
            placed += 1;
        }
    }

    match (placed, first_without_rect) {
        (0, Some(shape)) => Err(FieldError::NoGeometry {
            field: name.to_string(),
            shape,
        }),
        _ => Ok(placed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::{ImagePart, Paragraph, Rect, Run, Shape, ShapeKind, Slide, TextFrame};

    fn prepared() -> PreparedImage {
        PreparedImage {
            part: ImagePart {
                bytes: vec![0x89, b'P', b'N', b'G'],
                extension: "png",
                content_type: "image/png",
            },
            width_px: 200,
            height_px: 100,
        }
    }

    fn token_shape(id: u32, text: &str, rect: Option<Rect>) -> Shape {
        Shape::new(
            id,
            format!("Box {id}"),
            rect,
            ShapeKind::Text(TextFrame::new(vec![Paragraph::new(vec![Run::plain(text)])])),
        )
    }

    #[test]
    fn slot_out_of_range_is_reported() {
        let mut pres = Presentation::from_slides(vec![Slide::default()]);
        let slot = ImageSlot::new(8, 0.5, 0.75, 9.0, 4.5);
        let err = place_prepared(&mut pres, &slot, &prepared()).unwrap_err();
        assert_eq!(
            err,
            FieldError::SlideOutOfRange {
                field: String::new(),
                slide: 8,
                total: 1
            }
        );
    }

    #[test]
    fn width_only_slot_uses_aspect() {
        let mut pres = Presentation::from_slides(vec![Slide::default()]);
        let at = place_prepared(&mut pres, &ImageSlot::width_only(0, 1.0, 1.0, 4.0), &prepared()).unwrap();
        let shape = shape_at(&pres, at).unwrap();
        assert_eq!(shape.rect, Some(Rect::from_inches(1.0, 1.0, 4.0, 2.0)));
        assert!(shape.was_inserted());
    }

    #[test]
    fn undecodable_bytes_fail_softly() {
        let mut pres = Presentation::from_slides(vec![Slide::default()]);
        let err = place_image(&mut pres, &ImageSlot::new(0, 0.0, 0.0, 1.0, 1.0), b"not an image").unwrap_err();
        assert!(matches!(err, FieldError::UndecodableImage { .. }));
        assert!(pres.slide(0).unwrap().shapes().is_empty());
    }

    #[test]
    fn token_shape_geometry_is_inherited() {
        let rect = Rect::from_inches(0.5, 1.0, 4.0, 3.0);
        let mut pres = Presentation::from_slides(vec![Slide::new(vec![token_shape(2, "{{chart_custom}}", Some(rect))])]);
        let n = replace_placeholder_with_image(&mut pres, "chart_custom", &prepared(), None).unwrap();
        assert_eq!(n, 1);
        let slide = pres.slide(0).unwrap();
        assert_eq!(slide.shapes().len(), 2);
        assert_eq!(slide.shapes()[1].rect, Some(rect));
        assert_eq!(slide.shapes()[0].text_frame().unwrap().text(), "");
    }

    #[test]
    fn mixed_shape_keeps_other_text() {
        let rect = Rect::from_inches(0.0, 0.0, 2.0, 2.0);
        let mut pres = Presentation::from_slides(vec![Slide::new(vec![token_shape(2, "Price {{price_chart}}", Some(rect))])]);
        replace_placeholder_with_image(&mut pres, "price_chart", &prepared(), None).unwrap();
        assert_eq!(pres.slide(0).unwrap().shapes()[0].text_frame().unwrap().text(), "Price ");
    }

    #[test]
    fn no_token_places_nothing() {
        let mut pres = Presentation::from_slides(vec![Slide::new(vec![token_shape(2, "static", None)])]);
        assert_eq!(replace_placeholder_with_image(&mut pres, "x", &prepared(), None), Ok(0));
    }

    #[test]
    fn inherited_geometry_only_is_no_geometry() {
        let mut pres = Presentation::from_slides(vec![Slide::new(vec![token_shape(2, "{{x}}", None)])]);
        let err = replace_placeholder_with_image(&mut pres, "x", &prepared(), None).unwrap_err();
        assert!(matches!(err, FieldError::NoGeometry { .. }));
    }
}
