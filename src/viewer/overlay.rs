//! Highlight overlay projection

use serde::Serialize;

use crate::annotations::Annotation;
use crate::geometry::{to_viewport, GeometryError, Rect};

/// One highlight rect to draw over a page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayItem {
    /// Viewport rect relative to the page container
    pub rect: Rect,
    pub color: String,
    pub annotation_id: String,
}

/// Project the annotations of a page to viewport rects at `scale`
///
/// One item per line rect. Degenerate rects have nothing to draw and are
/// skipped.
pub fn overlay_items(
    annotations: &[Annotation],
    page_number: u32,
    scale: f64,
) -> Result<Vec<OverlayItem>, GeometryError> {
    let mut items = Vec::new();
    for annotation in annotations.iter().filter(|a| a.page_number == page_number) {
        for rect in annotation.location.line_rects() {
            if rect.is_degenerate() {
                continue;
            }
            items.push(OverlayItem {
                rect: to_viewport(rect, scale)?,
                color: annotation.color.clone(),
                annotation_id: annotation.id.clone(),
            });
        }
    }
    Ok(items)
}
