//! Turning a viewport text selection into an annotation draft

use crate::geometry::{merge_rects_by_line, to_document, GeometryError, Rect};

use super::types::{AnnotationDraft, AnnotationType, Location};

/// A text selection as seen on screen
#[derive(Debug, Clone)]
pub struct Selection {
    /// Page the selection belongs to (1-indexed)
    pub page_number: u32,
    /// Selected text
    pub text: String,
    /// Client rects of the selection, viewport space
    pub client_rects: Vec<Rect>,
    /// Viewport rect of the page container
    pub container: Rect,
    /// Current zoom
    pub scale: f64,
}

/// Build a draft in document space from a selection
///
/// Client rects are converted to document space, then merged per line. Zero
/// sized client rects (line-break artifacts) are dropped.
pub fn selection_draft(
    selection: &Selection,
    color: &str,
    annotation_type: AnnotationType,
    line_tolerance: f64,
) -> Result<AnnotationDraft, GeometryError> {
    let rects = selection
        .client_rects
        .iter()
        .filter(|r| r.width > 0.0 && r.height > 0.0)
        .map(|r| to_document(*r, selection.container, selection.scale))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AnnotationDraft {
        page_number: selection.page_number,
        text_selected: selection.text.trim().to_string(),
        color: color.to_string(),
        comments: Vec::new(),
        location: Location::from_rects(merge_rects_by_line(&rects, line_tolerance * selection.scale.recip())),
        annotation_type,
    })
}
