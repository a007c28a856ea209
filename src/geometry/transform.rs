//! Viewport <-> document coordinate conversion

use super::{GeometryError, Rect};

fn check_scale(scale: f64) -> Result<f64, GeometryError> {
    if scale.is_finite() && scale > 0.0 {
        Ok(scale)
    } else {
        Err(GeometryError::InvalidScale(scale))
    }
}

/// Convert a viewport rect (e.g. a client rect of a selection) to document space
///
/// `container_origin` is the viewport rect of the page container the selection
/// belongs to; only its `x`/`y` are used.
pub fn to_document(rect: Rect, container_origin: Rect, scale: f64) -> Result<Rect, GeometryError> {
    let scale = check_scale(scale)?;
    Ok(Rect {
        x: (rect.x - container_origin.x) / scale,
        y: (rect.y - container_origin.y) / scale,
        width: rect.width / scale,
        height: rect.height / scale,
    })
}

/// Scale a document rect to the viewport, relative to its page container
pub fn to_viewport(rect: Rect, scale: f64) -> Result<Rect, GeometryError> {
    let scale = check_scale(scale)?;
    Ok(Rect {
        x: rect.x * scale,
        y: rect.y * scale,
        width: rect.width * scale,
        height: rect.height * scale,
    })
}
