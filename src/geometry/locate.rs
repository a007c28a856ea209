//! Page lookup by position

use serde::{Deserialize, Serialize};

use super::{Point, Rect};

/// A rendered page container and its rect in the space of the query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSlot {
    /// Page number (1-indexed)
    pub page_number: u32,
    pub rect: Rect,
}

/// Find the page containing `point`
///
/// Falls back to the page whose center is nearest when no slot contains the
/// point (e.g. a selection ending in the gap between two pages).
pub fn locate_page(slots: &[PageSlot], point: Point) -> Option<u32> {
    if let Some(slot) = slots.iter().find(|s| s.rect.contains_point(point)) {
        return Some(slot.page_number);
    }

    slots
        .iter()
        .min_by(|a, b| {
            a.rect
                .center()
                .distance(point)
                .total_cmp(&b.rect.center().distance(point))
        })
        .map(|s| s.page_number)
}
