//! Rect merging and line grouping

use std::cmp::Ordering;

use super::Rect;

/// Default vertical tolerance for grouping rects into one line
pub const DEFAULT_LINE_TOLERANCE: f64 = 5.0;

/// Bounding box of all rects
///
/// A single rect is returned unchanged; an empty slice has no bounding box.
pub fn merge_rects(rects: &[Rect]) -> Option<Rect> {
    match rects {
        [] => None,
        [only] => Some(*only),
        [first, rest @ ..] => {
            let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.right(), first.bottom());
            for r in rest {
                x0 = x0.min(r.x);
                y0 = y0.min(r.y);
                x1 = x1.max(r.right());
                y1 = y1.max(r.bottom());
            }
            Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
        }
    }
}

fn reading_order(a: &Rect, b: &Rect) -> Ordering {
    a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
}

/// Merge rects into one bounding box per visual line
///
/// Rects are sorted top-to-bottom then left-to-right. A rect joins the current
/// group while its `y` is within `tolerance` of the group's first rect.
pub fn merge_rects_by_line(rects: &[Rect], tolerance: f64) -> Vec<Rect> {
    let mut sorted = rects.to_vec();
    sorted.sort_by(reading_order);

    let mut lines = Vec::new();
    let mut group: Vec<Rect> = Vec::new();

    for rect in sorted {
        match group.first() {
            Some(anchor) if (rect.y - anchor.y).abs() > tolerance => {
                lines.extend(merge_rects(&group));
                group.clear();
            }
            _ => {}
        }
        group.push(rect);
    }
    lines.extend(merge_rects(&group));

    lines
}
