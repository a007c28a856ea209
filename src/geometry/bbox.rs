//! Four-number bounding boxes as they arrive on the wire

use serde::{Deserialize, Serialize};

use super::Rect;

/// How a 4-number bbox array is laid out
///
/// The layout is declared by the producer; it is never guessed from the values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BboxFormat {
    /// `[x, y, width, height]`
    #[default]
    Xywh,
    /// `[x0, y0, x1, y1]`
    Corners,
}

impl BboxFormat {
    /// Parse a bbox array into a document rect
    ///
    /// Returns `None` for arrays that are not exactly four finite numbers, or
    /// for `xywh` boxes with a negative extent.
    pub fn to_rect(self, values: &[f64]) -> Option<Rect> {
        let [a, b, c, d] = <[f64; 4]>::try_from(values).ok()?;
        if !(a.is_finite() && b.is_finite() && c.is_finite() && d.is_finite()) {
            return None;
        }

        match self {
            BboxFormat::Xywh if c < 0.0 || d < 0.0 => None,
            BboxFormat::Xywh => Some(Rect::new(a, b, c, d)),
            BboxFormat::Corners => Some(Rect::from_corners(a, b, c, d)),
        }
    }

    /// Serialize a rect in this layout
    pub fn from_rect(self, rect: &Rect) -> [f64; 4] {
        match self {
            BboxFormat::Xywh => [rect.x, rect.y, rect.width, rect.height],
            BboxFormat::Corners => [rect.x, rect.y, rect.right(), rect.bottom()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xywh_and_corners_read_differently() {
        let values = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(BboxFormat::Xywh.to_rect(&values), Some(Rect::new(10.0, 20.0, 30.0, 40.0)));
        assert_eq!(BboxFormat::Corners.to_rect(&values), Some(Rect::new(10.0, 20.0, 20.0, 20.0)));
    }

    #[test]
    fn test_malformed_boxes_rejected() {
        assert!(BboxFormat::Xywh.to_rect(&[1.0, 2.0, 3.0]).is_none());
        assert!(BboxFormat::Xywh.to_rect(&[1.0, 2.0, 3.0, 4.0, 5.0]).is_none());
        assert!(BboxFormat::Corners.to_rect(&[1.0, f64::NAN, 3.0, 4.0]).is_none());
        assert!(BboxFormat::Xywh.to_rect(&[1.0, 2.0, -3.0, 4.0]).is_none());
    }

    #[test]
    fn test_format_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&BboxFormat::Corners).unwrap(), "\"corners\"");
        let parsed: BboxFormat = serde_json::from_str("\"xywh\"").unwrap();
        assert_eq!(parsed, BboxFormat::Xywh);
    }
}
