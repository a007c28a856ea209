//! Geometry primitives
//!
//! All stored geometry lives in document-intrinsic space: the coordinate system
//! of a page rendered at zoom 1, origin top-left. Viewport values are derived on
//! render and never persisted.
//!
//! # Modules
//!
//! - `transform`: viewport <-> document conversion
//! - `merge`: bounding boxes and per-line grouping
//! - `locate`: which page slot contains a point
//! - `bbox`: wire bbox arrays with an explicit layout

mod bbox;
mod locate;
mod merge;
mod transform;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bbox::BboxFormat;
pub use locate::{locate_page, PageSlot};
pub use merge::{merge_rects, merge_rects_by_line, DEFAULT_LINE_TOLERANCE};
pub use transform::{to_document, to_viewport};

/// Geometry errors
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("Scale must be finite and positive, got {0}")]
    InvalidScale(f64),
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A point in the same space as the rects it is compared with
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rect from two corners, in any order
    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// True when the rect has no extent in either direction
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 || self.height > 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }
}

impl Point {
    pub fn distance(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}
