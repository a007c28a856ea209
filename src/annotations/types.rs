//! Annotation types
//!
//! Geometry is always stored in document-intrinsic space (zoom 1, origin
//! top-left). Viewport rects are derived when the overlay is drawn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{merge_rects, Rect};

/// Prefix of client-generated ids awaiting a server id
pub const TEMP_ID_PREFIX: &str = "tmp-";

/// Generate a temporary client id
pub fn temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4())
}

/// Whether an id is still a temporary client id
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// An annotation bound to a text span on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Temporary client id or server id
    pub id: String,
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Source text the annotation is anchored to
    pub text_selected: String,
    /// Color token
    pub color: String,
    /// User comments, oldest first
    #[serde(default)]
    pub comments: Vec<String>,
    /// Position on the page
    pub location: Location,
    /// Type of annotation
    #[serde(rename = "type")]
    pub annotation_type: AnnotationType,
    /// Whether the re-anchor matcher has processed this annotation
    #[serde(default)]
    pub refined: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    /// Reason attached by the producer (auto annotations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Types of annotations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    /// Highlight created from a user selection
    #[default]
    ManualHighlight,
    /// Note created from a user selection
    ManualNote,
    /// Proposed by an auto-annotation job
    AutoAnnotate,
}

/// Annotation position in document space
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Bounding box of the whole annotation
    pub coordinates: Rect,
    /// One rect per visual line
    #[serde(default)]
    pub coordinates_list: Vec<Rect>,
    /// Start offset in the page's raw text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_start: Option<usize>,
    /// End offset (exclusive) in the page's raw text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_end: Option<usize>,
}

impl Location {
    /// Location covering a set of line rects
    pub fn from_rects(rects: Vec<Rect>) -> Self {
        Self {
            coordinates: merge_rects(&rects).unwrap_or_default(),
            coordinates_list: rects,
            char_start: None,
            char_end: None,
        }
    }

    /// Line rects to draw; falls back to the bounding box
    pub fn line_rects(&self) -> Vec<Rect> {
        if self.coordinates_list.is_empty() {
            vec![self.coordinates]
        } else {
            self.coordinates_list.clone()
        }
    }
}

/// Input for a new annotation, before it gets an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationDraft {
    pub page_number: u32,
    pub text_selected: String,
    pub color: String,
    #[serde(default)]
    pub comments: Vec<String>,
    pub location: Location,
    #[serde(rename = "type", default)]
    pub annotation_type: AnnotationType,
}

impl AnnotationDraft {
    /// Turn the draft into an annotation with fresh geometry
    pub fn into_annotation(self, id: String, created_by: &str) -> Annotation {
        Annotation {
            id,
            page_number: self.page_number,
            text_selected: self.text_selected,
            color: self.color,
            comments: self.comments,
            location: self.location,
            annotation_type: self.annotation_type,
            refined: true,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            reason: None,
        }
    }
}

/// Local edit of an existing annotation
///
/// Only fields that are `Some` are changed. `comments` replaces the whole list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "comment", default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<String>>,
}

impl AnnotationPatch {
    pub fn color(color: &str) -> Self {
        Self {
            color: Some(color.to_string()),
            ..Default::default()
        }
    }

    pub fn comments(comments: Vec<String>) -> Self {
        Self {
            comments: Some(comments),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.comments.is_none()
    }
}

impl Annotation {
    /// Apply a local edit; geometry and `refined` are untouched
    pub fn apply(&mut self, patch: &AnnotationPatch) {
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(comments) = &patch.comments {
            self.comments = comments.clone();
        }
    }

    pub fn is_temporary(&self) -> bool {
        is_temp_id(&self.id)
    }

    pub fn is_auto(&self) -> bool {
        self.annotation_type == AnnotationType::AutoAnnotate
    }
}
