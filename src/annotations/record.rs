//! Persistence records
//!
//! The shape the persistence collaborator reads and writes. Position bboxes
//! are document-space `[x, y, width, height]` arrays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{merge_rects, BboxFormat};

use super::types::{Annotation, AnnotationType, Location};

/// Layout of `positions[].bbox` in persistence records
pub const RECORD_BBOX_FORMAT: BboxFormat = BboxFormat::Xywh;

/// Annotation as stored by the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: String,
    pub text: String,
    pub color: String,
    #[serde(default)]
    pub positions: Vec<RecordPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub comment: Vec<String>,
    #[serde(default)]
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub annotation_type: AnnotationType,
}

/// One line box of a stored annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPosition {
    pub bbox: Vec<f64>,
    /// Page number (1-indexed)
    pub page_number: u32,
}

impl From<&Annotation> for AnnotationRecord {
    fn from(annotation: &Annotation) -> Self {
        let positions = annotation
            .location
            .line_rects()
            .iter()
            .map(|rect| RecordPosition {
                bbox: RECORD_BBOX_FORMAT.from_rect(rect).to_vec(),
                page_number: annotation.page_number,
            })
            .collect();

        Self {
            id: annotation.id.clone(),
            text: annotation.text_selected.clone(),
            color: annotation.color.clone(),
            positions,
            reason: annotation.reason.clone(),
            comment: annotation.comments.clone(),
            created_by: annotation.created_by.clone(),
            created_at: annotation.created_at,
            annotation_type: annotation.annotation_type,
        }
    }
}

impl AnnotationRecord {
    /// Convert a stored record into an in-memory annotation
    ///
    /// Malformed position boxes are dropped. The page comes from the first
    /// position (page 1 when there are none). Loaded annotations start
    /// unrefined: stored geometry may be stale.
    pub fn into_annotation(self) -> Annotation {
        let page_number = self
            .positions
            .first()
            .map(|p| p.page_number.max(1))
            .unwrap_or(1);

        let rects: Vec<_> = self
            .positions
            .iter()
            .filter(|p| p.page_number.max(1) == page_number)
            .filter_map(|p| {
                let rect = RECORD_BBOX_FORMAT.to_rect(&p.bbox);
                if rect.is_none() {
                    tracing::debug!(id = %self.id, bbox = ?p.bbox, "Skipping malformed stored bbox");
                }
                rect
            })
            .collect();

        Annotation {
            location: Location {
                coordinates: merge_rects(&rects).unwrap_or_default(),
                coordinates_list: rects,
                char_start: None,
                char_end: None,
            },
            id: self.id,
            page_number,
            text_selected: self.text,
            color: self.color,
            comments: self.comment,
            annotation_type: self.annotation_type,
            refined: false,
            created_by: self.created_by,
            created_at: self.created_at,
            reason: self.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    const STORED: &str = r#"{
        "id": "a1b2",
        "text": "beyond a reasonable doubt",
        "color": "yellow",
        "positions": [
            {"bbox": [72.0, 100.0, 200.0, 12.0], "page_number": 3},
            {"bbox": [72.0, 114.0, 80.0, 12.0], "page_number": 3},
            {"bbox": [1.0, 2.0], "page_number": 3}
        ],
        "reason": null,
        "comment": ["key standard"],
        "created_by": "alice",
        "created_at": "2024-03-01T12:00:00Z",
        "type": "manual_highlight"
    }"#;

    #[test]
    fn test_record_to_annotation() {
        let record: AnnotationRecord = serde_json::from_str(STORED).unwrap();
        let annotation = record.into_annotation();

        assert_eq!(annotation.page_number, 3);
        assert_eq!(annotation.location.coordinates_list.len(), 2);
        assert_eq!(annotation.location.coordinates, Rect::new(72.0, 100.0, 200.0, 26.0));
        assert_eq!(annotation.comments, vec!["key standard".to_string()]);
        assert!(!annotation.refined);
    }

    #[test]
    fn test_annotation_to_record() {
        let record: AnnotationRecord = serde_json::from_str(STORED).unwrap();
        let annotation = record.into_annotation();
        let back = AnnotationRecord::from(&annotation);

        assert_eq!(back.positions.len(), 2);
        assert_eq!(back.positions[0].bbox, vec![72.0, 100.0, 200.0, 12.0]);
        assert_eq!(back.positions[1].page_number, 3);

        let json = serde_json::to_string(&back).unwrap();
        assert!(json.contains("\"type\":\"manual_highlight\""));
        assert!(json.contains("\"comment\":[\"key standard\"]"));
    }

    #[test]
    fn test_record_without_positions() {
        let json = r#"{"id": "x", "text": "t", "color": "red", "created_at": "2024-03-01T12:00:00Z"}"#;
        let annotation = serde_json::from_str::<AnnotationRecord>(json)
            .unwrap()
            .into_annotation();
        assert_eq!(annotation.page_number, 1);
        assert!(annotation.location.coordinates.is_degenerate());
    }
}
