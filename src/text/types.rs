//! Text layer types consumed from the page renderer

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A run of text as reported by the page renderer
///
/// Coordinates use the renderer's baseline-origin space: `origin_y` grows
/// upwards from the bottom of the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    /// The run's text
    #[serde(rename = "str")]
    pub text: String,
    /// Left edge of the run (points)
    pub origin_x: f64,
    /// Baseline of the run, measured from the page bottom (points)
    pub origin_y: f64,
    /// Run advance width (points)
    pub width: f64,
    /// Run height (points)
    pub height: f64,
}

/// Text content and size of one page at zoom 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Page width in points
    pub width: f64,
    /// Page height in points
    pub height: f64,
    /// Text runs in content order
    pub runs: Vec<TextRun>,
}

impl PageContent {
    /// Hash of the page's text content and geometry
    ///
    /// Two contents with the same fingerprint produce the same index.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.width.to_bits().hash(&mut hasher);
        self.height.to_bits().hash(&mut hasher);
        for run in &self.runs {
            run.text.hash(&mut hasher);
            run.origin_x.to_bits().hash(&mut hasher);
            run.origin_y.to_bits().hash(&mut hasher);
            run.width.to_bits().hash(&mut hasher);
            run.height.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_deserializes_renderer_shape() {
        let json = r#"{"str": "Hello", "originX": 72.0, "originY": 700.0, "width": 30.0, "height": 12.0}"#;
        let run: TextRun = serde_json::from_str(json).unwrap();
        assert_eq!(run.text, "Hello");
        assert_eq!(run.origin_y, 700.0);
    }

    #[test]
    fn test_fingerprint_tracks_text() {
        let mut page = PageContent {
            page_number: 1,
            width: 612.0,
            height: 792.0,
            runs: vec![TextRun {
                text: "a".into(),
                origin_x: 0.0,
                origin_y: 0.0,
                width: 5.0,
                height: 10.0,
            }],
        };
        let before = page.fingerprint();
        assert_eq!(before, page.clone().fingerprint());

        page.runs[0].text = "b".into();
        assert_ne!(before, page.fingerprint());
    }
}
