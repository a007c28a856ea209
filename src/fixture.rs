//! Document fixtures
//!
//! A fixture is a JSON file holding the extracted text of some pages and the
//! persisted annotations of the document. Running it re-anchors every page
//! and returns the resulting records.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotations::{AnnotationBackend, AnnotationPatch, AnnotationRecord, AnnotationStore, StoreError};
use crate::config::EngineConfig;
use crate::error::{FixtureError, Result};
use crate::reanchor::{ReanchorMatcher, ReanchorReport, Reanchorer};
use crate::text::{PageContent, PageTextCache};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFixture {
    pub pages: Vec<PageContent>,
    #[serde(default)]
    pub annotations: Vec<AnnotationRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixtureOutput {
    pub annotations: Vec<AnnotationRecord>,
    pub reports: Vec<ReanchorReport>,
}

impl DocumentFixture {
    pub fn load(path: &Path) -> std::result::Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> std::result::Result<Self, FixtureError> {
        let fixture: DocumentFixture = serde_json::from_str(raw)?;

        let mut seen = HashSet::new();
        for page in &fixture.pages {
            if !seen.insert(page.page_number) {
                return Err(FixtureError::DuplicatePage(page.page_number));
            }
        }
        Ok(fixture)
    }

    /// Re-anchor every page of the fixture
    pub async fn run(self, config: &EngineConfig) -> Result<FixtureOutput> {
        let matcher = ReanchorMatcher::new(&config.reanchor)?;
        let reanchorer = Reanchorer::new(matcher, Arc::new(PageTextCache::new(config.text_cache_capacity)));

        let store = AnnotationStore::new(Arc::new(OfflineBackend), config.store.clone());
        store.load(self.annotations).await;

        let reports = reanchorer.run_pages(&store, &self.pages).await;
        for report in &reports {
            tracing::debug!(
                page = report.page_number,
                matched = report.matched,
                unmatched = report.unmatched,
                "Page re-anchored"
            );
        }

        let annotations = store.annotations().await.iter().map(AnnotationRecord::from).collect();
        Ok(FixtureOutput { annotations, reports })
    }
}

/// Backend for runs without a persistence server
///
/// Creates get fresh ids; updates and deletes succeed without effect.
pub struct OfflineBackend;

#[async_trait]
impl AnnotationBackend for OfflineBackend {
    async fn create(&self, _record: &AnnotationRecord) -> std::result::Result<String, StoreError> {
        Ok(Uuid::new_v4().to_string())
    }

    async fn update(&self, _id: &str, _patch: &AnnotationPatch) -> std::result::Result<(), StoreError> {
        Ok(())
    }

    async fn delete(&self, _id: &str) -> std::result::Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnchorError;

    const FIXTURE: &str = r#"{
        "pages": [
            {"pageNumber": 1, "width": 612, "height": 792, "runs": [
                {"str": "The court held that due process applies.", "originX": 72, "originY": 700, "width": 240, "height": 12}
            ]}
        ],
        "annotations": [
            {"id": "a1", "text": "due process (Smith, J., dissenting)", "color": "yellow",
             "positions": [{"bbox": [0, 0, 10, 10], "page_number": 1}],
             "created_at": "2024-03-01T12:00:00Z", "type": "manual_highlight"},
            {"id": "a2", "text": "court", "color": "blue",
             "positions": [{"bbox": [72, 80, 30, 12], "page_number": 1}],
             "created_at": "2024-03-01T12:00:00Z", "type": "manual_highlight"}
        ]
    }"#;

    #[tokio::test]
    async fn test_run_reanchors_noisy_annotation() {
        let fixture = DocumentFixture::from_json(FIXTURE).unwrap();
        let output = fixture.run(&EngineConfig::default()).await.unwrap();

        assert_eq!(output.reports.len(), 1);
        assert_eq!(output.reports[0].refined, vec!["a1".to_string()]);

        let a1 = output.annotations.iter().find(|r| r.id == "a1").unwrap();
        assert_ne!(a1.positions[0].bbox, vec![0.0, 0.0, 10.0, 10.0]);
        let a2 = output.annotations.iter().find(|r| r.id == "a2").unwrap();
        assert_eq!(a2.positions[0].bbox, vec![72.0, 80.0, 30.0, 12.0]);
    }

    #[test]
    fn test_duplicate_pages_rejected() {
        let raw = r#"{"pages": [
            {"pageNumber": 2, "width": 1, "height": 1, "runs": []},
            {"pageNumber": 2, "width": 1, "height": 1, "runs": []}
        ]}"#;
        assert!(matches!(
            DocumentFixture::from_json(raw),
            Err(FixtureError::DuplicatePage(2))
        ));
    }

    #[tokio::test]
    async fn test_bad_noise_pattern() {
        let fixture = DocumentFixture::from_json(r#"{"pages": []}"#).unwrap();
        let mut config = EngineConfig::default();
        config.reanchor.noise_pattern = "(".to_string();
        assert!(matches!(fixture.run(&config).await, Err(AnchorError::Pattern(_))));
    }
}
