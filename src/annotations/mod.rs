//! Annotation module
//!
//! # Features
//!
//! - Annotation model in document-intrinsic space
//! - Persistence records (`positions[].bbox`) and conversion
//! - Optimistic store with temporary ids, queued edits and id remapping
//! - Selection -> draft conversion

mod record;
mod selection;
mod store;
mod types;

pub use record::{AnnotationRecord, RecordPosition, RECORD_BBOX_FORMAT};
pub use selection::{selection_draft, Selection};
pub use store::{AnnotationBackend, AnnotationStore, Operation, StoreError, StoreEvent};
pub use types::{
    is_temp_id, temp_id, Annotation, AnnotationDraft, AnnotationPatch, AnnotationType, Location,
    TEMP_ID_PREFIX,
};

#[cfg(test)]
pub(crate) use store::tests as store_tests;
