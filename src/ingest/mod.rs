//! Auto-annotation ingestion
//!
//! Auto-annotation jobs propose annotations from a natural-language prompt.
//! Their messages arrive over an asynchronous channel in no guaranteed order;
//! the ingestor tracks each job's state and appends its results to the store
//! once.

mod channel;
mod job;
mod service;
mod types;

pub use channel::{ChannelEvent, JobChannel, NORMAL_CLOSURE};
pub use job::{result_annotations, AUTO_ANNOTATION_AUTHOR, AUTO_ANNOTATION_COLOR};
pub use service::AutoAnnotationIngestor;
pub use types::{AutoBox, AutoResult, IngestError, JobMessage, JobState, JobSummary, MessageKind};
