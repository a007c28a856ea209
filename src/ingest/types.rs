//! Auto-annotation job types
//!
//! Job channel messages, result payloads and the job state.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::geometry::{BboxFormat, Rect};

/// Message kind on the job channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Job accepted by the server
    Ack,
    /// Job worker connected
    Connection,
    Progress,
    /// Explicit status change (completion or failure)
    Status,
    #[serde(other)]
    Unknown,
}

/// A message from the job channel
///
/// Any field may appear on any message kind; a message carrying
/// `progress == 100` completes the job whatever its kind. Malformed result
/// entries are dropped one by one instead of rejecting the message.
#[derive(Debug, Clone, Deserialize)]
pub struct JobMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, deserialize_with = "lenient_number")]
    pub progress: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_results")]
    pub results: Option<Vec<AutoResult>>,
}

impl JobMessage {
    /// Whether this message marks the job as done
    pub fn is_completion(&self) -> bool {
        self.progress.is_some_and(|p| p >= 100.0)
            || matches!(
                self.status.as_deref(),
                Some("completed" | "complete" | "done" | "success")
            )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status.as_deref(), Some("failed" | "error"))
    }
}

/// One proposed annotation
#[derive(Debug, Clone, Deserialize)]
pub struct AutoResult {
    pub text: String,
    /// Label assigned by the job, e.g. "holding"
    #[serde(rename = "type", default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient_boxes")]
    pub bboxes: Vec<AutoBox>,
}

/// A box of a proposed annotation
///
/// Kept loosely typed so a single malformed entry does not reject the batch.
#[derive(Debug, Clone, Deserialize)]
pub struct AutoBox {
    #[serde(default)]
    pub bbox: Value,
    /// 0-based page index
    #[serde(default)]
    pub page: Value,
    #[serde(default)]
    pub char_start: Value,
    #[serde(default)]
    pub char_end: Value,
}

impl AutoBox {
    /// 1-based page number and document rect, `None` when malformed
    pub fn resolve(&self, format: BboxFormat) -> Option<(u32, Rect)> {
        let page = u32::try_from(self.page.as_u64()?).ok()?.checked_add(1)?;
        let values = self
            .bbox
            .as_array()?
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<_>>>()?;
        let rect = format.to_rect(&values)?;
        Some((page, rect))
    }

    /// Start offset in the page text; `None` unless a non-negative integer
    pub fn char_start(&self) -> Option<usize> {
        as_offset(&self.char_start)
    }

    pub fn char_end(&self) -> Option<usize> {
        as_offset(&self.char_end)
    }
}

fn as_offset(value: &Value) -> Option<usize> {
    usize::try_from(value.as_u64()?).ok()
}

// ============================================================================
// Lenient decoding
// ============================================================================

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(|v| v.as_f64()))
}

fn lenient_results<'de, D>(deserializer: D) -> Result<Option<Vec<AutoResult>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.map(lenient_list))
}

fn lenient_boxes<'de, D>(deserializer: D) -> Result<Vec<AutoBox>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_list(Value::deserialize(deserializer)?))
}

/// Decode the entries of a JSON array, skipping the ones that do not fit
fn lenient_list<T: DeserializeOwned>(value: Value) -> Vec<T> {
    let Value::Array(items) = value else {
        tracing::debug!("Expected a list of entries, ignoring");
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed entry");
                None
            }
        })
        .collect()
}

/// State of an auto-annotation job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Submitted,
    Connected,
    Progressing { progress: u8 },
    Completed,
    Failed { reason: String },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed { .. })
    }

    /// Position along the happy path; states never move backwards
    pub(crate) fn rank(&self) -> u8 {
        match self {
            JobState::Idle => 0,
            JobState::Submitted => 1,
            JobState::Connected => 2,
            JobState::Progressing { .. } => 3,
            JobState::Completed | JobState::Failed { .. } => 4,
        }
    }
}

/// A job as shown to the user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: Uuid,
    pub prompt: String,
    pub state: JobState,
    /// Ids of the annotations the job produced
    pub annotation_ids: Vec<String>,
}

/// Ingest errors
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to start job: {0}")]
    Submit(String),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Prompt is empty")]
    EmptyPrompt,
}
