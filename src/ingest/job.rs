//! Job state machine and result conversion

use std::collections::BTreeMap;

use tracing::debug;
use uuid::Uuid;

use super::types::{AutoResult, JobMessage, JobState, MessageKind};
use crate::annotations::{Annotation, AnnotationDraft, AnnotationType, Location};
use crate::geometry::{merge_rects_by_line, BboxFormat, Rect};

/// Highlight color of proposed annotations
pub const AUTO_ANNOTATION_COLOR: &str = "#b39ddb";

/// Author recorded on proposed annotations
pub const AUTO_ANNOTATION_AUTHOR: &str = "auto-annotate";

/// Effect of one message on a job
#[derive(Debug, Default)]
pub(crate) struct Step {
    /// The job completed with this message
    pub completed: bool,
    /// The job failed with this message
    pub failed: bool,
    /// Results to ingest; handed out once per job
    pub results: Option<Vec<AutoResult>>,
}

#[derive(Debug)]
pub(crate) struct Job {
    pub id: Uuid,
    pub prompt: String,
    pub format: BboxFormat,
    pub state: JobState,
    pub annotation_ids: Vec<String>,
    ingested: bool,
}

impl Job {
    pub fn new(id: Uuid, prompt: &str, format: BboxFormat) -> Self {
        Self {
            id,
            prompt: prompt.to_string(),
            format,
            state: JobState::Idle,
            annotation_ids: Vec::new(),
            ingested: false,
        }
    }

    pub fn submit(&mut self) {
        self.advance(JobState::Submitted);
    }

    /// Apply a channel message
    ///
    /// Delivery order is not trusted: states only move forward, duplicates and
    /// anything after a terminal state are no-ops, and results are released at
    /// most once.
    pub fn apply(&mut self, msg: JobMessage) -> Step {
        let mut step = Step::default();
        if matches!(self.state, JobState::Failed { .. }) {
            return step;
        }

        let completion = msg.is_completion();
        let failure = msg.is_failure();

        if !self.ingested {
            if let Some(results) = msg.results {
                self.ingested = true;
                step.results = Some(results);
            }
        }

        if self.state.is_terminal() {
            return step;
        }

        let next = if failure {
            JobState::Failed {
                reason: msg.reason.unwrap_or_else(|| "Job failed".to_string()),
            }
        } else if completion {
            JobState::Completed
        } else {
            match msg.kind {
                MessageKind::Ack => JobState::Submitted,
                MessageKind::Connection => JobState::Connected,
                MessageKind::Progress => JobState::Progressing {
                    progress: msg.progress.map_or(0, |p| p.clamp(0.0, 99.0) as u8),
                },
                MessageKind::Status | MessageKind::Unknown => return step,
            }
        };

        if self.advance(next) {
            step.completed = self.state == JobState::Completed;
            step.failed = matches!(self.state, JobState::Failed { .. });
        }
        step
    }

    /// Fail the job unless it already ended; returns whether it changed
    pub fn fail(&mut self, reason: String) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = JobState::Failed { reason };
        true
    }

    /// Nothing more can come out of the job's channel
    pub fn is_settled(&self) -> bool {
        match self.state {
            JobState::Completed => self.ingested,
            JobState::Failed { .. } => true,
            _ => false,
        }
    }

    fn advance(&mut self, next: JobState) -> bool {
        let forward = match (&self.state, &next) {
            (JobState::Progressing { progress: a }, JobState::Progressing { progress: b }) => b > a,
            (current, next) => next.rank() > current.rank(),
        };
        if forward {
            self.state = next;
        }
        forward
    }
}

#[derive(Default)]
struct PageBoxes {
    rects: Vec<Rect>,
    char_start: Option<usize>,
    char_end: Option<usize>,
}

/// Convert job results to annotations
///
/// The boxes of a result are merged per line into one annotation; a result
/// whose boxes span several pages yields one annotation per page. Malformed
/// boxes are skipped, and a result left with none is dropped.
pub fn result_annotations(results: &[AutoResult], format: BboxFormat, line_tolerance: f64) -> Vec<Annotation> {
    let mut annotations = Vec::new();

    for result in results {
        let mut pages: BTreeMap<u32, PageBoxes> = BTreeMap::new();
        for bbox in &result.bboxes {
            let Some((page_number, rect)) = bbox.resolve(format) else {
                debug!(text = %result.text, bbox = %bbox.bbox, "Skipping malformed bbox");
                continue;
            };
            let entry = pages.entry(page_number).or_default();
            entry.rects.push(rect);
            entry.char_start = min_opt(entry.char_start, bbox.char_start());
            entry.char_end = entry.char_end.max(bbox.char_end());
        }

        for (page_number, boxes) in pages {
            let mut location = Location::from_rects(merge_rects_by_line(&boxes.rects, line_tolerance));
            location.char_start = boxes.char_start;
            location.char_end = boxes.char_end;

            let mut annotation = AnnotationDraft {
                page_number,
                text_selected: result.text.trim().to_string(),
                color: AUTO_ANNOTATION_COLOR.to_string(),
                comments: Vec::new(),
                location,
                annotation_type: AnnotationType::AutoAnnotate,
            }
            .into_annotation(Uuid::new_v4().to_string(), AUTO_ANNOTATION_AUTHOR);
            annotation.refined = false;
            annotation.reason = result.label.clone();
            annotations.push(annotation);
        }
    }

    annotations
}

fn min_opt(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
