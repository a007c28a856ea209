//! Auto-annotation ingestor
//!
//! Submits prompts over a job channel, follows each job's messages in a
//! background task and appends the proposed annotations to the store. Jobs
//! are independent: a new prompt never touches an earlier job's results.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use super::channel::{ChannelEvent, JobChannel, NORMAL_CLOSURE};
use super::job::{result_annotations, Job};
use super::types::{IngestError, JobMessage, JobState, JobSummary};
use crate::annotations::AnnotationStore;
use crate::geometry::BboxFormat;

/// Ingestor handle; cheap to clone
#[derive(Clone)]
pub struct AutoAnnotationIngestor {
    inner: Arc<IngestorInner>,
}

struct IngestorInner {
    channel: Arc<dyn JobChannel>,
    store: AnnotationStore,
    line_tolerance: f64,
    /// Jobs in submission order
    jobs: RwLock<Vec<JobEntry>>,
}

struct JobEntry {
    job: Job,
    /// Published state; updated after the job's results reached the store
    state: watch::Sender<JobState>,
}

impl AutoAnnotationIngestor {
    pub fn new(channel: Arc<dyn JobChannel>, store: AnnotationStore, line_tolerance: f64) -> Self {
        Self {
            inner: Arc::new(IngestorInner {
                channel,
                store,
                line_tolerance,
                jobs: RwLock::new(Vec::new()),
            }),
        }
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    /// Start a job for `prompt`
    ///
    /// `format` is the bbox layout the job's results use.
    pub async fn submit(&self, prompt: &str, format: BboxFormat) -> Result<Uuid, IngestError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(IngestError::EmptyPrompt);
        }

        let job_id = Uuid::new_v4();
        let mut job = Job::new(job_id, prompt, format);
        job.submit();
        let (state, _) = watch::channel(job.state.clone());
        self.inner.jobs.write().await.push(JobEntry { job, state });

        tracing::info!(job_id = %job_id, prompt = %prompt, ?format, "Auto-annotation job submitted");

        match self.inner.channel.open(job_id, prompt).await {
            Ok(stream) => {
                let ingestor = self.clone();
                tokio::spawn(async move { ingestor.follow(job_id, stream).await });
                Ok(job_id)
            }
            Err(e) => {
                self.fail(job_id, e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Current state of a job
    pub async fn state(&self, job_id: Uuid) -> Option<JobState> {
        let jobs = self.inner.jobs.read().await;
        jobs.iter()
            .find(|e| e.job.id == job_id)
            .map(|e| e.state.borrow().clone())
    }

    /// Wait until a job completes or fails
    pub async fn wait(&self, job_id: Uuid) -> Result<JobState, IngestError> {
        let mut rx = {
            let jobs = self.inner.jobs.read().await;
            jobs.iter()
                .find(|e| e.job.id == job_id)
                .map(|e| e.state.subscribe())
                .ok_or(IngestError::JobNotFound(job_id))?
        };
        let state = rx
            .wait_for(JobState::is_terminal)
            .await
            .map_err(|_| IngestError::JobNotFound(job_id))?;
        Ok(state.clone())
    }

    /// All jobs in submission order
    pub async fn jobs(&self) -> Vec<JobSummary> {
        let jobs = self.inner.jobs.read().await;
        jobs.iter()
            .map(|e| JobSummary {
                job_id: e.job.id,
                prompt: e.job.prompt.clone(),
                state: e.state.borrow().clone(),
                annotation_ids: e.job.annotation_ids.clone(),
            })
            .collect()
    }

    /// Produced annotation ids grouped by prompt, in first submission order
    pub async fn groups(&self) -> Vec<(String, Vec<String>)> {
        let jobs = self.inner.jobs.read().await;
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for entry in jobs.iter() {
            let ids = entry.job.annotation_ids.iter().cloned();
            match groups.iter_mut().find(|(prompt, _)| *prompt == entry.job.prompt) {
                Some((_, group)) => group.extend(ids),
                None => groups.push((entry.job.prompt.clone(), ids.collect())),
            }
        }
        groups
    }

    // ========================================================================
    // Channel handling
    // ========================================================================

    async fn follow(&self, job_id: Uuid, mut stream: BoxStream<'static, ChannelEvent>) {
        while let Some(event) = stream.next().await {
            match event {
                ChannelEvent::Frame(raw) => match serde_json::from_str::<JobMessage>(&raw) {
                    Ok(msg) => {
                        if self.handle(job_id, msg).await {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(job_id = %job_id, error = %e, "Ignoring malformed job message");
                    }
                },
                ChannelEvent::Closed { code, reason } => {
                    if code != NORMAL_CLOSURE {
                        self.fail(job_id, format!("Connection closed unexpectedly ({code}): {reason}"))
                            .await;
                    }
                    break;
                }
            }
        }

        self.fail(job_id, "Connection closed before the job finished".to_string())
            .await;
    }

    /// Apply one message; returns true once the job has nothing left to deliver
    async fn handle(&self, job_id: Uuid, msg: JobMessage) -> bool {
        let (step, format) = {
            let mut jobs = self.inner.jobs.write().await;
            let Some(entry) = jobs.iter_mut().find(|e| e.job.id == job_id) else {
                return true;
            };
            (entry.job.apply(msg), entry.job.format)
        };

        let mut ids = Vec::new();
        if let Some(results) = step.results {
            let annotations = result_annotations(&results, format, self.inner.line_tolerance);
            ids = annotations.iter().map(|a| a.id.clone()).collect();
            tracing::info!(
                job_id = %job_id,
                results = results.len(),
                annotations = annotations.len(),
                "Ingesting auto-annotation results"
            );
            self.inner.store.append(annotations).await;
        }

        let mut jobs = self.inner.jobs.write().await;
        let Some(entry) = jobs.iter_mut().find(|e| e.job.id == job_id) else {
            return true;
        };
        entry.job.annotation_ids.extend(ids);
        entry.state.send_if_modified(|published| {
            if *published == entry.job.state {
                false
            } else {
                *published = entry.job.state.clone();
                true
            }
        });

        if step.completed {
            tracing::info!(job_id = %job_id, annotations = entry.job.annotation_ids.len(), "Auto-annotation job completed");
        }
        if let (true, JobState::Failed { reason }) = (step.failed, &entry.job.state) {
            tracing::warn!(job_id = %job_id, reason = %reason, "Auto-annotation job failed");
        }
        entry.job.is_settled()
    }

    async fn fail(&self, job_id: Uuid, reason: String) {
        let mut jobs = self.inner.jobs.write().await;
        let Some(entry) = jobs.iter_mut().find(|e| e.job.id == job_id) else {
            return;
        };
        if entry.job.fail(reason.clone()) {
            tracing::warn!(job_id = %job_id, reason = %reason, "Auto-annotation job failed");
            entry.state.send_replace(entry.job.state.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::store_tests::MockBackend;
    use crate::annotations::{AnnotationType, StoreEvent};
    use crate::config::StoreConfig;
    use crate::geometry::DEFAULT_LINE_TOLERANCE;
    use async_trait::async_trait;
    use futures::channel::mpsc;
    use parking_lot::Mutex;

    /// Channel whose jobs are driven by the test
    #[derive(Default)]
    struct MockChannel {
        senders: Mutex<Vec<mpsc::UnboundedSender<ChannelEvent>>>,
        refuse: bool,
    }

    impl MockChannel {
        fn frame(&self, job: usize, raw: &str) {
            self.senders.lock()[job]
                .unbounded_send(ChannelEvent::Frame(raw.to_string()))
                .unwrap();
        }

        fn close(&self, job: usize, code: u16, reason: &str) {
            self.senders.lock()[job]
                .unbounded_send(ChannelEvent::Closed {
                    code,
                    reason: reason.to_string(),
                })
                .unwrap();
        }
    }

    #[async_trait]
    impl JobChannel for MockChannel {
        async fn open(&self, _job_id: Uuid, _prompt: &str) -> Result<BoxStream<'static, ChannelEvent>, IngestError> {
            if self.refuse {
                return Err(IngestError::Submit("unauthorized".to_string()));
            }
            let (tx, rx) = mpsc::unbounded();
            self.senders.lock().push(tx);
            Ok(rx.boxed())
        }
    }

    const RESULT: &str = r#"{"text":"due process","type":"holding","bboxes":[{"bbox":[72,100,200,12],"page":2}]}"#;

    fn setup() -> (AutoAnnotationIngestor, Arc<MockChannel>, AnnotationStore) {
        let channel = Arc::new(MockChannel::default());
        let store = AnnotationStore::new(Arc::new(MockBackend::default()), StoreConfig::default());
        let ingestor = AutoAnnotationIngestor::new(channel.clone(), store.clone(), DEFAULT_LINE_TOLERANCE);
        (ingestor, channel, store)
    }

    #[tokio::test]
    async fn test_results_land_in_store() {
        let (ingestor, channel, store) = setup();
        let job = ingestor.submit("find holdings", BboxFormat::Xywh).await.unwrap();
        assert_eq!(ingestor.state(job).await, Some(JobState::Submitted));

        channel.frame(0, r#"{"type":"ack"}"#);
        channel.frame(0, r#"{"type":"connection"}"#);
        channel.frame(0, r#"{"type":"progress","progress":50}"#);
        channel.frame(0, &format!(r#"{{"type":"status","status":"completed","results":[{RESULT}]}}"#));

        assert_eq!(ingestor.wait(job).await.unwrap(), JobState::Completed);

        let annotations = store.annotations().await;
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].page_number, 3);
        assert_eq!(annotations[0].annotation_type, AnnotationType::AutoAnnotate);
        assert!(!annotations[0].refined);

        let jobs = ingestor.jobs().await;
        assert_eq!(jobs[0].annotation_ids, vec![annotations[0].id.clone()]);
    }

    #[tokio::test]
    async fn test_duplicate_completion_ingests_once() {
        let (ingestor, channel, store) = setup();
        let mut events = store.subscribe();
        let job = ingestor.submit("find holdings", BboxFormat::Xywh).await.unwrap();

        let done = format!(r#"{{"type":"progress","progress":100,"results":[{RESULT}]}}"#);
        channel.frame(0, &done);
        channel.frame(0, &done);
        channel.frame(0, r#"{"type":"status","status":"completed"}"#);

        assert_eq!(ingestor.wait(job).await.unwrap(), JobState::Completed);
        tokio::task::yield_now().await;

        assert_eq!(store.annotations().await.len(), 1);
        let mut ingested = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, StoreEvent::Ingested { .. }) {
                ingested += 1;
            }
        }
        assert_eq!(ingested, 1);
    }

    #[tokio::test]
    async fn test_bad_entries_do_not_drop_completion() {
        let (ingestor, channel, store) = setup();
        let job = ingestor.submit("find holdings", BboxFormat::Xywh).await.unwrap();

        channel.frame(
            0,
            &format!(
                r#"{{"type":"progress","progress":100,"results":[
                    {RESULT},
                    {{"text":"odd","bboxes":[{{"bbox":[1,2,3,4],"page":"1","char_start":-1}}]}},
                    {{"bboxes":[{{"bbox":[1,2,3,4],"page":0}}]}}
                ]}}"#
            ),
        );
        channel.close(0, NORMAL_CLOSURE, "done");

        assert_eq!(ingestor.wait(job).await.unwrap(), JobState::Completed);
        let annotations = store.annotations().await;
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].text_selected, "due process");
    }

    #[tokio::test]
    async fn test_abnormal_close_fails_and_keeps_results() {
        let (ingestor, channel, store) = setup();
        let first = ingestor.submit("find holdings", BboxFormat::Xywh).await.unwrap();
        // Second prompt while the first is still running
        let second = ingestor.submit("find dicta", BboxFormat::Xywh).await.unwrap();

        channel.frame(0, &format!(r#"{{"type":"progress","progress":100,"results":[{RESULT}]}}"#));
        assert_eq!(ingestor.wait(first).await.unwrap(), JobState::Completed);

        channel.frame(1, r#"{"type":"ack"}"#);
        channel.frame(1, "not json");
        channel.close(1, 1006, "network lost");

        match ingestor.wait(second).await.unwrap() {
            JobState::Failed { reason } => assert!(reason.contains("1006"), "{reason}"),
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(store.annotations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stream_end_without_completion_fails() {
        let (ingestor, channel, _store) = setup();
        let job = ingestor.submit("find holdings", BboxFormat::Xywh).await.unwrap();

        channel.frame(0, r#"{"type":"connection"}"#);
        channel.senders.lock().clear();

        assert!(matches!(ingestor.wait(job).await.unwrap(), JobState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_refused_submit() {
        let channel = Arc::new(MockChannel {
            refuse: true,
            ..Default::default()
        });
        let store = AnnotationStore::new(Arc::new(MockBackend::default()), StoreConfig::default());
        let ingestor = AutoAnnotationIngestor::new(channel, store, DEFAULT_LINE_TOLERANCE);

        assert!(matches!(
            ingestor.submit("find holdings", BboxFormat::Xywh).await,
            Err(IngestError::Submit(_))
        ));
        assert!(matches!(ingestor.jobs().await[0].state, JobState::Failed { .. }));
        assert!(matches!(ingestor.submit("  ", BboxFormat::Xywh).await, Err(IngestError::EmptyPrompt)));
    }

    #[tokio::test]
    async fn test_groups_by_prompt() {
        let (ingestor, channel, _store) = setup();
        let a = ingestor.submit("find holdings", BboxFormat::Xywh).await.unwrap();
        let b = ingestor.submit("find holdings", BboxFormat::Xywh).await.unwrap();
        let done = format!(r#"{{"type":"progress","progress":100,"results":[{RESULT}]}}"#);
        channel.frame(0, &done);
        channel.frame(1, &done);
        ingestor.wait(a).await.unwrap();
        ingestor.wait(b).await.unwrap();

        let groups = ingestor.groups().await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, "find holdings");
        assert_eq!(groups[0].1.len(), 2);
    }
}
