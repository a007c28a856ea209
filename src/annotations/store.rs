//! In-memory annotation store with optimistic persistence
//!
//! Every mutation is applied locally first and announced to subscribers; the
//! persistence request runs in a spawned task. Annotations created locally get
//! a temporary id until the backend confirms them. Edits made in the meantime
//! are queued in a pending-operation table keyed by the temporary id and
//! replayed against the server id when the create resolves.
//!
//! Requests for a server id go through a per-id outbox drained by one task at
//! a time, so the backend sees them in the order they were made.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

use crate::config::StoreConfig;

use super::record::AnnotationRecord;
use super::types::{is_temp_id, temp_id, Annotation, AnnotationDraft, AnnotationPatch};

// ============================================================================
// Errors and events
// ============================================================================

/// Store errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Annotation not found: {0}")]
    NotFound(String),

    #[error("Comment index {index} out of range for annotation {id}")]
    CommentIndex { id: String, index: usize },

    #[error("Annotation {0} has no failed create to retry")]
    NotRetryable(String),

    #[error("Persistence error: {0}")]
    Backend(String),
}

/// Persistence operation that produced an error event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Change notifications sent to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Created { id: String },
    Updated { id: String },
    Deleted { id: String },
    /// A temporary id was replaced by the server id
    Remapped { temp_id: String, id: String },
    /// Annotations on a page got new geometry from the re-anchor matcher
    Refined { page_number: u32, ids: Vec<String> },
    /// Annotations appended from an auto-annotation job
    Ingested { ids: Vec<String> },
    /// A persistence request failed; local state is kept
    Error {
        id: String,
        operation: Operation,
        message: String,
    },
}

// ============================================================================
// Persistence seam
// ============================================================================

/// Persistence collaborator
#[async_trait]
pub trait AnnotationBackend: Send + Sync {
    /// Persist a new annotation and return its server id
    async fn create(&self, record: &AnnotationRecord) -> Result<String, StoreError>;

    async fn update(&self, id: &str, patch: &AnnotationPatch) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingStatus {
    InFlight,
    Failed,
}

/// Create request that has not been confirmed yet
#[derive(Debug)]
struct PendingCreate {
    status: PendingStatus,
    queued: Vec<AnnotationPatch>,
    /// Deleted locally before the server id arrived
    deleted: bool,
}

/// Backend request waiting in an outbox
#[derive(Debug)]
enum Outgoing {
    Update(AnnotationPatch),
    Delete,
}

#[derive(Debug, Default)]
struct Outbox {
    queue: VecDeque<Outgoing>,
    /// A drain task owns this outbox
    draining: bool,
}

#[derive(Default)]
struct StoreState {
    annotations: Vec<Annotation>,
    pending: HashMap<String, PendingCreate>,
    /// Temporary id -> server id, for callers still holding the old id
    aliases: HashMap<String, String>,
    outbox: HashMap<String, Outbox>,
}

impl StoreState {
    fn resolve(&self, id: &str) -> String {
        self.aliases.get(id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.annotations.iter().position(|a| a.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Annotation> {
        self.annotations.iter_mut().find(|a| a.id == id)
    }

    /// Queue a request for a server id; true when a drain task must be started
    fn enqueue(&mut self, id: &str, request: Outgoing) -> bool {
        let outbox = self.outbox.entry(id.to_string()).or_default();
        outbox.queue.push_back(request);
        !std::mem::replace(&mut outbox.draining, true)
    }
}

/// Shared annotation store handle
#[derive(Clone)]
pub struct AnnotationStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: RwLock<StoreState>,
    backend: Arc<dyn AnnotationBackend>,
    events: broadcast::Sender<StoreEvent>,
    config: StoreConfig,
}

impl AnnotationStore {
    /// Create an empty store writing through `backend`
    pub fn new(backend: Arc<dyn AnnotationBackend>, config: StoreConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState::default()),
                backend,
                events,
                config,
            }),
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Snapshot of all annotations in insertion order
    pub async fn annotations(&self) -> Vec<Annotation> {
        self.inner.state.read().await.annotations.clone()
    }

    /// Get an annotation by current or temporary id
    pub async fn get(&self, id: &str) -> Option<Annotation> {
        let state = self.inner.state.read().await;
        let id = state.resolve(id);
        state.annotations.iter().find(|a| a.id == id).cloned()
    }

    /// Annotations on one page
    pub async fn on_page(&self, page_number: u32) -> Vec<Annotation> {
        self.inner
            .state
            .read()
            .await
            .annotations
            .iter()
            .filter(|a| a.page_number == page_number)
            .cloned()
            .collect()
    }

    /// Current id for a possibly temporary id
    pub async fn resolve_id(&self, id: &str) -> String {
        self.inner.state.read().await.resolve(id)
    }

    // ========================================================================
    // Loading and bulk changes
    // ========================================================================

    /// Replace the store content with records from persistence
    pub async fn load(&self, records: Vec<AnnotationRecord>) {
        let annotations: Vec<_> = records.into_iter().map(AnnotationRecord::into_annotation).collect();
        let count = annotations.len();
        {
            let mut state = self.inner.state.write().await;
            state.annotations = annotations;
            state.pending.clear();
            state.aliases.clear();
        }
        tracing::info!(count = count, "Loaded annotations");
    }

    /// Append annotations that are already persisted elsewhere
    pub async fn append(&self, annotations: Vec<Annotation>) {
        if annotations.is_empty() {
            return;
        }
        let ids: Vec<String> = annotations.iter().map(|a| a.id.clone()).collect();
        self.inner.state.write().await.annotations.extend(annotations);
        self.emit(StoreEvent::Ingested { ids });
    }

    /// Run `f` over the annotations of one page under the write lock
    ///
    /// `f` returns the ids whose geometry it changed; a `Refined` event is sent
    /// when the list is not empty.
    pub async fn refine_page<F>(&self, page_number: u32, f: F) -> Vec<String>
    where
        F: FnOnce(Vec<&mut Annotation>) -> Vec<String>,
    {
        let changed = {
            let mut state = self.inner.state.write().await;
            let page: Vec<&mut Annotation> = state
                .annotations
                .iter_mut()
                .filter(|a| a.page_number == page_number)
                .collect();
            f(page)
        };

        if !changed.is_empty() {
            self.emit(StoreEvent::Refined {
                page_number,
                ids: changed.clone(),
            });
        }
        changed
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create an annotation optimistically
    ///
    /// The returned annotation carries a temporary id. The create request runs
    /// in the background; a `Remapped` or `Error` event reports its outcome.
    pub async fn create(&self, draft: AnnotationDraft) -> Annotation {
        let annotation = draft.into_annotation(temp_id(), &self.inner.config.created_by);
        let record = AnnotationRecord::from(&annotation);

        {
            let mut state = self.inner.state.write().await;
            state.annotations.push(annotation.clone());
            state.pending.insert(
                annotation.id.clone(),
                PendingCreate {
                    status: PendingStatus::InFlight,
                    queued: Vec::new(),
                    deleted: false,
                },
            );
        }

        tracing::debug!(id = %annotation.id, page = annotation.page_number, "Created annotation");
        self.emit(StoreEvent::Created {
            id: annotation.id.clone(),
        });
        self.spawn_create(annotation.id.clone(), record);

        annotation
    }

    /// Re-send a create that failed
    pub async fn retry_create(&self, temp_id: &str) -> Result<(), StoreError> {
        let record = {
            let mut state = self.inner.state.write().await;
            let annotation = state
                .annotations
                .iter()
                .find(|a| a.id == temp_id)
                .map(AnnotationRecord::from)
                .ok_or_else(|| StoreError::NotFound(temp_id.to_string()))?;

            match state.pending.get_mut(temp_id) {
                Some(pending) if pending.status == PendingStatus::Failed => {
                    // The record already carries every local edit
                    pending.status = PendingStatus::InFlight;
                    pending.queued.clear();
                }
                _ => return Err(StoreError::NotRetryable(temp_id.to_string())),
            }
            annotation
        };

        tracing::info!(id = %temp_id, "Retrying annotation create");
        self.spawn_create(temp_id.to_string(), record);
        Ok(())
    }

    fn spawn_create(&self, temp_id: String, record: AnnotationRecord) {
        let store = self.clone();
        tokio::spawn(async move {
            let result = store.inner.backend.create(&record).await;
            store.finish_create(temp_id, result).await;
        });
    }

    async fn finish_create(&self, temp_id: String, result: Result<String, StoreError>) {
        let server_id = match result {
            Ok(id) => id,
            Err(e) => {
                let still_wanted = {
                    let mut state = self.inner.state.write().await;
                    match state.pending.get(&temp_id).map(|p| p.deleted) {
                        Some(true) => {
                            state.pending.remove(&temp_id);
                            false
                        }
                        Some(false) => {
                            if let Some(pending) = state.pending.get_mut(&temp_id) {
                                pending.status = PendingStatus::Failed;
                            }
                            true
                        }
                        None => false,
                    }
                };
                if still_wanted {
                    tracing::warn!(id = %temp_id, error = %e, "Annotation create failed");
                    self.emit(StoreEvent::Error {
                        id: temp_id,
                        operation: Operation::Create,
                        message: e.to_string(),
                    });
                }
                return;
            }
        };

        // Swap the key and move the queued edits to the outbox in one critical
        // section, ahead of anything sent under the server id afterwards
        let (queued, start) = {
            let mut state = self.inner.state.write().await;
            let Some(pending) = state.pending.remove(&temp_id) else {
                return;
            };
            state.aliases.insert(temp_id.clone(), server_id.clone());
            if let Some(annotation) = state.get_mut(&temp_id) {
                annotation.id = server_id.clone();
            }

            let queued = pending.queued.len();
            let requests: Vec<Outgoing> = if pending.deleted {
                vec![Outgoing::Delete]
            } else {
                pending.queued.into_iter().map(Outgoing::Update).collect()
            };
            let mut start = false;
            for request in requests {
                start |= state.enqueue(&server_id, request);
            }
            (queued, start)
        };

        tracing::debug!(temp_id = %temp_id, id = %server_id, queued = queued, "Annotation persisted");
        self.emit(StoreEvent::Remapped {
            temp_id,
            id: server_id.clone(),
        });

        if start {
            self.spawn_drain(server_id);
        }
    }

    fn spawn_drain(&self, id: String) {
        let store = self.clone();
        tokio::spawn(async move { store.drain(&id).await });
    }

    /// Send the outbox of `id` one request at a time until it is empty
    async fn drain(&self, id: &str) {
        loop {
            let next = {
                let mut state = self.inner.state.write().await;
                let next = state.outbox.get_mut(id).and_then(|o| o.queue.pop_front());
                if next.is_none() {
                    state.outbox.remove(id);
                }
                next
            };
            let Some(request) = next else {
                return;
            };

            match request {
                Outgoing::Update(patch) => {
                    if let Err(e) = self.inner.backend.update(id, &patch).await {
                        self.report(id, Operation::Update, e);
                    }
                }
                Outgoing::Delete => {
                    if let Err(e) = self.inner.backend.delete(id).await {
                        self.report(id, Operation::Delete, e);
                    }
                }
            }
        }
    }

    fn report(&self, id: &str, operation: Operation, error: StoreError) {
        tracing::warn!(id = %id, operation = ?operation, error = %error, "Annotation sync failed");
        self.emit(StoreEvent::Error {
            id: id.to_string(),
            operation,
            message: error.to_string(),
        });
    }

    /// Apply an edit locally, then persist it
    ///
    /// Edits to a temporary id are queued until the server id is known.
    pub async fn update(&self, id: &str, patch: AnnotationPatch) -> Result<Annotation, StoreError> {
        self.modify(id, |_| Ok(patch)).await
    }

    /// Build a patch from the current annotation and apply it under one lock
    async fn modify<F>(&self, id: &str, make_patch: F) -> Result<Annotation, StoreError>
    where
        F: FnOnce(&Annotation) -> Result<AnnotationPatch, StoreError>,
    {
        let (updated, start) = {
            let mut state = self.inner.state.write().await;
            let id = state.resolve(id);
            let annotation = state
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            let patch = make_patch(&*annotation)?;
            annotation.apply(&patch);
            let updated = annotation.clone();

            let start = match state.pending.get_mut(&id) {
                Some(pending) => {
                    pending.queued.push(patch);
                    false
                }
                None if is_temp_id(&id) => false,
                None => state.enqueue(&id, Outgoing::Update(patch)),
            };
            (updated, start)
        };

        self.emit(StoreEvent::Updated {
            id: updated.id.clone(),
        });

        if start {
            self.spawn_drain(updated.id.clone());
        }

        Ok(updated)
    }

    /// Remove an annotation locally and request its deletion
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let (id, start) = {
            let mut state = self.inner.state.write().await;
            let id = state.resolve(id);
            let index = state
                .position(&id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            state.annotations.remove(index);

            let start = match state.pending.get(&id).map(|p| p.status) {
                Some(PendingStatus::InFlight) => {
                    if let Some(pending) = state.pending.get_mut(&id) {
                        pending.deleted = true;
                    }
                    false
                }
                Some(PendingStatus::Failed) => {
                    // Never reached the server
                    state.pending.remove(&id);
                    false
                }
                None if is_temp_id(&id) => false,
                None => state.enqueue(&id, Outgoing::Delete),
            };
            (id, start)
        };

        self.emit(StoreEvent::Deleted { id: id.clone() });

        if start {
            self.spawn_drain(id);
        }
        Ok(())
    }

    /// Append a comment
    pub async fn add_comment(&self, id: &str, comment: &str) -> Result<Annotation, StoreError> {
        self.modify(id, |annotation| {
            let mut comments = annotation.comments.clone();
            comments.push(comment.to_string());
            Ok(AnnotationPatch::comments(comments))
        })
        .await
    }

    /// Remove the comment at `index`
    pub async fn remove_comment(&self, id: &str, index: usize) -> Result<Annotation, StoreError> {
        self.modify(id, |annotation| {
            if index >= annotation.comments.len() {
                return Err(StoreError::CommentIndex {
                    id: id.to_string(),
                    index,
                });
            }
            let mut comments = annotation.comments.clone();
            comments.remove(index);
            Ok(AnnotationPatch::comments(comments))
        })
        .await
    }
}
