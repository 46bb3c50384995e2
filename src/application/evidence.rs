use crate::domain::evidence::{EvidenceId, EvidenceItem, EvidenceStatus, LocalFile};
use crate::domain::ports::{PreviewRendererBox, UploadServiceRef};
use crate::error::{Result, RoutingError, ServiceError};
use std::collections::HashMap;
use tokio::task::{AbortHandle, Id, JoinError, JoinSet};

type UploadResult = (EvidenceId, std::result::Result<String, ServiceError>);

/// Result of offering a batch of files to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddFilesOutcome {
    pub accepted: Vec<EvidenceId>,
    /// Set when the batch was truncated to the remaining slots.
    pub limit_exceeded: bool,
}

/// Uploads proof-of-payment files concurrently and keeps the order's evidence list.
///
/// Every upload is an independent task in a [`JoinSet`]. Results are matched back
/// to items by [`EvidenceId`], never by position, so an item removed while its
/// upload is in flight simply has its result discarded.
///
/// Preview handles are released exactly once: when the upload is confirmed,
/// when the item is removed, or when the coordinator is reset or dropped.
pub struct EvidenceUploadCoordinator {
    uploader: UploadServiceRef,
    previews: PreviewRendererBox,
    max_count: usize,
    next_id: u64,
    items: Vec<EvidenceItem>,
    evidence: Vec<String>,
    tasks: JoinSet<UploadResult>,
    task_items: HashMap<Id, EvidenceId>,
    aborts: HashMap<EvidenceId, AbortHandle>,
}

impl EvidenceUploadCoordinator {
    pub fn new(uploader: UploadServiceRef, previews: PreviewRendererBox, max_count: usize) -> Self {
        Self {
            uploader,
            previews,
            max_count,
            next_id: 0,
            items: Vec::new(),
            evidence: Vec::new(),
            tasks: JoinSet::new(),
            task_items: HashMap::new(),
            aborts: HashMap::new(),
        }
    }

    pub fn items(&self) -> &[EvidenceItem] {
        &self.items
    }

    /// Remote URLs of every confirmed upload, in completion order.
    pub fn evidence_urls(&self) -> &[String] {
        &self.evidence
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Item-scoped errors of failed uploads.
    pub fn errors(&self) -> Vec<RoutingError> {
        self.items
            .iter()
            .filter_map(|item| match &item.status {
                EvidenceStatus::Failed { error } => Some(RoutingError::Upload {
                    item: item.id.0,
                    message: error.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Accepts up to the remaining slots from `files` and starts their uploads.
    ///
    /// Accepted items are `Queued` until their upload task is spawned. Outside a
    /// Tokio runtime they stay queued until the next `poll_completed` or
    /// `wait_all`.
    pub fn add_files(&mut self, files: Vec<LocalFile>) -> AddFilesOutcome {
        let occupied = self.items.iter().filter(|i| i.occupies_slot()).count();
        let remaining = self.max_count.saturating_sub(occupied);
        let limit_exceeded = files.len() > remaining;
        if limit_exceeded {
            tracing::warn!(
                offered = files.len(),
                remaining,
                max = self.max_count,
                "evidence limit exceeded, batch truncated"
            );
        }

        let mut accepted = Vec::new();
        for file in files.into_iter().take(remaining) {
            let id = EvidenceId(self.next_id);
            self.next_id += 1;
            let preview = self.previews.create(&file);
            self.items.push(EvidenceItem {
                id,
                file,
                preview: Some(preview),
                status: EvidenceStatus::Queued,
            });
            accepted.push(id);
        }

        let started = self.dispatch_queued();
        tracing::debug!(accepted = accepted.len(), started, "evidence files accepted");
        AddFilesOutcome {
            accepted,
            limit_exceeded,
        }
    }

    /// Spawns an upload for every queued item. Returns how many were started.
    fn dispatch_queued(&mut self) -> usize {
        if tokio::runtime::Handle::try_current().is_err() {
            return 0;
        }

        let mut started = 0;
        for item in self
            .items
            .iter_mut()
            .filter(|i| i.status == EvidenceStatus::Queued)
        {
            let id = item.id;
            let uploader = self.uploader.clone();
            let file = item.file.clone();
            let abort = self.tasks.spawn(async move {
                let result = uploader.upload(&file).await;
                (id, result)
            });
            self.task_items.insert(abort.id(), id);
            self.aborts.insert(id, abort);
            item.status = EvidenceStatus::Uploading;
            started += 1;
        }
        started
    }

    /// Applies every upload that has already finished, without waiting.
    pub fn poll_completed(&mut self) -> usize {
        self.dispatch_queued();
        let mut applied = 0;
        while let Some(joined) = self.tasks.try_join_next_with_id() {
            self.absorb(joined);
            applied += 1;
        }
        applied
    }

    /// Waits for every outstanding upload.
    pub async fn wait_all(&mut self) {
        self.dispatch_queued();
        while let Some(joined) = self.tasks.join_next_with_id().await {
            self.absorb(joined);
        }
    }

    /// Removes the item at display position `index`.
    pub fn remove_item(&mut self, index: usize) -> Result<EvidenceId> {
        if index >= self.items.len() {
            return Err(RoutingError::Validation(format!(
                "No evidence item at position {}",
                index
            )));
        }
        let mut item = self.items.remove(index);

        if let Some(abort) = self.aborts.remove(&item.id) {
            abort.abort();
        }
        if let Some(preview) = item.preview.take() {
            self.previews.release(preview);
        }
        if let Some(url) = item.remote_url()
            && let Some(pos) = self.evidence.iter().position(|u| u == url)
        {
            self.evidence.remove(pos);
        }

        tracing::debug!(item = %item.id, "evidence item removed");
        Ok(item.id)
    }

    /// Drops every item, aborts outstanding uploads and clears the evidence list.
    pub fn reset(&mut self) {
        self.tasks.abort_all();
        self.tasks = JoinSet::new();
        self.task_items.clear();
        self.aborts.clear();
        for mut item in self.items.drain(..) {
            if let Some(preview) = item.preview.take() {
                self.previews.release(preview);
            }
        }
        self.evidence.clear();
    }

    fn absorb(&mut self, joined: std::result::Result<(Id, UploadResult), JoinError>) {
        match joined {
            Ok((task_id, (id, result))) => {
                self.task_items.remove(&task_id);
                self.aborts.remove(&id);
                self.complete(id, result);
            }
            Err(err) => {
                let Some(id) = self.task_items.remove(&err.id()) else {
                    return;
                };
                self.aborts.remove(&id);
                if err.is_panic() {
                    self.complete(id, Err(ServiceError::network("upload task panicked")));
                }
            }
        }
    }

    fn complete(&mut self, id: EvidenceId, result: std::result::Result<String, ServiceError>) {
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            tracing::debug!(item = %id, "discarding upload result for removed item");
            return;
        };

        match result {
            Ok(url) => {
                if let Some(preview) = item.preview.take() {
                    self.previews.release(preview);
                }
                self.evidence.push(url.clone());
                item.status = EvidenceStatus::Uploaded { url };
            }
            Err(err) => {
                tracing::warn!(item = %id, path = %item.file.path.display(), error = %err, "evidence upload failed");
                item.status = EvidenceStatus::Failed {
                    error: err.message,
                };
            }
        }
    }
}

impl Drop for EvidenceUploadCoordinator {
    fn drop(&mut self) {
        self.reset();
    }
}
