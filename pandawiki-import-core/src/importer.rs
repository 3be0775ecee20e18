//! Import orchestration: upload → parse → export/poll → create node.
//!
//! [`Importer`] drives every [`ImportItem`] of a session through the import
//! state machine against a [`WikiApi`] backend:
//!   - Uploads file payloads through the bounded [`TaskQueue`], reporting byte progress
//!   - Parses uploaded files or crawled URLs through the same queue, flattening
//!     multi-document results into parent-referencing items
//!   - Imports parsed items strictly in list order, so folders exist before
//!     their children are created under them
//!
//! # Error Handling
//! No stage failure aborts the session. Every per-item failure is written back
//! into the item as an error status with a message (see [`ItemStatus`]), and
//! the remaining items carry on. Retries re-select items by status.
//!
//! # Navigation
//! - Main entrypoint: [`Importer::run`]
//! - Individual stages: [`Importer::upload_pending`], [`Importer::parse_pending`],
//!   [`Importer::import_ready`]
//! - Retries: [`Importer::retry_failed`], [`Importer::retry_uploads`]
//! - Cancellation: [`Importer::cancel`], [`Importer::close`]

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ImportConfig, ImportSource};
use crate::contract::{
    ExportRequest, NewNode, NodeType, ParseRequest, ProgressFn, UploadFile, WikiApi,
};
use crate::error::{ImportError, QueueError, Result};
use crate::flatten::{flatten_parse_result, ItemOverrides};
use crate::id_resolver::IdResolver;
use crate::item::{DisplayText, ImportItem, ItemStatus};
use crate::poller::wait_for_completion;
use crate::queue::TaskQueue;
use crate::store::ImportList;

/// Counts of a queued stage (upload or parse).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

impl StageOutcome {
    fn from_results(results: Vec<std::result::Result<bool, QueueError>>) -> Self {
        results.into_iter().fold(Self::default(), |mut outcome, result| {
            match result {
                Ok(true) => outcome.succeeded += 1,
                Ok(false) => outcome.failed += 1,
                Err(e) => {
                    warn!(error = %e, "[IMPORT] Queued task did not complete");
                    outcome.failed += 1;
                }
            }
            outcome
        })
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: Vec<ImportedNodeReport>,
    pub failed: Vec<FailedItemReport>,
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportedNodeReport {
    pub uuid: Uuid,
    pub title: String,
    pub node_id: String,
    pub node_type: NodeType,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedItemReport {
    pub uuid: Uuid,
    pub title: String,
    pub status: ItemStatus,
    pub message: String,
}

impl From<&ImportItem> for FailedItemReport {
    fn from(item: &ImportItem) -> Self {
        Self {
            uuid: item.uuid,
            title: item.title.clone(),
            status: item.status,
            message: item.display.as_str().to_string(),
        }
    }
}

/// Drives one import session.
pub struct Importer<A: WikiApi + ?Sized + 'static> {
    api: Arc<A>,
    config: ImportConfig,
    queue: TaskQueue,
    list: ImportList,
    /// Items already handed to the upload stage.
    uploaded: Mutex<HashSet<Uuid>>,
}

impl<A: WikiApi + ?Sized + 'static> Importer<A> {
    pub fn new(api: Arc<A>, config: ImportConfig) -> Self {
        let queue = TaskQueue::new(config.max_concurrency);
        Self {
            api,
            config,
            queue,
            list: ImportList::new(),
            uploaded: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn list(&self) -> &ImportList {
        &self.list
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn add_items(&self, items: Vec<ImportItem>) -> Vec<Uuid> {
        debug!(count = items.len(), "[IMPORT] Adding items");
        self.list.push(items)
    }

    pub fn add_files(&self, files: Vec<UploadFile>) -> Vec<Uuid> {
        self.add_items(
            files
                .into_iter()
                .map(|f| ImportItem::from_file(f.filename, f.data))
                .collect(),
        )
    }

    pub fn add_urls(&self, urls: Vec<String>) -> Vec<Uuid> {
        self.add_items(urls.into_iter().map(ImportItem::from_url).collect())
    }

    /// Full pipeline: upload (if any item carries a payload), parse, import.
    ///
    /// The report lists every node created and every item left in an error state.
    pub async fn run(&self) -> ImportReport {
        info!(
            kb_id = %self.config.kb_id,
            source = ?self.config.source,
            items = self.list.len(),
            "[IMPORT] Starting import session"
        );

        self.prepare().await;
        let mut report = self.import_ready().await;
        report.failed = self.failures();

        info!(
            imported = report.imported.len(),
            failed = report.failed.len(),
            "[IMPORT] Import session finished"
        );
        report
    }

    /// Upload and parse without creating any node.
    pub async fn prepare(&self) -> StageOutcome {
        let uploads = if self.list.snapshot().iter().any(|i| i.file_data.is_some()) {
            self.upload_pending().await
        } else {
            StageOutcome::default()
        };
        let parses = self.parse_pending().await;

        StageOutcome {
            succeeded: parses.succeeded,
            failed: uploads.failed + parses.failed,
        }
    }

    /// Upload every `common` item with a payload that has not been handed to
    /// the upload stage yet.
    pub async fn upload_pending(&self) -> StageOutcome {
        let candidates: Vec<ImportItem> = self
            .list
            .snapshot()
            .into_iter()
            .filter(|item| item.status == ItemStatus::Common && item.file_data.is_some())
            .filter(|item| self.claim_upload(item.uuid))
            .collect();

        if candidates.is_empty() {
            return StageOutcome::default();
        }
        info!(count = candidates.len(), "[IMPORT][UPLOAD] Uploading files");

        let uuids: Vec<Uuid> = candidates.iter().map(|item| item.uuid).collect();
        let handles: Vec<_> = candidates
            .into_iter()
            .map(|item| {
                let api = self.api.clone();
                let list = self.list.clone();
                self.queue.enqueue(move || upload_item(api, list, item))
            })
            .collect();

        let results = join_all(handles).await;
        for (&uuid, result) in uuids.iter().zip(&results) {
            if let Err(e) = result {
                // Never started or never finished: make it retryable.
                self.list.update(uuid, |i| i.progress = 0);
                self.list.transition(
                    uuid,
                    ItemStatus::UploadError,
                    Some(DisplayText::Error(e.to_string())),
                );
                self.release_upload(uuid);
            }
        }
        let outcome = StageOutcome::from_results(results);
        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            "[IMPORT][UPLOAD] Upload stage finished"
        );
        outcome
    }

    /// Parse every `common` item that has something to parse: an uploaded
    /// file's storage key or a URL.
    pub async fn parse_pending(&self) -> StageOutcome {
        let uuids: Vec<Uuid> = self
            .list
            .snapshot()
            .iter()
            .filter(|item| item.status == ItemStatus::Common && !item.id.is_empty())
            .map(|item| item.uuid)
            .collect();
        self.parse_items(&uuids).await
    }

    /// Parse the given items through the queue.
    pub async fn parse_items(&self, uuids: &[Uuid]) -> StageOutcome {
        let mut queued = Vec::with_capacity(uuids.len());
        let mut handles = Vec::with_capacity(uuids.len());

        for &uuid in uuids {
            if !self.list.transition(uuid, ItemStatus::Parsing, None) {
                continue;
            }
            let Some(item) = self.list.get(uuid) else {
                continue;
            };

            let api = self.api.clone();
            let list = self.list.clone();
            let source = self.config.source;
            let kb_id = self.config.kb_id.clone();
            queued.push(uuid);
            handles.push(
                self.queue
                    .enqueue(move || parse_item(api, list, source, kb_id, item)),
            );
        }

        if handles.is_empty() {
            return StageOutcome::default();
        }
        info!(count = handles.len(), "[IMPORT][PARSE] Parsing items");

        let results = join_all(handles).await;
        for (&uuid, result) in queued.iter().zip(&results) {
            if let Err(e) = result {
                self.list.transition(
                    uuid,
                    ItemStatus::ParseError,
                    Some(DisplayText::Error(e.to_string())),
                );
            }
        }
        let outcome = StageOutcome::from_results(results);
        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            "[IMPORT][PARSE] Parse stage finished"
        );
        outcome
    }

    /// Import every `parsed` or `import-error` item, one at a time in list
    /// order. Folders are created first and their new node ids are
    /// propagated to the children still waiting.
    pub async fn import_ready(&self) -> ImportReport {
        let candidates: Vec<Uuid> = self
            .list
            .snapshot()
            .iter()
            .filter(|item| item.is_import_candidate())
            .map(|item| item.uuid)
            .collect();

        let mut report = ImportReport::default();
        if candidates.is_empty() {
            return report;
        }
        info!(count = candidates.len(), "[IMPORT][CREATE] Importing items");

        let mut resolver = IdResolver::new();

        for uuid in candidates {
            // Re-read: an earlier folder may have rewritten this item's parent.
            let Some(item) = self.list.get(uuid) else {
                continue;
            };
            if !self.list.transition(uuid, ItemStatus::Importing, None) {
                continue;
            }

            let parent_id = match &item.parent_id {
                Some(parent) => Some(resolver.resolve(parent).to_string()),
                None => self.config.parent_id.clone(),
            };

            let node_type = if item.file {
                NodeType::Document
            } else {
                NodeType::Folder
            };
            let created = match node_type {
                NodeType::Folder => self.import_folder(&item, parent_id, &mut resolver).await,
                NodeType::Document => self.import_document(&item, parent_id).await,
            };

            match created {
                Ok(node_id) => {
                    info!(uuid = %uuid, title = %item.title, node_id = %node_id, "[IMPORT][CREATE] Item imported");
                    self.list.transition(uuid, ItemStatus::Imported, None);
                    report.imported.push(ImportedNodeReport {
                        uuid,
                        title: item.title.clone(),
                        node_id,
                        node_type,
                    });
                }
                Err(e) => {
                    error!(uuid = %uuid, title = %item.title, error = %e, "[IMPORT][CREATE][ERROR] Item import failed");
                    let message = e.to_string();
                    self.list.transition(
                        uuid,
                        ItemStatus::ImportError,
                        Some(DisplayText::Error(message.clone())),
                    );
                    report.failed.push(FailedItemReport {
                        uuid,
                        title: item.title.clone(),
                        status: ItemStatus::ImportError,
                        message,
                    });
                }
            }
        }

        report
    }

    /// Re-parse `parse-error` items, then re-import everything importable.
    pub async fn retry_failed(&self) -> ImportReport {
        let parse_errors: Vec<Uuid> = self
            .list
            .with_status(ItemStatus::ParseError)
            .iter()
            .map(|item| item.uuid)
            .collect();
        if !parse_errors.is_empty() {
            info!(count = parse_errors.len(), "[IMPORT][RETRY] Re-parsing failed items");
            self.parse_items(&parse_errors).await;
        }
        self.import_ready().await
    }

    /// Put `upload-error` items back to `common` and upload them again.
    pub async fn retry_uploads(&self) -> StageOutcome {
        for item in self.list.with_status(ItemStatus::UploadError) {
            if self
                .list
                .transition(item.uuid, ItemStatus::Common, Some(DisplayText::default()))
            {
                self.release_upload(item.uuid);
            }
        }
        self.upload_pending().await
    }

    /// Drop queued upload and parse work that has not started. Calls already
    /// in flight finish and still record their outcome. Dropped items end in
    /// `upload-error` or `parse-error`, where the retry methods find them.
    pub fn cancel(&self) -> usize {
        let dropped = self.queue.clear_queue();
        info!(dropped, "[IMPORT] Cancelled pending work");
        dropped
    }

    /// Close the session: cancel queued work and forget every item. Calls
    /// already in flight still finish, their results land nowhere.
    pub fn close(&self) {
        self.cancel();
        info!("[IMPORT] Closing import session");
        self.list.clear();
        self.lock_uploaded().clear();
    }

    /// Items currently in an error state.
    pub fn failures(&self) -> Vec<FailedItemReport> {
        self.list
            .snapshot()
            .iter()
            .filter(|item| item.status.is_error())
            .map(FailedItemReport::from)
            .collect()
    }

    async fn import_folder(
        &self,
        item: &ImportItem,
        parent_id: Option<String>,
        resolver: &mut IdResolver,
    ) -> Result<String> {
        let created = self
            .api
            .create_node(NewNode {
                name: item.title.clone(),
                content: String::new(),
                parent_id,
                node_type: NodeType::Folder,
                kb_id: self.config.kb_id.clone(),
            })
            .await?;

        resolver.record(item.id.clone(), created.id.clone());

        let old_id = item.id.as_str();
        let new_id = created.id.as_str();
        self.list.update_all(|pending| {
            if pending.status != ItemStatus::Imported && pending.parent_id.as_deref() == Some(old_id) {
                pending.parent_id = Some(new_id.to_string());
            }
        });

        Ok(created.id)
    }

    async fn import_document(&self, item: &ImportItem, parent_id: Option<String>) -> Result<String> {
        let export = self
            .api
            .export(ExportRequest {
                platform_id: item.platform_id.clone(),
                doc_id: item.id.clone(),
                kb_id: self.config.kb_id.clone(),
                space_id: item.space_id.clone(),
                file_type: (!item.file_type.is_empty()).then(|| item.file_type.clone()),
            })
            .await?;

        let task_id = export.task_id;
        self.list
            .update(item.uuid, |i| i.task_id = Some(task_id.clone()));
        debug!(uuid = %item.uuid, task_id = %task_id, "[IMPORT][CREATE] Export started, polling");

        let content = wait_for_completion(self.api.as_ref(), &task_id, &self.config.poll).await?;

        let created = self
            .api
            .create_node(NewNode {
                name: item.title.clone(),
                content,
                parent_id,
                node_type: NodeType::Document,
                kb_id: self.config.kb_id.clone(),
            })
            .await?;

        Ok(created.id)
    }

    fn lock_uploaded(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.uploaded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` the first time it is called for `uuid`.
    fn claim_upload(&self, uuid: Uuid) -> bool {
        self.lock_uploaded().insert(uuid)
    }

    fn release_upload(&self, uuid: Uuid) {
        self.lock_uploaded().remove(&uuid);
    }
}

async fn upload_item<A>(api: Arc<A>, list: ImportList, item: ImportItem) -> bool
where
    A: WikiApi + ?Sized,
{
    let uuid = item.uuid;
    let Some(data) = item.file_data.clone() else {
        return false;
    };

    let progress_list = list.clone();
    let progress: ProgressFn = Arc::new(move |sent, total| {
        let percent = if total == 0 {
            100
        } else {
            (sent.min(total) * 100 / total) as u8
        };
        progress_list.update(uuid, |i| i.progress = percent);
    });

    let file = UploadFile {
        filename: item.title.clone(),
        data,
    };
    match api.upload(file, progress).await {
        Ok(uploaded) => {
            info!(uuid = %uuid, filename = %item.title, key = %uploaded.key, "[IMPORT][UPLOAD] Upload succeeded");
            list.update(uuid, |i| {
                i.id = uploaded.key;
                i.progress = 100;
                i.file_data = None;
            })
        }
        Err(e) => {
            error!(uuid = %uuid, filename = %item.title, error = %e, "[IMPORT][UPLOAD][ERROR] Upload failed");
            list.update(uuid, |i| i.progress = 0);
            list.transition(
                uuid,
                ItemStatus::UploadError,
                Some(DisplayText::Error(e.to_string())),
            );
            false
        }
    }
}

async fn parse_item<A>(
    api: Arc<A>,
    list: ImportList,
    source: ImportSource,
    kb_id: String,
    item: ImportItem,
) -> bool
where
    A: WikiApi + ?Sized,
{
    let uuid = item.uuid;
    let request = ParseRequest {
        source,
        key: item.id.clone(),
        kb_id,
        filename: source.is_file_backed().then(|| item.title.clone()),
    };

    let parsed = match api.parse(request).await {
        Ok(response) => {
            let overrides = ItemOverrides {
                platform_id: Some(response.id.clone()),
                status: Some(ItemStatus::Parsed),
                space_id: item.space_id.clone(),
                ..ItemOverrides::default()
            };
            let items = flatten_parse_result(&response, item.parent_id.as_deref(), &overrides);
            if items.is_empty() {
                Err(ImportError::EmptyParseResult)
            } else {
                Ok(items)
            }
        }
        Err(e) => Err(ImportError::from(e)),
    };

    match parsed {
        Ok(mut items) => {
            info!(uuid = %uuid, documents = items.len(), "[IMPORT][PARSE] Parse succeeded");
            // The first document takes over the parsed item's identity.
            items[0].uuid = uuid;
            items[0].progress = item.progress;
            list.replace(uuid, items)
        }
        Err(e) => {
            error!(uuid = %uuid, title = %item.title, error = %e, "[IMPORT][PARSE][ERROR] Parse failed");
            list.transition(
                uuid,
                ItemStatus::ParseError,
                Some(DisplayText::Error(e.to_string())),
            );
            false
        }
    }
}
