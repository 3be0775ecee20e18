#![allow(unused)]

//! # contract: the PandaWiki backend as seen by the import pipeline
//!
//! This module defines the [`WikiApi`] trait and the plain request/response
//! types exchanged with the knowledge-base backend while importing documents.
//!
//! ## Interface & Extensibility
//! - Implement [`WikiApi`] for a concrete transport (the CLI crate ships an HTTP client).
//! - All methods are async and return [`ApiError`], a boxed error, so transports keep their own error types.
//! - The pipeline never assumes a wire format: that belongs to the implementor.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; `MockWikiApi` is exported under the
//!   default `test-export-mocks` feature so integration tests can script backend behaviour.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};

use crate::config::ImportSource;
pub use crate::error::ApiError;

/// Upload progress callback, invoked with `(bytes_sent, bytes_total)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// A raw file waiting to be uploaded.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub data: Bytes,
}

/// Storage location returned after an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub key: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseRequest {
    /// Import kind, forwarded as the crawler type.
    #[serde(rename = "crawler_source")]
    pub source: ImportSource,
    /// Storage key for uploaded files, or the URL for crawler sources.
    pub key: String,
    pub kb_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Payload of a single node in a parse result tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocValue {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub file: bool,
    #[serde(default)]
    pub file_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocNode {
    pub value: DocValue,
    #[serde(default)]
    pub children: Vec<DocNode>,
}

/// Result of parsing an uploaded file or crawling a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResponse {
    /// Platform id of the parse job; every produced document belongs to it.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub docs: Option<DocNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRequest {
    #[serde(rename = "id")]
    pub platform_id: String,
    pub doc_id: String,
    pub kb_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResponse {
    pub task_id: String,
}

/// Status of an export/crawl task. Anything that is neither completed nor
/// failed is treated as still pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "completed", alias = "Completed")]
    Completed,
    #[serde(rename = "failed", alias = "Failed")]
    Failed,
    #[serde(other)]
    Pending,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResultList {
    #[serde(default)]
    pub list: Vec<TaskResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Folder,
    Document,
}

impl NodeType {
    /// Numeric node type used by the PandaWiki node API.
    pub fn code(self) -> u8 {
        match self {
            NodeType::Folder => 1,
            NodeType::Document => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub name: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub node_type: NodeType,
    pub kb_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedNode {
    pub id: String,
}

/// Operations the import pipeline needs from a PandaWiki backend.
///
/// The trait is `Send` + `Sync` so a single client can be shared by every
/// queued task of an import session.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait WikiApi: Send + Sync {
    /// Upload a raw file, reporting byte progress through `progress`.
    async fn upload(&self, file: UploadFile, progress: ProgressFn)
        -> Result<UploadedFile, ApiError>;

    /// Parse an uploaded file or crawl a URL into a document tree.
    async fn parse(&self, req: ParseRequest) -> Result<ParseResponse, ApiError>;

    /// Start exporting a parsed document; returns the export task id.
    async fn export(&self, req: ExportRequest) -> Result<ExportResponse, ApiError>;

    /// Query the status of one or more export tasks.
    async fn poll_results(&self, task_ids: Vec<String>) -> Result<TaskResultList, ApiError>;

    /// Create a folder or document node in the knowledge base.
    async fn create_node(&self, req: NewNode) -> Result<CreatedNode, ApiError>;
}
