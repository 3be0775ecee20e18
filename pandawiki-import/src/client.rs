//! # PandaWiki HTTP client
//!
//! [`PandaWikiClient`] implements the core [`WikiApi`] contract over the
//! PandaWiki REST API with `reqwest`.
//!
//! - Every call is a `POST` authenticated with a bearer token.
//! - Responses arrive wrapped in `{ "success", "message", "data" }`; a
//!   non-2xx status or `success == false` becomes a [`ClientError`] carrying
//!   the server's message.
//! - Uploads are sent as multipart bodies streamed in chunks, so the
//!   progress callback follows the bytes actually handed to the connection.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use pandawiki_import_core::contract::{
    CreatedNode, ExportRequest, ExportResponse, NewNode, ParseRequest, ParseResponse, ProgressFn,
    TaskResultList, UploadFile, UploadedFile, WikiApi,
};
use pandawiki_import_core::ApiError;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

const UPLOAD_PATH: &str = "/api/v1/file/upload";
const PARSE_PATH: &str = "/api/v1/crawler/parse";
const EXPORT_PATH: &str = "/api/v1/crawler/export";
const RESULT_PATH: &str = "/api/v1/crawler/result";
const NODE_PATH: &str = "/api/v1/node";

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("PandaWiki returned HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("PandaWiki rejected the request: {0}")]
    Rejected(String),

    #[error("PandaWiki response carried no data")]
    MissingData,

    #[error("Failed to decode PandaWiki response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct ResultQuery<'a> {
    task_ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct NodeBody<'a> {
    kb_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<&'a str>,
    name: &'a str,
    content: &'a str,
    #[serde(rename = "type")]
    node_type: u8,
}

pub struct PandaWikiClient {
    http: Client,
    base_url: String,
    token: String,
}

impl PandaWikiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!(base_url = %base_url, "Initialised PandaWiki client");
        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(path, "POST");
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        read_envelope(path, response).await
    }
}

async fn read_envelope<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        // Error bodies usually still use the envelope; fall back to the raw text.
        let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
            .ok()
            .map(|envelope| envelope.message)
            .filter(|message| !message.is_empty())
            .unwrap_or(body);
        error!(path, %status, message = %message, "PandaWiki request failed");
        return Err(ClientError::Status { status, message });
    }

    let envelope: Envelope<T> = serde_json::from_str(&body)?;
    if !envelope.success {
        error!(path, message = %envelope.message, "PandaWiki rejected request");
        return Err(ClientError::Rejected(envelope.message));
    }
    envelope.data.ok_or(ClientError::MissingData)
}

/// Split `data` into chunks and report cumulative progress as each chunk is pulled.
fn progress_body(data: Bytes, progress: ProgressFn) -> reqwest::Body {
    let total = data.len() as u64;
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len())))
        .collect();

    progress(0, total);
    let mut sent = 0u64;
    let body = stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        progress(sent, total);
        Ok::<Bytes, std::io::Error>(chunk)
    });
    reqwest::Body::wrap_stream(body)
}

#[async_trait]
impl WikiApi for PandaWikiClient {
    async fn upload(&self, file: UploadFile, progress: ProgressFn) -> Result<UploadedFile, ApiError> {
        let total = file.data.len() as u64;
        info!(filename = %file.filename, bytes = total, "Uploading file");

        let part = Part::stream_with_length(progress_body(file.data, progress), total)
            .file_name(file.filename.clone());
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.url(UPLOAD_PATH))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(ClientError::from)?;
        let mut uploaded: UploadedFile = read_envelope(UPLOAD_PATH, response).await?;
        if uploaded.filename.is_empty() {
            uploaded.filename = file.filename;
        }
        Ok(uploaded)
    }

    async fn parse(&self, req: ParseRequest) -> Result<ParseResponse, ApiError> {
        Ok(self.post_json(PARSE_PATH, &req).await?)
    }

    async fn export(&self, req: ExportRequest) -> Result<ExportResponse, ApiError> {
        Ok(self.post_json(EXPORT_PATH, &req).await?)
    }

    async fn poll_results(&self, task_ids: Vec<String>) -> Result<TaskResultList, ApiError> {
        Ok(self
            .post_json(RESULT_PATH, &ResultQuery { task_ids: &task_ids })
            .await?)
    }

    async fn create_node(&self, req: NewNode) -> Result<CreatedNode, ApiError> {
        let body = NodeBody {
            kb_id: &req.kb_id,
            parent_id: req.parent_id.as_deref(),
            name: &req.name,
            content: &req.content,
            node_type: req.node_type.code(),
        };
        Ok(self.post_json(NODE_PATH, &body).await?)
    }
}
