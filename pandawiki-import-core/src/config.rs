use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default number of concurrent upload/parse calls.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
/// 60 * 15 polls at the default interval: a 30 minute ceiling per export task.
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 60 * 15;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Kind of source documents are imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportSource {
    #[serde(rename = "file", alias = "offlinefile")]
    OfflineFile,
    Epub,
    Url,
    Rss,
    Sitemap,
    Notion,
    Feishu,
    Confluence,
    Wikijs,
    Yuque,
    Siyuan,
    Mindoc,
}

impl ImportSource {
    /// Sources whose input is a local file that has to be uploaded before parsing.
    pub fn is_file_backed(&self) -> bool {
        matches!(
            self,
            ImportSource::OfflineFile
                | ImportSource::Epub
                | ImportSource::Confluence
                | ImportSource::Wikijs
                | ImportSource::Yuque
                | ImportSource::Siyuan
                | ImportSource::Mindoc
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

fn default_poll_max_attempts() -> u32 {
    DEFAULT_POLL_MAX_ATTEMPTS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

/// Settings for one import session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Knowledge base receiving the imported nodes.
    pub kb_id: String,
    /// Node under which top-level items are created; `None` imports at the root.
    #[serde(default)]
    pub parent_id: Option<String>,
    pub source: ImportSource,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub poll: PollConfig,
}

impl ImportConfig {
    pub fn new(kb_id: impl Into<String>, source: ImportSource) -> Self {
        Self {
            kb_id: kb_id.into(),
            parent_id: None,
            source,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            poll: PollConfig::default(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            kb_id = %self.kb_id,
            parent_id = self.parent_id.as_deref().unwrap_or("<root>"),
            source = ?self.source,
            max_concurrency = self.max_concurrency,
            "Loaded ImportConfig"
        );
        debug!(?self, "ImportConfig loaded (full debug)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_missing_fields() {
        let config: ImportConfig =
            serde_json::from_str(r#"{"kb_id":"kb-1","source":"sitemap"}"#).unwrap();
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.poll.max_attempts, 900);
        assert_eq!(config.poll.interval(), Duration::from_secs(2));
        assert_eq!(config.parent_id, None);
        assert_eq!(config.source, ImportSource::Sitemap);
    }

    #[test]
    fn offline_file_accepts_both_names() {
        let a: ImportSource = serde_json::from_str(r#""file""#).unwrap();
        let b: ImportSource = serde_json::from_str(r#""offlinefile""#).unwrap();
        assert_eq!(a, ImportSource::OfflineFile);
        assert_eq!(b, ImportSource::OfflineFile);
        assert!(a.is_file_backed());
        assert!(!ImportSource::Url.is_file_backed());
    }
}
