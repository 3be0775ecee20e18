#![doc = "pandawiki-import-core: import pipeline library for PandaWiki knowledge bases."]

//! This crate contains the document import pipeline: a bounded-concurrency task
//! queue, parse-result flattening, export polling, and the orchestrator that drives
//! every import item from upload to node creation.
//! No transport lives here; backends are reached through the [`contract::WikiApi`] trait.
//!
//! # Usage
//! Build an [`importer::Importer`] from a `WikiApi` implementation and an
//! [`config::ImportConfig`], add files or URLs, then call `run`.

pub mod config;
pub mod contract;
pub mod error;
pub mod flatten;
pub mod id_resolver;
pub mod importer;
pub mod item;
pub mod poller;
pub mod queue;
pub mod store;

pub use config::{ImportConfig, ImportSource, PollConfig};
pub use error::{ApiError, ImportError, QueueError};
pub use importer::{ImportReport, Importer, StageOutcome};
pub use item::{DisplayText, ImportItem, ItemStatus};
pub use queue::{TaskHandle, TaskQueue};
pub use store::ImportList;
